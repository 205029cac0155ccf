//! History store repository
//!
//! Load-recent and save-with-cap over the `split_records` table. Both
//! operations are deliberately forgiving: a corrupt row is skipped, not
//! fatal, and callers treat any load failure as an empty history.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::types::SplitRecord;

/// Records retained after each save; oldest evicted first.
pub const DEFAULT_HISTORY_CAP: usize = 10;

/// History store handle (single connection behind a mutex)
pub struct Database {
    conn: Mutex<Connection>,
    history_cap: usize,
}

impl Database {
    /// Open or create a history store at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            history_cap: DEFAULT_HISTORY_CAP,
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
            history_cap: DEFAULT_HISTORY_CAP,
        })
    }

    /// Override the retention cap (config-driven)
    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap.max(1);
        self
    }

    /// Run migrations on this store
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Load up to the cap of recent records, most-recent-first.
    ///
    /// Rows that fail to decode are skipped with a warning so one corrupt
    /// snapshot never hides the rest of the history.
    pub fn load_recent(&self) -> Result<Vec<SplitRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, label, total, tax_amount, tip_amount, items, participants
             FROM split_records
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )?;

        let rows = stmt.query_map([self.history_cap], Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            match row {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "skipping unreadable history row"),
            }
        }
        Ok(records)
    }

    /// Prepend a finalized record and truncate to the cap (FIFO eviction).
    pub fn save_record(&self, record: &SplitRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO split_records
                (id, created_at, label, total, tax_amount, tip_amount, items, participants)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.created_at.to_rfc3339(),
                record.label,
                record.total,
                record.tax_amount,
                record.tip_amount,
                serde_json::to_string(&record.items)?,
                serde_json::to_string(&record.participants)?,
            ],
        )?;

        conn.execute(
            "DELETE FROM split_records WHERE id NOT IN (
                 SELECT id FROM split_records
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?
             )",
            [self.history_cap],
        )?;

        tracing::debug!(record_id = %record.id, "split record saved");
        Ok(())
    }

    /// Number of stored records (used by tests and the Home header)
    pub fn count_records(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM split_records", [], |r| r.get(0))?;
        Ok(count)
    }

    fn row_to_record(row: &Row) -> rusqlite::Result<Option<SplitRecord>> {
        let created_at_str: String = row.get("created_at")?;
        let items_str: String = row.get("items")?;
        let participants_str: String = row.get("participants")?;

        let items = match serde_json::from_str(&items_str) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "corrupt items snapshot, dropping record");
                return Ok(None);
            }
        };
        let participants = match serde_json::from_str(&participants_str) {
            Ok(participants) => participants,
            Err(e) => {
                tracing::warn!(error = %e, "corrupt participants snapshot, dropping record");
                return Ok(None);
            }
        };

        Ok(Some(SplitRecord {
            id: row.get("id")?,
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            label: row.get("label")?,
            total: row.get("total")?,
            tax_amount: row.get("tax_amount")?,
            tip_amount: row.get("tip_amount")?,
            items,
            participants,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::default_participant;
    use chrono::TimeZone;

    fn record(n: i64) -> SplitRecord {
        SplitRecord {
            id: format!("rec-{}", n),
            created_at: Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap(),
            label: Some(format!("dinner {}", n)),
            total: 10.0 + n as f64,
            tax_amount: 1.0,
            tip_amount: 2.0,
            items: vec![],
            participants: vec![default_participant()],
        }
    }

    fn open_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let db = open_db();
        db.save_record(&record(1)).unwrap();

        let loaded = db.load_recent().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "rec-1");
        assert_eq!(loaded[0].label.as_deref(), Some("dinner 1"));
        assert_eq!(loaded[0].participants.len(), 1);
    }

    #[test]
    fn test_cap_evicts_oldest_first() {
        let db = open_db();
        for n in 0..11 {
            db.save_record(&record(n)).unwrap();
        }

        let loaded = db.load_recent().unwrap();
        assert_eq!(loaded.len(), 10);
        // Most recent first; rec-0 evicted
        assert_eq!(loaded[0].id, "rec-10");
        assert_eq!(loaded[9].id, "rec-1");
        assert_eq!(db.count_records().unwrap(), 10);
    }

    #[test]
    fn test_custom_cap() {
        let db = Database::open_in_memory().unwrap().with_history_cap(2);
        db.migrate().unwrap();
        for n in 0..3 {
            db.save_record(&record(n)).unwrap();
        }
        let loaded = db.load_recent().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "rec-2");
    }

    #[test]
    fn test_corrupt_row_is_skipped() {
        let db = open_db();
        db.save_record(&record(1)).unwrap();
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO split_records
                     (id, created_at, label, total, tax_amount, tip_amount, items, participants)
                 VALUES ('bad', '2025-01-01T00:00:00Z', NULL, 0, 0, 0, 'not json', '[]')",
                [],
            )
            .unwrap();
        }

        let loaded = db.load_recent().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "rec-1");
    }

    #[test]
    fn test_empty_store_loads_empty() {
        let db = open_db();
        assert!(db.load_recent().unwrap().is_empty());
    }
}
