//! Session state machine: Home → Capturing → Assigning → Reviewing.
//!
//! The [`Session`] aggregate owns the whole working set (items, participants,
//! tax/tip inputs) so stage handlers receive explicit state instead of
//! ambient globals, and every transition is an enumerated method that can be
//! tested without a rendering layer.

use chrono::Utc;

use crate::assign;
use crate::settle::{self, TipMode};
use crate::types::{
    create_participant, default_participant, normalize_line_items, BillSplit, LineItem,
    Participant, RawLineItem, SplitRecord,
};

/// Where the session currently is in the capture-to-finalize cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Entry state; recent records are browsable from here
    Home,
    /// Awaiting the recognizer; a failed attempt stays here, retryable
    Capturing {
        /// Last recognition failure, surfaced for retry
        error: Option<String>,
    },
    /// Items and participants are mutable via the assignment engine
    Assigning,
    /// Settlement recomputes reactively on tax/tip edits
    Reviewing,
}

/// The mutable working state for one capture-to-finalize cycle.
///
/// Invalid transitions are silent no-ops (logged at debug); the worst case
/// anywhere in the session is "nothing changed".
pub struct Session {
    stage: Stage,
    items: Vec<LineItem>,
    participants: Vec<Participant>,
    tax_text: String,
    tip_text: String,
    tip_mode: TipMode,
}

impl Session {
    /// A fresh session: Home, one default "Me" participant, zeroed inputs.
    pub fn new() -> Self {
        Self {
            stage: Stage::Home,
            items: Vec::new(),
            participants: vec![default_participant()],
            tax_text: "0".to_string(),
            tip_text: "0".to_string(),
            tip_mode: TipMode::Percent,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn tax_text(&self) -> &str {
        &self.tax_text
    }

    pub fn tip_text(&self) -> &str {
        &self.tip_text
    }

    pub fn tip_mode(&self) -> TipMode {
        self.tip_mode
    }

    // ============================================
    // Capture transitions
    // ============================================

    /// Home → Capturing. Also clears the error for a retry when already
    /// in Capturing.
    pub fn start_capture(&mut self) {
        match self.stage {
            Stage::Home | Stage::Capturing { .. } => {
                self.stage = Stage::Capturing { error: None };
                tracing::debug!("session entering capture");
            }
            _ => tracing::debug!(stage = ?self.stage, "start_capture ignored"),
        }
    }

    /// Capturing → Home, discarding any partial state.
    pub fn cancel_capture(&mut self) {
        if matches!(self.stage, Stage::Capturing { .. }) {
            self.stage = Stage::Home;
            tracing::debug!("capture cancelled");
        }
    }

    /// Capturing → Assigning with the recognizer's output normalized.
    ///
    /// An empty sequence is fine: the Assigning stage starts empty and is
    /// immediately satisfiable.
    pub fn complete_capture(&mut self, raw_items: Vec<RawLineItem>) {
        if !matches!(self.stage, Stage::Capturing { .. }) {
            tracing::debug!(stage = ?self.stage, "complete_capture ignored");
            return;
        }
        self.items = normalize_line_items(raw_items);
        self.stage = Stage::Assigning;
        tracing::info!(items = self.items.len(), "capture complete");
    }

    /// Stay in Capturing with a retryable error surfaced.
    pub fn capture_failed(&mut self, message: impl Into<String>) {
        if matches!(self.stage, Stage::Capturing { .. }) {
            let message = message.into();
            tracing::warn!(error = %message, "recognition failed");
            self.stage = Stage::Capturing {
                error: Some(message),
            };
        }
    }

    /// The surfaced capture error, if any.
    pub fn capture_error(&self) -> Option<&str> {
        match &self.stage {
            Stage::Capturing { error } => error.as_deref(),
            _ => None,
        }
    }

    // ============================================
    // Assigning
    // ============================================

    /// Toggle an item↔participant assignment. Only valid while Assigning.
    pub fn toggle_item(&mut self, item_id: &str, participant_id: &str) {
        if self.stage != Stage::Assigning {
            tracing::debug!(stage = ?self.stage, "toggle_item ignored");
            return;
        }
        assign::toggle_assignment(&mut self.items, item_id, participant_id);
    }

    /// Add a participant by name. Empty names are silently rejected;
    /// the returned ID is `None` when nothing happened.
    pub fn add_participant(&mut self, name: &str) -> Option<String> {
        if self.stage != Stage::Assigning {
            tracing::debug!(stage = ?self.stage, "add_participant ignored");
            return None;
        }
        match create_participant(&self.participants, name) {
            Ok(p) => {
                let id = p.id.clone();
                tracing::debug!(name = %p.name, "participant added");
                self.participants.push(p);
                Some(id)
            }
            Err(_) => None,
        }
    }

    /// True iff every item has at least one assignee. Advisory: affects a
    /// UI affordance only, never blocks the Review transition.
    pub fn is_fully_assigned(&self) -> bool {
        assign::is_fully_assigned(&self.items)
    }

    /// Assigning → Reviewing, unconditionally.
    pub fn finish_assigning(&mut self) {
        if self.stage == Stage::Assigning {
            self.stage = Stage::Reviewing;
        } else {
            tracing::debug!(stage = ?self.stage, "finish_assigning ignored");
        }
    }

    /// Assigning → Home, abandoning the working set.
    pub fn cancel_assigning(&mut self) {
        if self.stage == Stage::Assigning {
            tracing::debug!("assignment abandoned");
            self.reset();
        }
    }

    // ============================================
    // Reviewing
    // ============================================

    /// Reviewing → Assigning without losing item or participant state.
    pub fn back_to_assigning(&mut self) {
        if self.stage == Stage::Reviewing {
            self.stage = Stage::Assigning;
        }
    }

    /// Replace the tax input text. Malformed text computes as zero.
    pub fn set_tax_text(&mut self, text: String) {
        if self.stage == Stage::Reviewing {
            self.tax_text = text;
        }
    }

    /// Replace the tip input text. Malformed text computes as zero.
    pub fn set_tip_text(&mut self, text: String) {
        if self.stage == Stage::Reviewing {
            self.tip_text = text;
        }
    }

    /// Flip the tip between percent-of-subtotal and absolute entry.
    pub fn toggle_tip_mode(&mut self) {
        if self.stage == Stage::Reviewing {
            self.tip_mode = self.tip_mode.toggled();
        }
    }

    /// The settlement for the current state. Cheap; recompute on every edit.
    pub fn current_split(&self) -> BillSplit {
        settle::compute_split(
            &self.items,
            &self.participants,
            &self.tax_text,
            &self.tip_text,
            self.tip_mode,
        )
    }

    /// Freeze the session into a record and reset to Home.
    ///
    /// Persisting the record is the history store's job; the caller hands
    /// the returned snapshot over and treats save failures as non-fatal.
    /// Returns `None` outside Reviewing.
    pub fn finalize(&mut self, label: Option<String>) -> Option<SplitRecord> {
        if self.stage != Stage::Reviewing {
            tracing::debug!(stage = ?self.stage, "finalize ignored");
            return None;
        }

        let split = self.current_split();
        let record = SplitRecord {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            label: label.filter(|l| !l.trim().is_empty()),
            total: split.grand_total,
            tax_amount: split.tax_amount,
            tip_amount: split.tip_amount,
            items: std::mem::take(&mut self.items),
            participants: self.participants.clone(),
        };
        tracing::info!(record_id = %record.id, total = record.total, "session finalized");

        self.reset();
        Some(record)
    }

    /// Home → Reviewing with a saved record's snapshot loaded.
    ///
    /// The stored tip is the resolved absolute amount, so the tip mode is
    /// absolute regardless of how it was originally entered.
    pub fn open_record(&mut self, record: SplitRecord) {
        if self.stage != Stage::Home {
            tracing::debug!(stage = ?self.stage, "open_record ignored");
            return;
        }

        let mut items = record.items;
        let participants = record.participants;
        let ids: Vec<&str> = participants.iter().map(|p| p.id.as_str()).collect();
        assign::retain_known_participants(&mut items, &ids);

        self.items = items;
        self.participants = if participants.is_empty() {
            vec![default_participant()]
        } else {
            participants
        };
        self.tax_text = record.tax_amount.to_string();
        self.tip_text = record.tip_amount.to_string();
        self.tip_mode = TipMode::Absolute;
        self.stage = Stage::Reviewing;
        tracing::debug!(record_id = %record.id, "record reopened");
    }

    /// Back to Home with the single default participant and cleared inputs.
    fn reset(&mut self) {
        self.items.clear();
        self.participants = vec![default_participant()];
        self.tax_text = "0".to_string();
        self.tip_text = "0".to_string();
        self.tip_mode = TipMode::Percent;
        self.stage = Stage::Home;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_PARTICIPANT_ID;
    use serde_json::json;

    fn raw_items() -> Vec<RawLineItem> {
        vec![
            RawLineItem {
                name: Some("Burger".to_string()),
                price: Some(json!(10.0)),
                quantity: Some(1),
            },
            RawLineItem {
                name: Some("Fries".to_string()),
                price: Some(json!(4.0)),
                quantity: Some(2),
            },
        ]
    }

    fn session_in_assigning() -> Session {
        let mut s = Session::new();
        s.start_capture();
        s.complete_capture(raw_items());
        s
    }

    #[test]
    fn test_new_session_defaults() {
        let s = Session::new();
        assert_eq!(*s.stage(), Stage::Home);
        assert_eq!(s.participants().len(), 1);
        assert_eq!(s.participants()[0].id, DEFAULT_PARTICIPANT_ID);
        assert!(s.items().is_empty());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut s = Session::new();
        s.start_capture();
        assert!(matches!(s.stage(), Stage::Capturing { error: None }));

        s.complete_capture(raw_items());
        assert_eq!(*s.stage(), Stage::Assigning);
        assert_eq!(s.items().len(), 2);

        s.finish_assigning();
        assert_eq!(*s.stage(), Stage::Reviewing);

        s.back_to_assigning();
        assert_eq!(*s.stage(), Stage::Assigning);
        assert_eq!(s.items().len(), 2);
    }

    #[test]
    fn test_capture_failure_is_retryable() {
        let mut s = Session::new();
        s.start_capture();
        s.capture_failed("blurry image");
        assert_eq!(s.capture_error(), Some("blurry image"));

        // Retry clears the error, then succeeds
        s.start_capture();
        assert_eq!(s.capture_error(), None);
        s.complete_capture(vec![]);
        assert_eq!(*s.stage(), Stage::Assigning);
        assert!(s.items().is_empty());
        assert!(s.is_fully_assigned());
    }

    #[test]
    fn test_cancel_capture_discards_state() {
        let mut s = Session::new();
        s.start_capture();
        s.cancel_capture();
        assert_eq!(*s.stage(), Stage::Home);
    }

    #[test]
    fn test_review_is_never_blocked() {
        let mut s = session_in_assigning();
        assert!(!s.is_fully_assigned());
        s.finish_assigning();
        assert_eq!(*s.stage(), Stage::Reviewing);
    }

    #[test]
    fn test_add_participant_empty_name_is_silent() {
        let mut s = session_in_assigning();
        assert!(s.add_participant("  ").is_none());
        assert_eq!(s.participants().len(), 1);

        let id = s.add_participant("Alice").expect("should add");
        assert_eq!(s.participants().len(), 2);
        assert_eq!(s.participants()[1].id, id);
    }

    #[test]
    fn test_toggle_outside_assigning_ignored() {
        let mut s = session_in_assigning();
        let item_id = s.items()[0].id.clone();
        s.finish_assigning();
        s.toggle_item(&item_id, DEFAULT_PARTICIPANT_ID);
        assert!(s.items()[0].assigned_to.is_empty());
    }

    #[test]
    fn test_reactive_split_on_tip_edit() {
        let mut s = session_in_assigning();
        let ids: Vec<String> = s.items().iter().map(|i| i.id.clone()).collect();
        for id in &ids {
            s.toggle_item(id, DEFAULT_PARTICIPANT_ID);
        }
        s.finish_assigning();

        s.set_tip_text("10".to_string());
        let percent = s.current_split();
        assert!((percent.tip_amount - 1.4).abs() < 1e-9);

        s.toggle_tip_mode();
        let absolute = s.current_split();
        assert!((absolute.tip_amount - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_finalize_resets_session() {
        let mut s = session_in_assigning();
        let item_id = s.items()[0].id.clone();
        s.toggle_item(&item_id, DEFAULT_PARTICIPANT_ID);
        s.add_participant("Alice");
        s.finish_assigning();
        s.set_tax_text("1.40".to_string());

        let record = s.finalize(Some("Diner".to_string())).expect("record");
        assert_eq!(record.label.as_deref(), Some("Diner"));
        assert_eq!(record.items.len(), 2);
        assert_eq!(record.participants.len(), 2);
        assert!((record.tax_amount - 1.4).abs() < 1e-9);

        assert_eq!(*s.stage(), Stage::Home);
        assert!(s.items().is_empty());
        assert_eq!(s.participants().len(), 1);
        assert_eq!(s.tax_text(), "0");
        assert_eq!(s.tip_mode(), TipMode::Percent);
    }

    #[test]
    fn test_finalize_outside_reviewing_is_noop() {
        let mut s = session_in_assigning();
        assert!(s.finalize(None).is_none());
        assert_eq!(*s.stage(), Stage::Assigning);
    }

    #[test]
    fn test_open_record_reconstructs_review() {
        let mut s = session_in_assigning();
        let item_id = s.items()[0].id.clone();
        s.toggle_item(&item_id, DEFAULT_PARTICIPANT_ID);
        s.finish_assigning();
        s.set_tax_text("2".to_string());
        s.set_tip_text("3".to_string());
        s.toggle_tip_mode(); // absolute
        let before = s.current_split();
        let record = s.finalize(None).expect("record");

        let mut reopened = Session::new();
        reopened.open_record(record);
        assert_eq!(*reopened.stage(), Stage::Reviewing);
        let after = reopened.current_split();
        assert!((after.grand_total - before.grand_total).abs() < 1e-9);
        assert!((after.tip_amount - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_assigning_resets() {
        let mut s = session_in_assigning();
        s.add_participant("Bob");
        s.cancel_assigning();
        assert_eq!(*s.stage(), Stage::Home);
        assert_eq!(s.participants().len(), 1);
        assert!(s.items().is_empty());
    }
}
