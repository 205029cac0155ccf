//! Core domain types for tably
//!
//! Everything the session works with is normalized into these types at the
//! recognizer boundary; loosely-typed recognizer output never flows past
//! [`normalize_line_items`].
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Participant** | A person sharing the bill |
//! | **LineItem** | One receipt entry with a total price and assignable owners |
//! | **Assignment** | The relation marking which participants owe a share of an item |
//! | **BillSplit** | The computed per-participant settlement |
//! | **SplitRecord** | An immutable snapshot of a finalized session |

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Participants
// ============================================

/// Display accent colors, cycled by insertion order.
pub const PALETTE: [&str; 7] = [
    "#10b981", "#3b82f6", "#f59e0b", "#ef4444", "#8b5cf6", "#ec4899", "#06b6d4",
];

/// Fixed ID of the default participant present in every session.
pub const DEFAULT_PARTICIPANT_ID: &str = "me";

/// A person sharing the bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Opaque unique identifier, stable for the session lifetime
    pub id: String,
    /// Non-empty display label
    pub name: String,
    /// Display accent; irrelevant to computation
    pub color: String,
}

/// The default "Me" participant every session starts with.
pub fn default_participant() -> Participant {
    Participant {
        id: DEFAULT_PARTICIPANT_ID.to_string(),
        name: "Me".to_string(),
        color: PALETTE[0].to_string(),
    }
}

/// Create a participant with a fresh ID and the next palette color.
///
/// Fails with [`Error::EmptyName`](crate::Error::EmptyName) when the
/// requested name is empty after trimming.
pub fn create_participant(
    existing: &[Participant],
    requested_name: &str,
) -> crate::Result<Participant> {
    let name = requested_name.trim();
    if name.is_empty() {
        return Err(crate::Error::EmptyName);
    }
    Ok(Participant {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        color: PALETTE[existing.len() % PALETTE.len()].to_string(),
    })
}

// ============================================
// Line items
// ============================================

/// Placeholder label for items the recognizer returned without a name.
pub const UNNAMED_ITEM: &str = "Unnamed item";

/// One raw record from the recognition service, before normalization.
///
/// Treated as an untrusted payload: every field is optional and the price
/// may arrive as a number or a numeric-looking string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLineItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<serde_json::Value>,
    #[serde(default)]
    pub quantity: Option<i64>,
}

/// A normalized receipt entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Unique within the session
    pub id: String,
    /// Never empty; placeholder substituted at normalization
    pub name: String,
    /// The line's total price, non-negative. Quantity does not multiply in.
    pub price: f64,
    /// Informational only; at least 1
    pub quantity: u32,
    /// IDs of participants who share this item
    pub assigned_to: BTreeSet<String>,
}

impl LineItem {
    /// The price each assignee owes for this item, or the full price when
    /// nobody is assigned yet.
    pub fn split_price(&self) -> f64 {
        if self.assigned_to.is_empty() {
            self.price
        } else {
            self.price / self.assigned_to.len() as f64
        }
    }
}

// Salts line-item IDs so repeated scans in one process never collide.
static SCAN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Normalize the recognizer's raw records into invariant-respecting items.
///
/// Policy: missing/blank name gets [`UNNAMED_ITEM`]; price is coerced from
/// numeric-looking input and defaults to 0 (negatives included); quantity
/// defaults to 1 when missing or non-positive; assignments start empty.
pub fn normalize_line_items(raw_items: Vec<RawLineItem>) -> Vec<LineItem> {
    let seq = SCAN_SEQ.fetch_add(1, Ordering::Relaxed);

    raw_items
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            let name = raw
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNNAMED_ITEM.to_string());

            let price = raw.price.map(coerce_price).unwrap_or(0.0);

            let quantity = raw
                .quantity
                .filter(|q| *q > 0)
                .map(|q| q as u32)
                .unwrap_or(1);

            LineItem {
                id: format!("item-{}-{}", seq, idx),
                name,
                price,
                quantity,
                assigned_to: BTreeSet::new(),
            }
        })
        .collect()
}

/// Coerce a loosely-typed price value into a non-negative amount.
fn coerce_price(value: serde_json::Value) -> f64 {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|p| p.is_finite() && *p >= 0.0)
        .unwrap_or(0.0)
}

// ============================================
// Settlement results
// ============================================

/// One item's contribution to a participant's bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedItem {
    /// Item name
    pub name: String,
    /// This participant's share of the item price
    pub price: f64,
}

/// A participant's computed share of the bill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantShare {
    /// The participant this share belongs to
    pub participant: Participant,
    /// Sum of this participant's even splits of their items
    pub item_subtotal: f64,
    /// Proportional share of the tax
    pub tax_share: f64,
    /// Proportional share of the tip
    pub tip_share: f64,
    /// item_subtotal + tax_share + tip_share
    pub total: f64,
    /// The items (with split prices) behind item_subtotal
    pub items: Vec<OwnedItem>,
}

/// The derived settlement for the current session state.
///
/// Recomputed on demand; only frozen into a [`SplitRecord`] on finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillSplit {
    /// Sum of all item prices, including unassigned items
    pub subtotal: f64,
    /// Absolute tax amount
    pub tax_amount: f64,
    /// Absolute tip amount (already resolved from percent if applicable)
    pub tip_amount: f64,
    /// subtotal + tax_amount + tip_amount
    pub grand_total: f64,
    /// Breakdown for participants with a non-zero total
    pub per_participant: Vec<ParticipantShare>,
}

// ============================================
// Persisted records
// ============================================

/// An immutable snapshot of a finalized session.
///
/// Carries the full item and participant lists plus the raw tax/tip amounts,
/// enough to reconstruct the Review stage when reopened from history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitRecord {
    /// Unique record identifier
    pub id: String,
    /// When the session was finalized
    pub created_at: DateTime<Utc>,
    /// Optional label, e.g. the restaurant name
    pub label: Option<String>,
    /// Grand total at finalization
    pub total: f64,
    /// Absolute tax amount used
    pub tax_amount: f64,
    /// Absolute tip amount used
    pub tip_amount: f64,
    /// Item snapshot, assignments included
    pub items: Vec<LineItem>,
    /// Participant snapshot
    pub participants: Vec<Participant>,
}
