//! Settlement calculator: proportional tax and tip on top of even item splits.
//!
//! All monetary arithmetic is plain f64, accumulated unrounded; rounding to
//! two decimals happens only at presentation time (see [`crate::format`]).
//! Each item's price splits evenly among its assignees (divide-then-sum);
//! quantity never factors into the ratio.

use crate::types::{BillSplit, LineItem, OwnedItem, Participant, ParticipantShare};

/// How the user entered the tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipMode {
    /// Tip text is a percentage of the subtotal
    Percent,
    /// Tip text is an absolute amount
    Absolute,
}

impl TipMode {
    /// Flip between percent and absolute entry.
    pub fn toggled(self) -> Self {
        match self {
            TipMode::Percent => TipMode::Absolute,
            TipMode::Absolute => TipMode::Percent,
        }
    }
}

/// Parse user-edited monetary text into a non-negative amount.
///
/// Malformed, negative, or empty input is numeric zero, never an error.
pub fn parse_amount(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Derive the full settlement from the current session state.
///
/// Items with zero assignees count toward the subtotal but are attributed to
/// no one; participants whose total comes out to zero are filtered from the
/// presented breakdown (a display filter, not a deletion).
pub fn compute_split(
    items: &[LineItem],
    participants: &[Participant],
    tax_text: &str,
    tip_text: &str,
    tip_mode: TipMode,
) -> BillSplit {
    let subtotal: f64 = items.iter().map(|i| i.price).sum();

    let tax_amount = parse_amount(tax_text);
    let tip_amount = match tip_mode {
        TipMode::Percent => subtotal * parse_amount(tip_text) / 100.0,
        TipMode::Absolute => parse_amount(tip_text),
    };
    let grand_total = subtotal + tax_amount + tip_amount;

    let per_participant = participants
        .iter()
        .map(|participant| {
            let mut item_subtotal = 0.0;
            let mut owned = Vec::new();

            for item in items {
                if item.assigned_to.contains(&participant.id) {
                    let split_price = item.price / item.assigned_to.len() as f64;
                    item_subtotal += split_price;
                    owned.push(OwnedItem {
                        name: item.name.clone(),
                        price: split_price,
                    });
                }
            }

            let proportion = if subtotal > 0.0 {
                item_subtotal / subtotal
            } else {
                0.0
            };
            let tax_share = tax_amount * proportion;
            let tip_share = tip_amount * proportion;

            ParticipantShare {
                participant: participant.clone(),
                item_subtotal,
                tax_share,
                tip_share,
                total: item_subtotal + tax_share + tip_share,
                items: owned,
            }
        })
        .filter(|share| share.total > 0.0)
        .collect();

    BillSplit {
        subtotal,
        tax_amount,
        tip_amount,
        grand_total,
        per_participant,
    }
}
