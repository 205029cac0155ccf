//! Display formatting helpers shared across UIs.
//!
//! Monetary values stay unrounded internally; these helpers are the only
//! place amounts get rounded to two decimals.

use chrono::{DateTime, Local, Utc};

/// Format a monetary amount for display, e.g. "$12.50".
pub fn format_money(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Format a signed share, e.g. a per-assignee split: "$3.33 ea".
pub fn format_split_each(amount: f64) -> String {
    format!("{} ea", format_money(amount))
}

/// Format a record date for the recent-splits list, e.g. "Aug 26, 2026".
pub fn format_record_date(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%b %d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money_rounds_to_cents() {
        assert_eq!(format_money(12.5), "$12.50");
        assert_eq!(format_money(10.0 / 3.0), "$3.33");
        assert_eq!(format_money(0.0), "$0.00");
        // Rounding happens here, not in the calculator
        assert_eq!(format_money(2.675), "$2.67");
    }

    #[test]
    fn test_format_split_each() {
        assert_eq!(format_split_each(2.0), "$2.00 ea");
    }
}
