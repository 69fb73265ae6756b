//! Billing period keys
//!
//! Usage ledgers are scoped to a calendar month. The period key is the UTC
//! year and month formatted as `YYYY-MM`; a ledger whose key differs from
//! the current one is stale and must be replaced before new usage applies.

use chrono::{Datelike, Utc};

/// Current billing period key (`YYYY-MM`, UTC)
#[must_use]
pub fn current_period() -> String {
    let now = Utc::now();
    format!("{:04}-{:02}", now.year(), now.month())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_key_has_year_month_shape() {
        let key = current_period();
        assert_eq!(key.len(), 7);
        assert_eq!(key.as_bytes()[4], b'-');
        assert!(key[..4].chars().all(|c| c.is_ascii_digit()));
        assert!(key[5..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn month_is_zero_padded() {
        let key = current_period();
        let month: u32 = key[5..].parse().unwrap();
        assert!((1..=12).contains(&month));
    }
}
