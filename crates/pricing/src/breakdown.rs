//! Cost breakdown result type
//!
//! A `CostBreakdown` is a pure derived value: it is returned by the
//! per-vendor calculators and never stored. All published per-character
//! rates are whole micro-dollars, so the arithmetic stays integral and the
//! derived USD amount is exact for every tabulated rate.

use serde::{Deserialize, Serialize};

/// Price of one synthesized character, in millionths of a US dollar
pub type MicroUsd = u64;

/// Result of pricing a single synthesis against the monthly ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Pricing bucket the synthesis was billed under
    pub classification: String,
    /// Characters synthesized by this request
    pub characters_used: u64,
    /// Portion covered by the monthly free allowance
    pub characters_free: u64,
    /// Portion billed at the per-character rate
    pub characters_paid: u64,
    /// Billed amount in micro-dollars
    pub cost_microdollars: MicroUsd,
}

impl CostBreakdown {
    /// Price `used` characters under a metered bucket.
    ///
    /// Splits the characters into a free portion (whatever remains of the
    /// monthly allowance after `prior` usage) and a paid portion billed at
    /// `rate` micro-dollars per character. The split is exhaustive:
    /// `characters_free + characters_paid == used`.
    #[must_use]
    pub fn metered(
        classification: impl Into<String>,
        used: u64,
        allowance: u64,
        prior: u64,
        rate: MicroUsd,
    ) -> Self {
        let remaining_free = allowance.saturating_sub(prior);
        let free = used.min(remaining_free);
        let paid = used - free;
        Self {
            classification: classification.into(),
            characters_used: used,
            characters_free: free,
            characters_paid: paid,
            cost_microdollars: paid * rate,
        }
    }

    /// Price `used` characters under a hard-cap bucket.
    ///
    /// A hard-cap tier never bills: once the allowance is exhausted the
    /// provider throttles instead of charging, so overage counts as neither
    /// free nor paid and the amount stays zero.
    #[must_use]
    pub fn capped(classification: impl Into<String>, used: u64, allowance: u64, prior: u64) -> Self {
        let remaining_free = allowance.saturating_sub(prior);
        let free = used.min(remaining_free);
        Self {
            classification: classification.into(),
            characters_used: used,
            characters_free: free,
            characters_paid: 0,
            cost_microdollars: 0,
        }
    }

    /// Billed amount in US dollars
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn amount_usd(&self) -> f64 {
        self.cost_microdollars as f64 / 1_000_000.0
    }

    /// Whether this synthesis incurred any cost
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.cost_microdollars == 0
    }
}
