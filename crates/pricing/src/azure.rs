//! Azure Cognitive Services Speech pricing
//!
//! Azure bills by subscription tier rather than by voice model. The free
//! tier is hard-capped: 500k characters per month, after which the service
//! throttles instead of billing, so it never incurs cost. The standard tier
//! has no free allowance and bills every character at a per-voice-kind
//! rate. The ledger therefore keeps a single counter keyed by tier, and a
//! tier change resets it the same way a month change does.

use serde::{Deserialize, Serialize};

use crate::breakdown::{CostBreakdown, MicroUsd};
use crate::period::current_period;

/// Characters per month covered by the hard-capped free tier
pub const FREE_TIER_ALLOWANCE: u64 = 500_000;

/// Azure subscription pricing tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AzureTier {
    /// F0: hard-capped at 500k characters/month, never bills
    #[default]
    Free,
    /// S0: no free allowance, bills all characters
    Standard,
}

impl std::fmt::Display for AzureTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => f.write_str("free"),
            Self::Standard => f.write_str("standard"),
        }
    }
}

/// Voice kind, which sets the per-character rate on the standard tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AzureVoiceKind {
    /// Neural voices ($15/1M chars)
    #[default]
    Standard,
    /// Dragon HD voices ($30/1M chars)
    DragonHd,
    /// Custom neural voices ($24/1M chars)
    Custom,
}

impl AzureVoiceKind {
    /// Stable label used as the breakdown classification
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::DragonHd => "dragon-hd",
            Self::Custom => "custom",
        }
    }

    /// Per-character rate in micro-dollars on the standard tier
    #[must_use]
    pub const fn rate(self) -> MicroUsd {
        match self {
            Self::Standard => 15,
            Self::DragonHd => 30,
            Self::Custom => 24,
        }
    }
}

/// Ordered name markers, most specific first
const KIND_MARKERS: &[(&str, AzureVoiceKind)] = &[
    ("dragonhd", AzureVoiceKind::DragonHd),
    ("custom", AzureVoiceKind::Custom),
];

/// Classify a voice name into its rate bucket.
///
/// Case-insensitive substring matching; unknown names bill at the standard
/// neural rate.
#[must_use]
pub fn detect_voice_kind(voice_name: &str) -> AzureVoiceKind {
    let name = voice_name.to_lowercase();
    KIND_MARKERS
        .iter()
        .find(|(marker, _)| name.contains(marker))
        .map_or(AzureVoiceKind::Standard, |&(_, kind)| kind)
}

/// Price `characters` of synthesis under `tier`, given the characters
/// already consumed in the current period on that tier.
#[must_use]
pub fn calculate_cost(
    tier: AzureTier,
    kind: AzureVoiceKind,
    characters: u64,
    prior_usage: u64,
) -> CostBreakdown {
    match tier {
        AzureTier::Free => {
            CostBreakdown::capped("free", characters, FREE_TIER_ALLOWANCE, prior_usage)
        }
        AzureTier::Standard => {
            CostBreakdown::metered(kind.as_str(), characters, 0, prior_usage, kind.rate())
        }
    }
}

/// Monthly usage counter for the active subscription tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureUsageLedger {
    /// Calendar month this ledger covers (`YYYY-MM`)
    pub period: String,
    /// Tier the counter was accumulated under
    pub tier: AzureTier,
    /// Characters synthesized within the period
    pub characters: u64,
}

impl AzureUsageLedger {
    /// Fresh zeroed ledger for the given period and tier
    #[must_use]
    pub fn new(period: impl Into<String>, tier: AzureTier) -> Self {
        Self {
            period: period.into(),
            tier,
            characters: 0,
        }
    }
}

/// Apply usage to the ledger for the current UTC month.
///
/// See [`update_usage_at`] for the reset semantics.
#[must_use]
pub fn update_usage(
    ledger: Option<&AzureUsageLedger>,
    tier: AzureTier,
    characters: u64,
) -> AzureUsageLedger {
    update_usage_at(ledger, tier, characters, &current_period())
}

/// Apply usage to the ledger for an explicit period.
///
/// The counter resets when the period changes, and also when the tier
/// changes: counts accumulated on one tier say nothing about the other.
/// The input ledger is never mutated.
#[must_use]
pub fn update_usage_at(
    ledger: Option<&AzureUsageLedger>,
    tier: AzureTier,
    characters: u64,
    period: &str,
) -> AzureUsageLedger {
    let mut next = match ledger {
        Some(current) if current.period == period && current.tier == tier => current.clone(),
        _ => AzureUsageLedger::new(period, tier),
    };
    next.characters += characters;
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    mod classification {
        use super::*;

        #[test]
        fn dragon_hd_voices_detected() {
            assert_eq!(
                detect_voice_kind("en-US-Ava:DragonHDLatestNeural"),
                AzureVoiceKind::DragonHd
            );
        }

        #[test]
        fn custom_voices_detected() {
            assert_eq!(
                detect_voice_kind("my-brand-CustomNeural"),
                AzureVoiceKind::Custom
            );
        }

        #[test]
        fn plain_neural_voices_are_standard() {
            assert_eq!(
                detect_voice_kind("de-DE-KatjaNeural"),
                AzureVoiceKind::Standard
            );
        }
    }

    mod cost {
        use super::*;

        #[test]
        fn free_tier_never_bills() {
            let b = calculate_cost(AzureTier::Free, AzureVoiceKind::Standard, 100, 0);
            assert_eq!(b.cost_microdollars, 0);
            assert_eq!(b.characters_free, 100);
        }

        #[test]
        fn free_tier_overage_is_neither_free_nor_paid() {
            let b = calculate_cost(AzureTier::Free, AzureVoiceKind::Standard, 1000, 499_500);
            assert_eq!(b.characters_free, 500);
            assert_eq!(b.characters_paid, 0);
            assert_eq!(b.cost_microdollars, 0);
        }

        #[test]
        fn standard_tier_bills_every_character() {
            let b = calculate_cost(AzureTier::Standard, AzureVoiceKind::Standard, 1_000_000, 0);
            assert_eq!(b.characters_free, 0);
            assert_eq!(b.characters_paid, 1_000_000);
            assert!((b.amount_usd() - 15.0).abs() < 1e-12);
        }

        #[test]
        fn dragon_hd_rate_applies() {
            let b = calculate_cost(AzureTier::Standard, AzureVoiceKind::DragonHd, 200_000, 0);
            assert!((b.amount_usd() - 6.0).abs() < 1e-12);
        }

        #[test]
        fn custom_rate_applies() {
            let b = calculate_cost(AzureTier::Standard, AzureVoiceKind::Custom, 500_000, 0);
            assert!((b.amount_usd() - 12.0).abs() < 1e-12);
        }
    }

    mod ledger {
        use super::*;

        #[test]
        fn usage_accumulates_within_period() {
            let l = update_usage_at(None, AzureTier::Free, 100, "2026-08");
            let l = update_usage_at(Some(&l), AzureTier::Free, 50, "2026-08");
            assert_eq!(l.characters, 150);
        }

        #[test]
        fn stale_period_resets_counter() {
            let l = update_usage_at(None, AzureTier::Free, 400_000, "2026-07");
            let next = update_usage_at(Some(&l), AzureTier::Free, 10, "2026-08");
            assert_eq!(next.characters, 10);
        }

        #[test]
        fn tier_change_resets_like_a_period_change() {
            let l = update_usage_at(None, AzureTier::Free, 400_000, "2026-08");
            let next = update_usage_at(Some(&l), AzureTier::Standard, 10, "2026-08");
            assert_eq!(next.tier, AzureTier::Standard);
            assert_eq!(next.characters, 10);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn free_tier_costs_zero_for_all_inputs(
                used in 0u64..100_000_000,
                prior in 0u64..100_000_000,
            ) {
                let b = calculate_cost(AzureTier::Free, AzureVoiceKind::Standard, used, prior);
                prop_assert_eq!(b.cost_microdollars, 0);
            }

            #[test]
            fn standard_tier_split_is_exhaustive(
                used in 0u64..10_000_000,
                prior in 0u64..10_000_000,
            ) {
                for kind in [
                    AzureVoiceKind::Standard,
                    AzureVoiceKind::DragonHd,
                    AzureVoiceKind::Custom,
                ] {
                    let b = calculate_cost(AzureTier::Standard, kind, used, prior);
                    prop_assert_eq!(b.characters_free + b.characters_paid, used);
                }
            }
        }
    }
}
