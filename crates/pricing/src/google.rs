//! Google Cloud Text-to-Speech pricing
//!
//! Google bills per character, per voice model family, each family with its
//! own monthly free allowance. The family is not reported by the synthesis
//! API, so it is inferred from the voice name (`en-US-Wavenet-A`,
//! `en-US-Chirp3-HD-Achernar`, ...). The usage ledger keeps one counter per
//! family for the current calendar month.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::breakdown::{CostBreakdown, MicroUsd};
use crate::period::current_period;

/// Voice model family, i.e. the pricing bucket a Google voice bills under
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum GoogleVoiceClass {
    /// Standard parametric voices ($4/1M chars, 4M free per month)
    #[default]
    Standard,
    /// WaveNet and Neural2 voices ($16/1M chars, 1M free)
    Wavenet,
    /// Studio voices ($160/1M chars, 1M free)
    Studio,
    /// Chirp HD voices ($30/1M chars, 1M free)
    ChirpHd,
    /// Instant custom voices ($60/1M chars, no free allowance)
    InstantCustom,
}

impl GoogleVoiceClass {
    /// Stable label used as the breakdown classification and ledger key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Wavenet => "wavenet",
            Self::Studio => "studio",
            Self::ChirpHd => "chirp-hd",
            Self::InstantCustom => "instant-custom",
        }
    }

    /// Monthly free allowance in characters
    #[must_use]
    pub const fn free_allowance(self) -> u64 {
        match self {
            Self::Standard => 4_000_000,
            Self::Wavenet | Self::Studio | Self::ChirpHd => 1_000_000,
            Self::InstantCustom => 0,
        }
    }

    /// Per-character rate in micro-dollars
    #[must_use]
    pub const fn rate(self) -> MicroUsd {
        match self {
            Self::Standard => 4,
            Self::Wavenet => 16,
            Self::Studio => 160,
            Self::ChirpHd => 30,
            Self::InstantCustom => 60,
        }
    }
}

impl std::fmt::Display for GoogleVoiceClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered name markers, most specific first. The first marker contained in
/// the lowercased voice name wins; no match falls through to Standard.
const CLASS_MARKERS: &[(&str, GoogleVoiceClass)] = &[
    ("chirp3-hd", GoogleVoiceClass::ChirpHd),
    ("chirp-hd", GoogleVoiceClass::ChirpHd),
    ("chirp", GoogleVoiceClass::ChirpHd),
    ("instant-custom", GoogleVoiceClass::InstantCustom),
    ("studio", GoogleVoiceClass::Studio),
    ("neural2", GoogleVoiceClass::Wavenet),
    ("wavenet", GoogleVoiceClass::Wavenet),
    ("polyglot", GoogleVoiceClass::Wavenet),
    ("news", GoogleVoiceClass::Wavenet),
    ("casual", GoogleVoiceClass::Wavenet),
];

/// Classify a voice name into its pricing bucket.
///
/// Matching is case-insensitive substring containment against a fixed
/// ordered marker list. Unknown names price as Standard, the cheapest
/// bucket.
#[must_use]
pub fn detect_voice_class(voice_name: &str) -> GoogleVoiceClass {
    let name = voice_name.to_lowercase();
    CLASS_MARKERS
        .iter()
        .find(|(marker, _)| name.contains(marker))
        .map_or(GoogleVoiceClass::Standard, |&(_, class)| class)
}

/// Price `characters` of synthesis under `class`, given the characters
/// already consumed in the current period for that class.
#[must_use]
pub fn calculate_cost(class: GoogleVoiceClass, characters: u64, prior_usage: u64) -> CostBreakdown {
    CostBreakdown::metered(
        class.as_str(),
        characters,
        class.free_allowance(),
        prior_usage,
        class.rate(),
    )
}

/// Monthly usage counters, one per voice model family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleUsageLedger {
    /// Calendar month this ledger covers (`YYYY-MM`)
    pub period: String,
    /// Characters synthesized per family within the period
    pub characters: BTreeMap<GoogleVoiceClass, u64>,
}

impl GoogleUsageLedger {
    /// Fresh zeroed ledger for the given period
    #[must_use]
    pub fn new(period: impl Into<String>) -> Self {
        Self {
            period: period.into(),
            characters: BTreeMap::new(),
        }
    }

    /// Characters consumed for `class` within this ledger's period
    #[must_use]
    pub fn usage_for(&self, class: GoogleVoiceClass) -> u64 {
        self.characters.get(&class).copied().unwrap_or(0)
    }
}

/// Apply usage to the ledger for the current UTC month.
///
/// See [`update_usage_at`] for the reset semantics.
#[must_use]
pub fn update_usage(
    ledger: Option<&GoogleUsageLedger>,
    class: GoogleVoiceClass,
    characters: u64,
) -> GoogleUsageLedger {
    update_usage_at(ledger, class, characters, &current_period())
}

/// Apply usage to the ledger for an explicit period.
///
/// A missing ledger, or one whose period key differs from `period`, is
/// replaced by a fresh zeroed ledger first: usage never carries across a
/// month boundary. The input ledger is never mutated; the caller treats the
/// returned value as the new ledger.
#[must_use]
pub fn update_usage_at(
    ledger: Option<&GoogleUsageLedger>,
    class: GoogleVoiceClass,
    characters: u64,
    period: &str,
) -> GoogleUsageLedger {
    let mut next = match ledger {
        Some(current) if current.period == period => current.clone(),
        _ => GoogleUsageLedger::new(period),
    };
    *next.characters.entry(class).or_insert(0) += characters;
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    mod classification {
        use super::*;

        #[test]
        fn chirp_hd_voices_detected() {
            assert_eq!(
                detect_voice_class("en-US-Chirp3-HD-Achernar"),
                GoogleVoiceClass::ChirpHd
            );
            assert_eq!(
                detect_voice_class("en-us-chirp3-hd-test"),
                GoogleVoiceClass::ChirpHd
            );
        }

        #[test]
        fn matching_is_case_insensitive() {
            assert_eq!(
                detect_voice_class("EN-GB-WAVENET-B"),
                GoogleVoiceClass::Wavenet
            );
            assert_eq!(
                detect_voice_class("en-AU-Neural2-A"),
                GoogleVoiceClass::Wavenet
            );
        }

        #[test]
        fn studio_detected_before_fallback() {
            assert_eq!(
                detect_voice_class("en-US-Studio-O"),
                GoogleVoiceClass::Studio
            );
        }

        #[test]
        fn unknown_names_price_as_standard() {
            assert_eq!(
                detect_voice_class("en-US-Standard-C"),
                GoogleVoiceClass::Standard
            );
            assert_eq!(detect_voice_class("totally-unknown"), GoogleVoiceClass::Standard);
        }
    }

    mod cost {
        use super::*;

        #[test]
        fn standard_split_across_allowance_boundary() {
            // 3M already used of the 4M allowance; 2M more splits 1M/1M.
            let b = calculate_cost(GoogleVoiceClass::Standard, 2_000_000, 3_000_000);
            assert_eq!(b.characters_free, 1_000_000);
            assert_eq!(b.characters_paid, 1_000_000);
            assert!((b.amount_usd() - 4.0).abs() < 1e-12);
        }

        #[test]
        fn instant_custom_has_no_allowance() {
            let b = calculate_cost(GoogleVoiceClass::InstantCustom, 10_000, 0);
            assert_eq!(b.characters_free, 0);
            assert_eq!(b.characters_paid, 10_000);
            assert_eq!(b.cost_microdollars, 600_000);
        }

        #[test]
        fn split_is_exhaustive() {
            let b = calculate_cost(GoogleVoiceClass::Wavenet, 123_456, 999_000);
            assert_eq!(b.characters_free + b.characters_paid, 123_456);
        }
    }

    mod ledger {
        use super::*;

        #[test]
        fn usage_accumulates_within_period() {
            let l = update_usage_at(None, GoogleVoiceClass::Wavenet, 100, "2026-08");
            let l = update_usage_at(Some(&l), GoogleVoiceClass::Wavenet, 50, "2026-08");
            assert_eq!(l.usage_for(GoogleVoiceClass::Wavenet), 150);
        }

        #[test]
        fn stale_period_resets_all_counters() {
            let mut l = update_usage_at(None, GoogleVoiceClass::Wavenet, 500, "2026-07");
            l = update_usage_at(Some(&l), GoogleVoiceClass::Standard, 900, "2026-07");
            let next = update_usage_at(Some(&l), GoogleVoiceClass::Wavenet, 10, "2026-08");
            assert_eq!(next.period, "2026-08");
            assert_eq!(next.usage_for(GoogleVoiceClass::Wavenet), 10);
            assert_eq!(next.usage_for(GoogleVoiceClass::Standard), 0);
        }

        #[test]
        fn families_accumulate_independently() {
            let l = update_usage_at(None, GoogleVoiceClass::Standard, 100, "2026-08");
            let l = update_usage_at(Some(&l), GoogleVoiceClass::Studio, 20, "2026-08");
            assert_eq!(l.usage_for(GoogleVoiceClass::Standard), 100);
            assert_eq!(l.usage_for(GoogleVoiceClass::Studio), 20);
        }

        #[test]
        fn input_ledger_is_not_mutated() {
            let original = update_usage_at(None, GoogleVoiceClass::Standard, 100, "2026-08");
            let _ = update_usage_at(Some(&original), GoogleVoiceClass::Standard, 50, "2026-08");
            assert_eq!(original.usage_for(GoogleVoiceClass::Standard), 100);
        }

        #[test]
        fn ledger_round_trips_through_serde() {
            let l = update_usage_at(None, GoogleVoiceClass::ChirpHd, 42, "2026-08");
            let json = serde_json::to_string(&l).unwrap();
            let back: GoogleUsageLedger = serde_json::from_str(&json).unwrap();
            assert_eq!(back, l);
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn split_is_exhaustive_for_all_inputs(
                used in 0u64..10_000_000,
                prior in 0u64..20_000_000,
            ) {
                for class in [
                    GoogleVoiceClass::Standard,
                    GoogleVoiceClass::Wavenet,
                    GoogleVoiceClass::Studio,
                    GoogleVoiceClass::ChirpHd,
                    GoogleVoiceClass::InstantCustom,
                ] {
                    let b = calculate_cost(class, used, prior);
                    prop_assert_eq!(b.characters_free + b.characters_paid, used);
                }
            }

            #[test]
            fn cost_is_monotonic_in_prior_usage(
                used in 0u64..1_000_000,
                prior in 0u64..5_000_000,
            ) {
                let cheaper = calculate_cost(GoogleVoiceClass::Wavenet, used, prior);
                let pricier = calculate_cost(GoogleVoiceClass::Wavenet, used, prior + 1);
                prop_assert!(pricier.cost_microdollars >= cheaper.cost_microdollars);
            }
        }
    }
}
