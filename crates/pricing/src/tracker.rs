//! Stateful wrapper over the per-vendor ledgers
//!
//! The pure calculators take ledgers in and return ledgers out; the
//! `CostTracker` is the small amount of glue that holds the current ledger
//! per vendor, applies a synthesis, and hands back the breakdown. It is
//! serializable so the application's persistence layer owns durability:
//! load it at startup, snapshot it after use.

use serde::{Deserialize, Serialize};

use crate::azure::{self, AzureTier, AzureUsageLedger};
use crate::breakdown::CostBreakdown;
use crate::google::{self, GoogleUsageLedger};
use crate::period::current_period;

/// Running monthly usage for both cloud vendors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTracker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    google: Option<GoogleUsageLedger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    azure: Option<AzureUsageLedger>,
}

impl CostTracker {
    /// Tracker with no recorded usage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a tracker from previously persisted ledgers
    #[must_use]
    pub const fn from_ledgers(
        google: Option<GoogleUsageLedger>,
        azure: Option<AzureUsageLedger>,
    ) -> Self {
        Self { google, azure }
    }

    /// Record a Google synthesis and return its cost breakdown.
    ///
    /// The voice name is classified into its pricing bucket, priced against
    /// the usage already recorded for that bucket this month, and the
    /// ledger is advanced.
    pub fn record_google(&mut self, voice_name: &str, characters: u64) -> CostBreakdown {
        self.record_google_at(voice_name, characters, &current_period())
    }

    /// Clock-independent variant of [`Self::record_google`]
    pub fn record_google_at(
        &mut self,
        voice_name: &str,
        characters: u64,
        period: &str,
    ) -> CostBreakdown {
        let class = google::detect_voice_class(voice_name);
        let prior = match &self.google {
            Some(ledger) if ledger.period == period => ledger.usage_for(class),
            _ => 0,
        };
        let breakdown = google::calculate_cost(class, characters, prior);
        self.google = Some(google::update_usage_at(
            self.google.as_ref(),
            class,
            characters,
            period,
        ));
        breakdown
    }

    /// Record an Azure synthesis and return its cost breakdown.
    ///
    /// The subscription tier decides the billing rule; the voice name only
    /// selects the rate bucket on the standard tier.
    pub fn record_azure(
        &mut self,
        tier: AzureTier,
        voice_name: &str,
        characters: u64,
    ) -> CostBreakdown {
        self.record_azure_at(tier, voice_name, characters, &current_period())
    }

    /// Clock-independent variant of [`Self::record_azure`]
    pub fn record_azure_at(
        &mut self,
        tier: AzureTier,
        voice_name: &str,
        characters: u64,
        period: &str,
    ) -> CostBreakdown {
        let kind = azure::detect_voice_kind(voice_name);
        let prior = match &self.azure {
            Some(ledger) if ledger.period == period && ledger.tier == tier => ledger.characters,
            _ => 0,
        };
        let breakdown = azure::calculate_cost(tier, kind, characters, prior);
        self.azure = Some(azure::update_usage_at(
            self.azure.as_ref(),
            tier,
            characters,
            period,
        ));
        breakdown
    }

    /// Current Google ledger, if any usage has been recorded
    #[must_use]
    pub const fn google_ledger(&self) -> Option<&GoogleUsageLedger> {
        self.google.as_ref()
    }

    /// Current Azure ledger, if any usage has been recorded
    #[must_use]
    pub const fn azure_ledger(&self) -> Option<&AzureUsageLedger> {
        self.azure.as_ref()
    }
}
