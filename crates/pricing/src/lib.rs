//! Pricing - usage-based cost accounting for cloud speech synthesis
//!
//! Converts characters-synthesized into metered cost given each vendor's
//! free-tier rules:
//!
//! - `google` - per-character rates per voice model family, each family
//!   with its own monthly free allowance
//! - `azure` - subscription-tier billing: a hard-capped free tier that
//!   never bills, and a standard tier that bills every character
//!
//! The calculators are pure: ledgers go in, breakdowns and new ledgers come
//! out, and nothing here touches storage. [`CostTracker`] is the small
//! stateful wrapper an application persists.
//!
//! # Example
//!
//! ```
//! use pricing::{CostTracker, google};
//!
//! let class = google::detect_voice_class("en-US-Wavenet-A");
//! let breakdown = google::calculate_cost(class, 2_000_000, 0);
//! assert_eq!(breakdown.characters_paid, 1_000_000);
//!
//! let mut tracker = CostTracker::new();
//! let breakdown = tracker.record_google("en-US-Wavenet-A", 10_000);
//! assert!(breakdown.is_free());
//! ```

pub mod azure;
pub mod breakdown;
pub mod google;
pub mod period;
pub mod tracker;

pub use azure::{AzureTier, AzureUsageLedger, AzureVoiceKind};
pub use breakdown::{CostBreakdown, MicroUsd};
pub use google::{GoogleUsageLedger, GoogleVoiceClass};
pub use period::current_period;
pub use tracker::CostTracker;
