//! Port definitions for speech synthesis
//!
//! Defines the traits (ports) that backend and playback adapters must
//! implement. The manager holds backends only through [`SpeechBackend`],
//! so new backends extend the system without touching the manager.

use async_trait::async_trait;

use crate::error::{PlaybackError, SpeechError};
use crate::types::{AudioData, BackendId, SpeakOptions, SpeakOutcome, VoiceInfo};
use pricing::CostBreakdown;

/// Port for a speech-synthesis backend.
///
/// The manager serializes `speak` calls across the whole system through
/// its queue; backend-level handling of overlapping calls is a secondary
/// safety net, not the primary guarantee.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Identity of this backend
    fn id(&self) -> BackendId;

    /// Whether the backend has the minimum credentials to attempt
    /// synthesis. The baseline backend is always configured.
    async fn is_configured(&self) -> bool;

    /// List available voices.
    ///
    /// Returns a cached list once fetched; the cache lives until the
    /// backend instance is replaced by a credential update.
    ///
    /// # Errors
    ///
    /// Cloud backends fail with a credentials error when unconfigured;
    /// the baseline backend never does.
    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError>;

    /// Synthesize and play `text`.
    ///
    /// Invokes the request's `on_start` hook synchronously before the
    /// first await, and its `on_stop` hook exactly once when the dispatch
    /// terminates by success, failure, or [`Self::stop`].
    ///
    /// # Errors
    ///
    /// Returns `SpeechError` if synthesis or playback fails.
    async fn speak(&self, text: &str, options: &SpeakOptions) -> Result<SpeakOutcome, SpeechError>;

    /// Stop any in-progress synthesis or playback. Idempotent.
    async fn stop(&self);

    /// Exercise the backend's credentials (e.g. a lightweight inventory
    /// call), as opposed to the mere presence check of
    /// [`Self::is_configured`].
    ///
    /// # Errors
    ///
    /// Returns the specific taxonomy error the check ran into.
    async fn validate(&self) -> Result<(), SpeechError>;
}

/// Port for playing synthesized audio.
///
/// The process mechanics of audio output are an external concern; backends
/// only hand bytes across this boundary.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play the audio to completion.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError` if the audio could not be played.
    async fn play(&self, audio: AudioData) -> Result<(), PlaybackError>;

    /// Interrupt the current playback, if any. Idempotent.
    async fn stop(&self);
}

/// Port for receiving cost notifications.
///
/// The manager invokes this after every successful metered synthesis with
/// the breakdown the calculator produced.
pub trait CostObserver: Send + Sync {
    /// A metered synthesis completed and was priced
    fn cost_incurred(&self, backend: BackendId, breakdown: &CostBreakdown);
}
