//! Speech synthesis errors
//!
//! Every variant carries the identity of the backend it originated from,
//! so callers can tell a missing Google key from a failed Azure synthesis
//! without parsing messages.

use thiserror::Error;

use crate::types::BackendId;

/// Errors that can occur across the speech subsystem
#[derive(Debug, Error)]
pub enum SpeechError {
    /// The backend has no credentials at all
    #[error("{backend}: credentials are missing")]
    MissingCredentials {
        /// Backend the error originated from
        backend: BackendId,
    },

    /// The backend's credentials were rejected by the service
    #[error("{backend}: credentials were rejected: {reason}")]
    InvalidCredentials {
        /// Backend the error originated from
        backend: BackendId,
        /// Service-reported reason
        reason: String,
    },

    /// Operation attempted on an unregistered or unconfigured backend
    #[error("{backend}: backend is not configured: {reason}")]
    NotConfigured {
        /// Backend the error originated from
        backend: BackendId,
        /// What was missing
        reason: String,
    },

    /// Fetching the backend's voice inventory failed
    #[error("{backend}: voice listing failed: {reason}")]
    VoiceList {
        /// Backend the error originated from
        backend: BackendId,
        /// Underlying failure
        reason: String,
    },

    /// Synthesis failed
    #[error("{backend}: synthesis failed: {reason}")]
    Synthesis {
        /// Backend the error originated from
        backend: BackendId,
        /// Underlying failure
        reason: String,
    },

    /// Playback of synthesized audio failed
    #[error("{backend}: playback failed: {reason}")]
    Playback {
        /// Backend the error originated from
        backend: BackendId,
        /// Underlying failure
        reason: String,
    },

    /// Credential validation check failed
    #[error("{backend}: validation failed: {reason}")]
    Validation {
        /// Backend the error originated from
        backend: BackendId,
        /// Underlying failure
        reason: String,
    },
}

impl SpeechError {
    /// Backend this error originated from
    #[must_use]
    pub const fn backend(&self) -> BackendId {
        match self {
            Self::MissingCredentials { backend }
            | Self::InvalidCredentials { backend, .. }
            | Self::NotConfigured { backend, .. }
            | Self::VoiceList { backend, .. }
            | Self::Synthesis { backend, .. }
            | Self::Playback { backend, .. }
            | Self::Validation { backend, .. } => *backend,
        }
    }
}

/// Error raised by an [`crate::ports::AudioSink`] implementation.
///
/// Sinks do not know which backend produced the audio; providers lift this
/// into [`SpeechError::Playback`] with their own tag.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PlaybackError(pub String);
