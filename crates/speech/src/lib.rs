//! Speech - interchangeable speech-synthesis backends behind one manager
//!
//! Lets an application speak text aloud through one of several backends
//! while tracking the monetary cost of cloud usage:
//!
//! - `EspeakBackend` - baseline local engine (eSpeak NG), always available
//! - `GoogleBackend` - Google Cloud Text-to-Speech
//! - `AzureBackend` - Azure Cognitive Services Speech
//!
//! # Architecture
//!
//! This crate follows the ports & adapters pattern:
//! - `ports` module defines the traits (`SpeechBackend`, `AudioSink`,
//!   `CostObserver`)
//! - `providers` module contains the concrete backends
//! - `manager` module owns the registry, the single-flight FIFO queue,
//!   and the fallback-to-baseline protocol
//!
//! The manager holds backends only through the `SpeechBackend` trait, so
//! backends are interchangeable and new ones extend the system without
//! touching the manager.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use speech::{ProcessPlayer, ProviderCredentials, SpeakOptions, SpeechManager, SystemConfig};
//!
//! let manager = SpeechManager::new(SystemConfig::default(), Arc::new(ProcessPlayer::ffplay()));
//!
//! // Baseline-only until credentials are registered
//! manager.register_provider(speech::BackendId::GoogleCloud, ProviderCredentials::GoogleCloud(google_config))?;
//! manager.set_active_provider(speech::BackendId::GoogleCloud).await?;
//!
//! // Requests queue FIFO; a failing cloud backend degrades to the baseline
//! manager.speak("Hello, world!", SpeakOptions::new()).await?;
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod playback;
pub mod ports;
pub mod providers;
pub mod types;

pub use config::{AzureConfig, GoogleConfig, SystemConfig};
pub use error::{PlaybackError, SpeechError};
pub use manager::{ProviderCredentials, SpeechManager};
pub use playback::{NullSink, ProcessPlayer};
pub use ports::{AudioSink, CostObserver, SpeechBackend};
pub use providers::{AzureBackend, EspeakBackend, GoogleBackend};
pub use types::{
    AudioData, AudioFormat, BackendId, SpeakCallbacks, SpeakOptions, SpeakOutcome, VoiceGender,
    VoiceInfo,
};
