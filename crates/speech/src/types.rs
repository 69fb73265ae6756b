//! Types for speech synthesis
//!
//! Contains the backend identity, voice metadata, per-request options, and
//! the audio container handed to the playback port.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Slowest supported speaking speed multiplier
pub const SPEED_MIN: f32 = 0.1;
/// Fastest supported speaking speed multiplier
pub const SPEED_MAX: f32 = 2.0;

/// Identity of a registered speech backend.
///
/// Stable for the lifetime of the manager. `System` is the baseline: it is
/// always registered, never removable, and serves as the fallback target
/// when a cloud backend fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Local OS voice engine (eSpeak NG)
    #[default]
    System,
    /// Google Cloud Text-to-Speech
    #[serde(rename = "google")]
    GoogleCloud,
    /// Azure Cognitive Services Speech
    Azure,
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::GoogleCloud => f.write_str("google"),
            Self::Azure => f.write_str("azure"),
        }
    }
}

/// Voice gender classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    /// Male voice
    Male,
    /// Female voice
    Female,
    /// Neutral/androgynous voice
    Neutral,
}

/// Information about an available voice.
///
/// Voices are backend-scoped: an id from one backend is meaningless to
/// another, which is why the owning backend travels with the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Backend-specific voice identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// BCP-47 language tag (e.g. "en-US")
    pub language: String,
    /// Gender (if known)
    pub gender: Option<VoiceGender>,
    /// Backend this voice belongs to
    pub backend: BackendId,
}

impl VoiceInfo {
    /// Create a new voice record
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        language: impl Into<String>,
        backend: BackendId,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
            gender: None,
            backend,
        }
    }

    /// Set the gender
    #[must_use]
    pub const fn with_gender(mut self, gender: VoiceGender) -> Self {
        self.gender = Some(gender);
        self
    }
}

/// Lifecycle hooks fired around a single dispatch.
///
/// `on_start` runs synchronously before the backend yields to its
/// asynchronous work; `on_stop` runs exactly once per dispatch when the
/// operation terminates, whether by success, failure, or an external stop.
#[derive(Clone, Default)]
pub struct SpeakCallbacks {
    on_start: Option<Arc<dyn Fn() + Send + Sync>>,
    on_stop: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl SpeakCallbacks {
    /// Invoke the start hook, if any
    pub fn notify_start(&self) {
        if let Some(hook) = &self.on_start {
            hook();
        }
    }

    /// Invoke the stop hook, if any
    pub fn notify_stop(&self) {
        if let Some(hook) = &self.on_stop {
            hook();
        }
    }
}

impl std::fmt::Debug for SpeakCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakCallbacks")
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Options for a single speak request. Immutable once enqueued.
#[derive(Debug, Clone, Default)]
pub struct SpeakOptions {
    /// Voice to use, overriding the remembered per-backend selection
    pub voice: Option<String>,
    /// Speaking speed multiplier in [`SPEED_MIN`]..=[`SPEED_MAX`]
    pub speed: Option<f32>,
    /// Lifecycle hooks fired around each dispatch
    pub callbacks: SpeakCallbacks,
}

impl SpeakOptions {
    /// Options with all defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the voice id
    #[must_use]
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Set the speaking speed multiplier
    #[must_use]
    pub const fn with_speed(mut self, speed: f32) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Set the start hook
    #[must_use]
    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_start = Some(Arc::new(hook));
        self
    }

    /// Set the stop hook
    #[must_use]
    pub fn on_stop(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.callbacks.on_stop = Some(Arc::new(hook));
        self
    }
}

/// What a backend reports after a successful dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakOutcome {
    /// Billable characters consumed, reported by cloud backends only
    pub characters: Option<u64>,
}

impl SpeakOutcome {
    /// Outcome of a metered (cloud) synthesis
    #[must_use]
    pub const fn billed(characters: u64) -> Self {
        Self {
            characters: Some(characters),
        }
    }

    /// Outcome of an unmetered (local) synthesis
    #[must_use]
    pub const fn unmetered() -> Self {
        Self { characters: None }
    }
}

/// Audio container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MP3 format
    Mp3,
    /// WAV format (uncompressed)
    Wav,
    /// OGG container
    Ogg,
}

impl AudioFormat {
    /// MIME type for this format
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
        }
    }
}

/// Synthesized audio bytes plus their format
#[derive(Debug, Clone)]
pub struct AudioData {
    data: Vec<u8>,
    format: AudioFormat,
}

impl AudioData {
    /// Create new audio data
    #[must_use]
    pub const fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }

    /// Raw audio bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume and return the raw audio bytes
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Audio format
    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    /// Size of the audio data in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Whether the audio data is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
