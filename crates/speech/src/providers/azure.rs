//! Azure Cognitive Services Speech backend
//!
//! Talks to the regional REST endpoints with a subscription key:
//!
//! - `GET {base}/voices/list` - voice inventory, cached after the first
//!   fetch
//! - `POST {base}/v1` - SSML in, audio bytes out, format selected via the
//!   `X-Microsoft-OutputFormat` header
//!
//! Like the Google backend, billable characters are reported through the
//! [`SpeakOutcome`] for the manager's cost tracking.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::AzureConfig;
use crate::error::SpeechError;
use crate::ports::{AudioSink, SpeechBackend};
use crate::types::{
    AudioData, AudioFormat, BackendId, SpeakOptions, SpeakOutcome, VoiceGender, VoiceInfo,
};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Cloud TTS backend for Azure Cognitive Services Speech
pub struct AzureBackend {
    config: AzureConfig,
    client: Client,
    sink: Arc<dyn AudioSink>,
    voices: parking_lot::Mutex<Option<Vec<VoiceInfo>>>,
    stop_epoch: AtomicU64,
}

impl std::fmt::Debug for AzureBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBackend")
            .field("region", &self.config.region)
            .field("has_key", &self.config.subscription_key.is_some())
            .finish_non_exhaustive()
    }
}

/// Entry of the `/voices/list` response
#[derive(Debug, Deserialize)]
struct AzureVoice {
    #[serde(rename = "ShortName")]
    short_name: String,
    #[serde(rename = "DisplayName", default)]
    display_name: Option<String>,
    #[serde(rename = "Locale", default)]
    locale: Option<String>,
    #[serde(rename = "Gender", default)]
    gender: Option<String>,
}

/// Escape text for embedding in SSML
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Prosody rate attribute for a speed multiplier (`1.5` → `+50%`)
fn prosody_rate(speed: f32) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let percent = ((speed - 1.0) * 100.0).round() as i32;
    format!("{percent:+}%")
}

/// Build the SSML document for a synthesis request
fn build_ssml(language: &str, voice: &str, speed: Option<f32>, text: &str) -> String {
    let body = match speed {
        Some(speed) => format!(
            "<prosody rate='{}'>{}</prosody>",
            prosody_rate(speed),
            escape_xml(text)
        ),
        None => escape_xml(text),
    };
    format!(
        "<speak version='1.0' xml:lang='{language}'><voice name='{voice}'>{body}</voice></speak>"
    )
}

impl AzureBackend {
    /// Create a new Azure backend.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when no subscription key is present,
    /// or `Validation` when the configuration is otherwise invalid.
    pub fn new(config: AzureConfig, sink: Arc<dyn AudioSink>) -> Result<Self, SpeechError> {
        config.validate().map_err(|reason| SpeechError::Validation {
            backend: BackendId::Azure,
            reason,
        })?;
        if config.subscription_key.is_none() {
            return Err(SpeechError::MissingCredentials {
                backend: BackendId::Azure,
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SpeechError::Validation {
                backend: BackendId::Azure,
                reason: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            config,
            client,
            sink,
            voices: parking_lot::Mutex::new(None),
            stop_epoch: AtomicU64::new(0),
        })
    }

    fn subscription_key(&self) -> &str {
        self.config.subscription_key.as_deref().unwrap_or_default()
    }

    /// Locale embedded in an Azure short voice name
    /// (`en-US-JennyNeural` → `en-US`)
    fn locale_of(voice_name: &str) -> String {
        let mut parts = voice_name.splitn(3, '-');
        match (parts.next(), parts.next()) {
            (Some(lang), Some(region)) => format!("{lang}-{region}"),
            _ => "en-US".to_string(),
        }
    }

    fn map_gender(raw: Option<&str>) -> Option<VoiceGender> {
        match raw? {
            "Male" => Some(VoiceGender::Male),
            "Female" => Some(VoiceGender::Female),
            "Neutral" => Some(VoiceGender::Neutral),
            _ => None,
        }
    }

    async fn fetch_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        let response = self
            .client
            .get(self.config.voices_url())
            .header(SUBSCRIPTION_KEY_HEADER, self.subscription_key())
            .send()
            .await
            .map_err(|e| SpeechError::VoiceList {
                backend: BackendId::Azure,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SpeechError::InvalidCredentials {
                backend: BackendId::Azure,
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::VoiceList {
                backend: BackendId::Azure,
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let inventory: Vec<AzureVoice> =
            response.json().await.map_err(|e| SpeechError::VoiceList {
                backend: BackendId::Azure,
                reason: format!("failed to parse inventory: {e}"),
            })?;

        Ok(inventory
            .into_iter()
            .map(|v| {
                let name = v.display_name.unwrap_or_else(|| v.short_name.clone());
                let locale = v
                    .locale
                    .unwrap_or_else(|| Self::locale_of(&v.short_name));
                let gender = Self::map_gender(v.gender.as_deref());
                let mut voice = VoiceInfo::new(v.short_name, name, locale, BackendId::Azure);
                if let Some(gender) = gender {
                    voice = voice.with_gender(gender);
                }
                voice
            })
            .collect())
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &SpeakOptions,
    ) -> Result<AudioData, SpeechError> {
        let voice = options
            .voice
            .as_deref()
            .unwrap_or(&self.config.default_voice);
        let ssml = build_ssml(&Self::locale_of(voice), voice, options.speed, text);

        let response = self
            .client
            .post(self.config.synthesis_url())
            .header(SUBSCRIPTION_KEY_HEADER, self.subscription_key())
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &self.config.output_format)
            .body(ssml)
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis {
                backend: BackendId::Azure,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SpeechError::InvalidCredentials {
                backend: BackendId::Azure,
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis {
                backend: BackendId::Azure,
                reason: format!("HTTP {status}: {body}"),
            });
        }

        let audio: Bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::Synthesis {
                backend: BackendId::Azure,
                reason: format!("failed to read audio: {e}"),
            })?;

        debug!(audio_size = audio.len(), "synthesis complete");
        Ok(AudioData::new(audio.to_vec(), AudioFormat::Mp3))
    }
}

#[async_trait]
impl SpeechBackend for AzureBackend {
    fn id(&self) -> BackendId {
        BackendId::Azure
    }

    async fn is_configured(&self) -> bool {
        self.config
            .subscription_key
            .as_deref()
            .is_some_and(|k| !k.is_empty())
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        if !self.is_configured().await {
            return Err(SpeechError::MissingCredentials {
                backend: BackendId::Azure,
            });
        }
        if let Some(cached) = self.voices.lock().clone() {
            return Ok(cached);
        }

        let voices = self.fetch_voices().await?;
        *self.voices.lock() = Some(voices.clone());
        Ok(voices)
    }

    #[instrument(skip(self, text, options), fields(text_len = text.len()))]
    async fn speak(&self, text: &str, options: &SpeakOptions) -> Result<SpeakOutcome, SpeechError> {
        options.callbacks.notify_start();
        let epoch = self.stop_epoch.load(Ordering::SeqCst);

        let result = self.synthesize(text, options).await;
        let result = match result {
            Ok(audio) if self.stop_epoch.load(Ordering::SeqCst) == epoch => self
                .sink
                .play(audio)
                .await
                .map_err(|e| SpeechError::Playback {
                    backend: BackendId::Azure,
                    reason: e.to_string(),
                }),
            Ok(_) => {
                debug!("stopped during synthesis; skipping playback");
                Ok(())
            }
            Err(e) => Err(e),
        };

        options.callbacks.notify_stop();
        #[allow(clippy::cast_possible_truncation)]
        result.map(|()| SpeakOutcome::billed(text.chars().count() as u64))
    }

    async fn stop(&self) {
        self.stop_epoch.fetch_add(1, Ordering::SeqCst);
        self.sink.stop().await;
    }

    async fn validate(&self) -> Result<(), SpeechError> {
        let voices = self.fetch_voices().await.map_err(|e| match e {
            err @ SpeechError::InvalidCredentials { .. } => err,
            other => SpeechError::Validation {
                backend: BackendId::Azure,
                reason: other.to_string(),
            },
        })?;
        *self.voices.lock() = Some(voices);
        Ok(())
    }
}
