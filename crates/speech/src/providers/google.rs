//! Google Cloud Text-to-Speech backend
//!
//! Talks to the REST API with an API key:
//!
//! - `GET {base}/voices` - voice inventory, cached after the first fetch
//! - `POST {base}/text:synthesize` - returns base64 `audioContent`
//!
//! Billable characters are the characters of the submitted text; the
//! backend reports them in its [`SpeakOutcome`] so the manager can feed
//! the cost tracker.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::GoogleConfig;
use crate::error::SpeechError;
use crate::ports::{AudioSink, SpeechBackend};
use crate::types::{
    AudioData, AudioFormat, BackendId, SpeakOptions, SpeakOutcome, VoiceGender, VoiceInfo,
};

/// Cloud TTS backend for Google Cloud Text-to-Speech
pub struct GoogleBackend {
    config: GoogleConfig,
    client: Client,
    sink: Arc<dyn AudioSink>,
    voices: parking_lot::Mutex<Option<Vec<VoiceInfo>>>,
    stop_epoch: AtomicU64,
}

impl std::fmt::Debug for GoogleBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleBackend")
            .field("base_url", &self.config.base_url)
            .field("has_key", &self.config.api_key.is_some())
            .finish_non_exhaustive()
    }
}

/// Synthesis request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    speaking_rate: Option<f32>,
}

/// Synthesis response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

/// Google API error response
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull the human-readable message out of an error body, falling back to
/// the raw body
fn error_reason(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiError>(body).map_or_else(
        |_| format!("HTTP {status}: {body}"),
        |api_error| format!("HTTP {status}: {}", api_error.error.message),
    )
}

/// Voice inventory response
#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<GoogleVoice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleVoice {
    name: String,
    #[serde(default)]
    language_codes: Vec<String>,
    #[serde(default)]
    ssml_gender: Option<String>,
}

impl GoogleBackend {
    /// Create a new Google backend.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when no API key is present, or
    /// `Validation` when the configuration is otherwise invalid.
    pub fn new(config: GoogleConfig, sink: Arc<dyn AudioSink>) -> Result<Self, SpeechError> {
        config.validate().map_err(|reason| SpeechError::Validation {
            backend: BackendId::GoogleCloud,
            reason,
        })?;
        if config.api_key.is_none() {
            return Err(SpeechError::MissingCredentials {
                backend: BackendId::GoogleCloud,
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SpeechError::Validation {
                backend: BackendId::GoogleCloud,
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

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or_default()
    }

    /// Language tag embedded in a Google voice name
    /// (`en-US-Wavenet-A` → `en-US`)
    fn language_of(voice_name: &str) -> String {
        let mut parts = voice_name.splitn(3, '-');
        match (parts.next(), parts.next()) {
            (Some(lang), Some(region)) => format!("{lang}-{region}"),
            _ => "en-US".to_string(),
        }
    }

    fn map_gender(raw: Option<&str>) -> Option<VoiceGender> {
        match raw? {
            "MALE" => Some(VoiceGender::Male),
            "FEMALE" => Some(VoiceGender::Female),
            "NEUTRAL" => Some(VoiceGender::Neutral),
            _ => None,
        }
    }

    async fn fetch_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        let url = format!("{}/voices", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key())])
            .send()
            .await
            .map_err(|e| SpeechError::VoiceList {
                backend: BackendId::GoogleCloud,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SpeechError::InvalidCredentials {
                backend: BackendId::GoogleCloud,
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::VoiceList {
                backend: BackendId::GoogleCloud,
                reason: error_reason(status, &body),
            });
        }

        let inventory: VoicesResponse =
            response.json().await.map_err(|e| SpeechError::VoiceList {
                backend: BackendId::GoogleCloud,
                reason: format!("failed to parse inventory: {e}"),
            })?;

        Ok(inventory
            .voices
            .into_iter()
            .map(|v| {
                let language = v
                    .language_codes
                    .first()
                    .cloned()
                    .unwrap_or_else(|| Self::language_of(&v.name));
                let gender = Self::map_gender(v.ssml_gender.as_deref());
                let mut voice =
                    VoiceInfo::new(v.name.clone(), v.name, language, BackendId::GoogleCloud);
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
        let language = Self::language_of(voice);

        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &language,
                name: voice,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: options.speed,
            },
        };

        let url = format!("{}/text:synthesize", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key())])
            .json(&request)
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis {
                backend: BackendId::GoogleCloud,
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SpeechError::InvalidCredentials {
                backend: BackendId::GoogleCloud,
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis {
                backend: BackendId::GoogleCloud,
                reason: error_reason(status, &body),
            });
        }

        let body: SynthesizeResponse =
            response.json().await.map_err(|e| SpeechError::Synthesis {
                backend: BackendId::GoogleCloud,
                reason: format!("failed to parse response: {e}"),
            })?;

        let audio = BASE64
            .decode(body.audio_content)
            .map_err(|e| SpeechError::Synthesis {
                backend: BackendId::GoogleCloud,
                reason: format!("invalid base64 audio: {e}"),
            })?;

        debug!(audio_size = audio.len(), "synthesis complete");
        Ok(AudioData::new(audio, AudioFormat::Mp3))
    }
}

#[async_trait]
impl SpeechBackend for GoogleBackend {
    fn id(&self) -> BackendId {
        BackendId::GoogleCloud
    }

    async fn is_configured(&self) -> bool {
        self.config.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        if !self.is_configured().await {
            return Err(SpeechError::MissingCredentials {
                backend: BackendId::GoogleCloud,
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
                    backend: BackendId::GoogleCloud,
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
                backend: BackendId::GoogleCloud,
                reason: other.to_string(),
            },
        })?;
        *self.voices.lock() = Some(voices);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullSink;

    fn configured() -> GoogleConfig {
        GoogleConfig {
            api_key: Some("test-key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn construction_requires_an_api_key() {
        let result = GoogleBackend::new(GoogleConfig::default(), Arc::new(NullSink));
        assert!(matches!(
            result,
            Err(SpeechError::MissingCredentials {
                backend: BackendId::GoogleCloud
            })
        ));
    }

    #[test]
    fn construction_succeeds_with_key() {
        assert!(GoogleBackend::new(configured(), Arc::new(NullSink)).is_ok());
    }

    #[test]
    fn language_is_derived_from_voice_name() {
        assert_eq!(GoogleBackend::language_of("en-US-Wavenet-A"), "en-US");
        assert_eq!(GoogleBackend::language_of("de-DE-Chirp3-HD-Achernar"), "de-DE");
        assert_eq!(GoogleBackend::language_of("nonsense"), "en-US");
    }

    #[test]
    fn gender_mapping_handles_unknowns() {
        assert_eq!(
            GoogleBackend::map_gender(Some("FEMALE")),
            Some(VoiceGender::Female)
        );
        assert_eq!(
            GoogleBackend::map_gender(Some("SSML_VOICE_GENDER_UNSPECIFIED")),
            None
        );
        assert_eq!(GoogleBackend::map_gender(None), None);
    }

    #[tokio::test]
    async fn is_configured_checks_key_presence() {
        let backend = GoogleBackend::new(configured(), Arc::new(NullSink)).unwrap();
        assert!(backend.is_configured().await);
    }
}
