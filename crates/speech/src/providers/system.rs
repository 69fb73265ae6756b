//! Baseline local backend using eSpeak NG
//!
//! Always configured: it needs no credentials, which is what makes it the
//! fallback target for the cloud backends. Synthesis shells out to the
//! engine with `--stdout` and pipes the WAV through the audio sink.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::SystemConfig;
use crate::error::SpeechError;
use crate::ports::{AudioSink, SpeechBackend};
use crate::types::{
    AudioData, AudioFormat, BackendId, SpeakOptions, SpeakOutcome, VoiceGender, VoiceInfo,
};

/// Local TTS backend shelling out to eSpeak NG
pub struct EspeakBackend {
    config: SystemConfig,
    sink: Arc<dyn AudioSink>,
    voices: parking_lot::Mutex<Option<Vec<VoiceInfo>>>,
    // Bumped by stop(); a dispatch that observes a bump skips playback
    stop_epoch: AtomicU64,
}

impl std::fmt::Debug for EspeakBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EspeakBackend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EspeakBackend {
    /// Create the baseline backend.
    ///
    /// Construction never fails: the baseline must always exist, so an
    /// invalid configuration falls back to defaults, and a missing engine
    /// binary surfaces as a synthesis error at speak time, not here.
    #[must_use]
    pub fn new(config: SystemConfig, sink: Arc<dyn AudioSink>) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(reason) => {
                warn!(%reason, "invalid system config; falling back to defaults");
                SystemConfig::default()
            }
        };
        Self {
            config,
            sink,
            voices: parking_lot::Mutex::new(None),
            stop_epoch: AtomicU64::new(0),
        }
    }

    /// Resolve the engine command: configured path, or the first of
    /// `espeak-ng` / `espeak` that responds
    async fn engine_command(&self) -> Result<String, String> {
        if let Some(command) = &self.config.command {
            return Ok(command.display().to_string());
        }
        for candidate in ["espeak-ng", "espeak"] {
            if Command::new(candidate)
                .arg("--version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .is_ok()
            {
                return Ok(candidate.to_string());
            }
        }
        Err("no eSpeak engine found on PATH".to_string())
    }

    /// Parse the `--voices` table.
    ///
    /// Format: `Pty Language Age/Gender VoiceName File Other`, e.g.
    /// ` 5  en-gb          M  english             gb  (en 2)`.
    fn parse_voice_table(output: &str) -> Vec<VoiceInfo> {
        let Ok(row) = Regex::new(r"^\s*\d+\s+([\w-]+)\s+([MF-])\s+([\w\-+]+)") else {
            return Vec::new();
        };

        let mut voices = Vec::new();
        for line in output.lines().skip(1) {
            if let Some(captures) = row.captures(line) {
                let language = captures.get(1).map_or("", |m| m.as_str()).to_string();
                let gender = match captures.get(2).map_or("", |m| m.as_str()) {
                    "M" => Some(VoiceGender::Male),
                    "F" => Some(VoiceGender::Female),
                    _ => None,
                };
                let id = captures.get(3).map_or("", |m| m.as_str()).to_string();

                let mut voice = VoiceInfo::new(
                    id.clone(),
                    format!("{language} ({id})"),
                    language,
                    BackendId::System,
                );
                if let Some(gender) = gender {
                    voice = voice.with_gender(gender);
                }
                voices.push(voice);
            }
        }
        voices
    }

    /// Words-per-minute for the request, scaling the configured base rate
    /// by the speed multiplier
    fn rate_for(&self, options: &SpeakOptions) -> u32 {
        let speed = options.speed.unwrap_or(1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rate = (self.config.rate_wpm as f32 * speed).round() as u32;
        rate.clamp(80, 450)
    }

    async fn synthesize(
        &self,
        text: &str,
        options: &SpeakOptions,
    ) -> Result<AudioData, SpeechError> {
        let command = self
            .engine_command()
            .await
            .map_err(|reason| SpeechError::Synthesis {
                backend: BackendId::System,
                reason,
            })?;

        let mut cmd = Command::new(&command);
        cmd.arg("--stdout");

        let voice = options
            .voice
            .as_ref()
            .or(self.config.default_voice.as_ref());
        if let Some(voice) = voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("-s").arg(self.rate_for(options).to_string());

        cmd.arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(engine = %command, "running speech engine");

        let output = cmd.output().await.map_err(|e| SpeechError::Synthesis {
            backend: BackendId::System,
            reason: format!("failed to run '{command}': {e}"),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SpeechError::Synthesis {
                backend: BackendId::System,
                reason: format!("'{command}' exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(AudioData::new(output.stdout, AudioFormat::Wav))
    }
}

#[async_trait]
impl SpeechBackend for EspeakBackend {
    fn id(&self) -> BackendId {
        BackendId::System
    }

    async fn is_configured(&self) -> bool {
        true
    }

    async fn list_voices(&self) -> Result<Vec<VoiceInfo>, SpeechError> {
        if let Some(cached) = self.voices.lock().clone() {
            return Ok(cached);
        }

        let command = self
            .engine_command()
            .await
            .map_err(|reason| SpeechError::VoiceList {
                backend: BackendId::System,
                reason,
            })?;

        let output = Command::new(&command)
            .arg("--voices")
            .output()
            .await
            .map_err(|e| SpeechError::VoiceList {
                backend: BackendId::System,
                reason: format!("failed to run '{command}': {e}"),
            })?;

        if !output.status.success() {
            return Err(SpeechError::VoiceList {
                backend: BackendId::System,
                reason: format!("'{command}' exited with {}", output.status),
            });
        }

        let voices = Self::parse_voice_table(&String::from_utf8_lossy(&output.stdout));
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
                    backend: BackendId::System,
                    reason: e.to_string(),
                }),
            Ok(_) => {
                debug!("stopped during synthesis; skipping playback");
                Ok(())
            }
            Err(e) => Err(e),
        };

        options.callbacks.notify_stop();
        result.map(|()| SpeakOutcome::unmetered())
    }

    async fn stop(&self) {
        self.stop_epoch.fetch_add(1, Ordering::SeqCst);
        self.sink.stop().await;
    }

    async fn validate(&self) -> Result<(), SpeechError> {
        self.engine_command()
            .await
            .map(|command| debug!(engine = %command, "speech engine present"))
            .map_err(|reason| SpeechError::Validation {
                backend: BackendId::System,
                reason,
            })
    }
}
