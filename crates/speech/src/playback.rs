//! Audio playback adapters
//!
//! `ProcessPlayer` pipes audio bytes to a player command's stdin and waits
//! for it to exit; `stop` kills the player. `NullSink` discards audio, for
//! headless operation and tests.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::PlaybackError;
use crate::ports::AudioSink;
use crate::types::AudioData;

/// Plays audio by piping it to an external player process
pub struct ProcessPlayer {
    command: PathBuf,
    args: Vec<String>,
    current: tokio::sync::Mutex<Option<Child>>,
}

impl std::fmt::Debug for ProcessPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessPlayer")
            .field("command", &self.command)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl ProcessPlayer {
    /// Player using an explicit command and arguments.
    ///
    /// The command must read the audio from stdin and exit when playback
    /// completes.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            current: tokio::sync::Mutex::new(None),
        }
    }

    /// Player using `ffplay`, which handles every format the backends emit
    #[must_use]
    pub fn ffplay() -> Self {
        Self::new(
            "ffplay",
            ["-nodisp", "-autoexit", "-loglevel", "quiet", "-"]
                .into_iter()
                .map(String::from)
                .collect(),
        )
    }
}

impl Default for ProcessPlayer {
    fn default() -> Self {
        Self::ffplay()
    }
}

#[async_trait]
impl AudioSink for ProcessPlayer {
    async fn play(&self, audio: AudioData) -> Result<(), PlaybackError> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        debug!(command = %self.command.display(), bytes = audio.size_bytes(), "starting player");

        let mut child = cmd.spawn().map_err(|e| {
            PlaybackError(format!(
                "failed to start player '{}': {e}",
                self.command.display()
            ))
        })?;

        let stdin = child.stdin.take();
        {
            *self.current.lock().await = Some(child);
        }

        if let Some(mut stdin) = stdin {
            if let Err(e) = stdin.write_all(audio.data()).await {
                // A killed player closes the pipe; that is a stop, not a failure
                if self.current.lock().await.is_none() {
                    return Ok(());
                }
                let _ = self.current.lock().await.take();
                return Err(PlaybackError(format!("failed to write audio: {e}")));
            }
            // stdin drops here, signalling end of input
        }

        loop {
            {
                let mut guard = self.current.lock().await;
                let Some(child) = guard.as_mut() else {
                    // Stopped from outside while we were waiting
                    return Ok(());
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        guard.take();
                        if status.success() {
                            return Ok(());
                        }
                        return Err(PlaybackError(format!("player exited with {status}")));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        guard.take();
                        return Err(PlaybackError(format!("failed to wait for player: {e}")));
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    async fn stop(&self) {
        if let Some(mut child) = self.current.lock().await.take() {
            if let Err(e) = child.kill().await {
                warn!("failed to kill player process: {e}");
            }
        }
    }
}

/// Sink that discards all audio
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, _audio: AudioData) -> Result<(), PlaybackError> {
        Ok(())
    }

    async fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFormat;

    fn wav_bytes() -> AudioData {
        AudioData::new(vec![0x52, 0x49, 0x46, 0x46, 0, 0, 0, 0], AudioFormat::Wav)
    }

    #[tokio::test]
    async fn null_sink_accepts_audio() {
        let sink = NullSink;
        assert!(sink.play(wav_bytes()).await.is_ok());
        sink.stop().await;
    }

    #[tokio::test]
    async fn process_player_succeeds_when_command_consumes_input() {
        let player = ProcessPlayer::new("sh", vec!["-c".into(), "cat > /dev/null".into()]);
        assert!(player.play(wav_bytes()).await.is_ok());
    }

    #[tokio::test]
    async fn process_player_reports_nonzero_exit() {
        let player = ProcessPlayer::new(
            "sh",
            vec!["-c".into(), "cat > /dev/null; exit 3".into()],
        );
        let result = player.play(wav_bytes()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn process_player_reports_missing_command() {
        let player = ProcessPlayer::new("definitely-not-a-player", Vec::new());
        assert!(player.play(wav_bytes()).await.is_err());
    }

    #[tokio::test]
    async fn stop_interrupts_playback() {
        let player = std::sync::Arc::new(ProcessPlayer::new(
            "sh",
            vec!["-c".into(), "cat > /dev/null; sleep 5".into()],
        ));

        let playing = std::sync::Arc::clone(&player);
        let handle = tokio::spawn(async move { playing.play(wav_bytes()).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        player.stop().await;

        let result = handle.await.unwrap();
        assert!(result.is_ok(), "a stopped playback is not a failure");
    }

    #[tokio::test]
    async fn stop_without_playback_is_a_noop() {
        let player = ProcessPlayer::ffplay();
        player.stop().await;
        player.stop().await;
    }
}
