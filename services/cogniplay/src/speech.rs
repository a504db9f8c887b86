use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use cogniplay_core::speech::SpeechOutput;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Notify;

/// Speaks through a system text-to-speech program such as `say` or
/// `espeak-ng`, one process per line.
pub struct CommandSpeech {
    program: String,
    voice: Option<String>,
    cancel: Notify,
}

impl CommandSpeech {
    pub fn new(program: &str, voice: Option<String>) -> Self {
        Self {
            program: program.to_string(),
            voice,
            cancel: Notify::new(),
        }
    }

    fn command(&self, text: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        // Both `say` and `espeak-ng` take the voice through `-v`.
        if let Some(voice) = &self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechOutput for CommandSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        let mut child = self
            .command(text)
            .spawn()
            .with_context(|| format!("Failed to start speech program '{}'", self.program))?;

        tokio::select! {
            status = child.wait() => {
                let status = status.context("Speech program did not run to completion")?;
                if !status.success() {
                    bail!("Speech program '{}' exited with {}", self.program, status);
                }
            }
            _ = self.cancel.notified() => {
                tracing::debug!("Speech cancelled, stopping '{}'", self.program);
                child.kill().await.ok();
            }
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}

/// Prints each line and waits roughly as long as it would take to say it.
pub struct ConsoleSpeech {
    per_word: Duration,
    cancel: Notify,
}

impl Default for ConsoleSpeech {
    fn default() -> Self {
        Self::new(Duration::from_millis(350))
    }
}

impl ConsoleSpeech {
    pub fn new(per_word: Duration) -> Self {
        Self {
            per_word,
            cancel: Notify::new(),
        }
    }

    fn speaking_time(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count().max(1) as u32;
        self.per_word * words
    }
}

#[async_trait]
impl SpeechOutput for ConsoleSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        println!("  🔊 {text}");
        tokio::select! {
            _ = tokio::time::sleep(self.speaking_time(text)) => {}
            _ = self.cancel.notified() => {}
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}
