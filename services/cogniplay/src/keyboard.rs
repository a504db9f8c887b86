use anyhow::{Context, Result};
use async_trait::async_trait;
use cogniplay_core::voice::{ChannelConfig, ChannelEvent, VoiceChannel};
use tokio::sync::mpsc;

/// A voice channel with no voice: it opens immediately and ignores audio,
/// so the game is played with typed or tapped answers only.
pub struct KeyboardChannel {
    event_tx: Option<mpsc::Sender<ChannelEvent>>,
    event_rx: Option<mpsc::Receiver<ChannelEvent>>,
}

impl Default for KeyboardChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardChannel {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(4);
        Self {
            event_tx: Some(tx),
            event_rx: Some(rx),
        }
    }
}

#[async_trait]
impl VoiceChannel for KeyboardChannel {
    async fn open(&mut self, _config: ChannelConfig) -> Result<()> {
        let tx = self
            .event_tx
            .as_ref()
            .context("Keyboard channel has been closed")?;
        tx.send(ChannelEvent::Opened)
            .await
            .context("Keyboard channel events are no longer read")
    }

    async fn send_audio(&mut self, _pcm: Vec<i16>) -> Result<()> {
        Ok(())
    }

    async fn events(&mut self) -> Result<mpsc::Receiver<ChannelEvent>> {
        self.event_rx
            .take()
            .context("Keyboard channel events have already been taken")
    }

    fn close(&mut self) {
        self.event_tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_opens_immediately_and_ends_on_close() {
        let mut channel = KeyboardChannel::new();
        let mut events = channel.events().await.unwrap();

        channel.open(ChannelConfig::default()).await.unwrap();
        assert_eq!(events.recv().await, Some(ChannelEvent::Opened));

        channel.send_audio(vec![1, 2, 3]).await.unwrap();
        channel.close();
        assert_eq!(events.recv().await, None);
        assert!(channel.open(ChannelConfig::default()).await.is_err());
    }
}
