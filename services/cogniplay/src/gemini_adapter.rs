use anyhow::{Context, Result};
use async_trait::async_trait;
use cogniplay_core::voice::{ChannelConfig, ChannelEvent, VoiceChannel};
use cogniplay_native_utils::audio;
use gemini_realtime::types::{
    AudioTranscriptionConfig, Blob, Content, GenerationConfig, Modality, ServerMessage, Setup,
};
use gemini_realtime::{GeminiReceiver, GeminiSender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const EVENT_BUFFER: usize = 128;

/// A `VoiceChannel` backed by a Gemini live session.
///
/// The socket is only dialled in `open`; a channel that was never opened
/// holds no network resources.
pub struct GeminiChannel {
    config: gemini_realtime::Config,
    sender: Option<GeminiSender>,
    input_mime_type: String,
    event_tx: mpsc::Sender<ChannelEvent>,
    event_rx: Option<mpsc::Receiver<ChannelEvent>>,
    reader: Option<JoinHandle<()>>,
}

impl GeminiChannel {
    pub fn new(config: gemini_realtime::Config) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        Self {
            config,
            sender: None,
            input_mime_type: audio::pcm_mime_type(audio::LIVE_INPUT_SAMPLE_RATE),
            event_tx,
            event_rx: Some(event_rx),
            reader: None,
        }
    }
}

#[async_trait]
impl VoiceChannel for GeminiChannel {
    async fn open(&mut self, config: ChannelConfig) -> Result<()> {
        let client = gemini_realtime::connect(&self.config)
            .await
            .context("Failed to open Gemini live session")?;
        let (mut sender, receiver) = client.split();

        let instructions = config.instructions.trim();
        let setup = Setup {
            model: self.config.model().to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Audio],
            },
            system_instruction: (!instructions.is_empty()).then(|| Content::text(instructions)),
            input_audio_transcription: Some(AudioTranscriptionConfig::default()),
        };
        tracing::debug!("Sending setup for model {}", setup.model);
        sender.send_setup(setup).await?;

        self.input_mime_type = audio::pcm_mime_type(config.input_sample_rate);
        self.sender = Some(sender);
        self.reader = Some(tokio::spawn(forward_events(
            receiver,
            self.event_tx.clone(),
        )));
        Ok(())
    }

    async fn send_audio(&mut self, pcm: Vec<i16>) -> Result<()> {
        let sender = self
            .sender
            .as_mut()
            .context("Gemini channel is not open")?;
        let chunk = Blob {
            mime_type: self.input_mime_type.clone(),
            data: audio::encode_i16(&pcm),
        };
        sender.send_audio_chunk(chunk).await
    }

    async fn events(&mut self) -> Result<mpsc::Receiver<ChannelEvent>> {
        self.event_rx
            .take()
            .context("Gemini channel events have already been taken")
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut sender) = self.sender.take() {
            // Closing the socket needs the runtime; without one the halves are
            // simply dropped.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = sender.close().await {
                        tracing::debug!("Gemini socket close: {:#}", e);
                    }
                });
            }
            tracing::info!("Gemini channel closed.");
        }
    }
}

impl Drop for GeminiChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn forward_events(mut receiver: GeminiReceiver, tx: mpsc::Sender<ChannelEvent>) {
    loop {
        let events = match receiver.next_message().await {
            Ok(Some(message)) => translate(message),
            Ok(None) => vec![ChannelEvent::Closed],
            Err(e) => vec![ChannelEvent::Error(format!("{e:#}"))],
        };
        let last = matches!(
            events.last(),
            Some(ChannelEvent::Closed | ChannelEvent::Error(_))
        );
        for event in events {
            if tx.send(event).await.is_err() {
                tracing::debug!("Channel event receiver dropped, stopping reader.");
                return;
            }
        }
        if last {
            return;
        }
    }
}

/// Maps one server message onto the events the session understands.
pub fn translate(message: ServerMessage) -> Vec<ChannelEvent> {
    let mut events = Vec::new();

    if message.setup_complete.is_some() {
        events.push(ChannelEvent::Opened);
    }

    if let Some(content) = message.server_content {
        if let Some(transcription) = content.input_transcription {
            if !transcription.text.is_empty() {
                events.push(ChannelEvent::Transcription(transcription.text));
            }
        }
        if let Some(turn) = content.model_turn {
            if turn.parts.iter().any(|p| p.inline_data.is_some()) {
                events.push(ChannelEvent::Speaking);
            }
        }
        if content.interrupted {
            events.push(ChannelEvent::SpeakingDone);
        }
        if content.turn_complete {
            events.push(ChannelEvent::TurnComplete);
        }
    }

    if let Some(go_away) = message.go_away {
        tracing::warn!(
            "Gemini service is closing the session soon (time left: {:?})",
            go_away.time_left
        );
    }

    events
}
