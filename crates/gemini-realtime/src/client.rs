use crate::types::{Blob, ClientMessage, RealtimeInput, ServerMessage, Setup};
use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

type WsWriter =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsReader = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const DEFAULT_BASE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
pub const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-09-2025";

#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}?key={}", self.base_url, self.api_key.expose_secret())
    }
}

pub struct ConfigBuilder {
    base_url: Option<String>,
    api_key: Option<SecretString>,
    model: Option<String>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: None,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Accepts both `gemini-...` and `models/gemini-...`.
    pub fn with_model(mut self, model: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        self.model = Some(model);
        self
    }

    pub fn build(self) -> Result<Config> {
        let api_key = self
            .api_key
            .context("An API key is required to connect to the live service")?;
        Ok(Config {
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// A connected, not yet split, live session socket.
pub struct GeminiClient {
    write: WsWriter,
    read: WsReader,
}

/// Establishes a connection to the Gemini live service.
pub async fn connect(config: &Config) -> Result<GeminiClient> {
    let (ws_stream, _) = connect_async(config.url())
        .await
        .context("Failed to connect to Gemini WebSocket")?;

    tracing::info!("Successfully connected to Gemini WebSocket.");
    let (write, read) = ws_stream.split();
    Ok(GeminiClient { write, read })
}

impl GeminiClient {
    /// Separates the sending and receiving halves so they can live on
    /// different tasks.
    pub fn split(self) -> (GeminiSender, GeminiReceiver) {
        (
            GeminiSender { write: self.write },
            GeminiReceiver { read: self.read },
        )
    }
}

pub struct GeminiSender {
    write: WsWriter,
}

impl GeminiSender {
    /// Sends the session setup. Must be the first message on the socket.
    pub async fn send_setup(&mut self, setup: Setup) -> Result<()> {
        self.send(&ClientMessage::Setup(setup))
            .await
            .context("Failed to send setup message")
    }

    /// Sends one chunk of base64 encoded PCM audio.
    pub async fn send_audio_chunk(&mut self, chunk: Blob) -> Result<()> {
        let msg = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![chunk],
        });
        self.send(&msg).await.context("Failed to send audio chunk")
    }

    pub async fn close(&mut self) -> Result<()> {
        self.write
            .close()
            .await
            .context("Failed to close Gemini WebSocket")
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.write.send(Message::Text(json)).await?;
        Ok(())
    }
}

pub struct GeminiReceiver {
    read: WsReader,
}

impl GeminiReceiver {
    /// Reads the next message from the server. `Ok(None)` means the socket
    /// closed.
    pub async fn next_message(&mut self) -> Result<Option<ServerMessage>> {
        while let Some(msg) = self.read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    let message: ServerMessage = serde_json::from_str(&text)
                        .context("Failed to deserialize server message")?;
                    return Ok(Some(message));
                }
                // The service sends JSON in binary frames as well.
                Ok(Message::Binary(bytes)) => {
                    let message: ServerMessage = serde_json::from_slice(&bytes)
                        .context("Failed to deserialize binary server message")?;
                    return Ok(Some(message));
                }
                Ok(Message::Close(frame)) => {
                    tracing::info!("Gemini WebSocket connection closed: {:?}", frame);
                    return Ok(None);
                }
                Err(e) => {
                    tracing::error!("Error reading from Gemini WebSocket: {}", e);
                    return Err(e.into());
                }
                _ => { /* Ignore Ping/Pong */ }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_api_key() {
        assert!(Config::builder().build().is_err());
    }

    #[test]
    fn test_builder_normalizes_model_and_url() {
        let config = Config::builder()
            .with_api_key(SecretString::from("k123"))
            .with_model("gemini-live-test")
            .build()
            .unwrap();
        assert_eq!(config.model(), "models/gemini-live-test");
        assert!(config.url().starts_with("wss://generativelanguage.googleapis.com/"));
        assert!(config.url().ends_with("?key=k123"));

        let config = Config::builder()
            .with_api_key(SecretString::from("k"))
            .with_base_url("ws://localhost:9000/live")
            .build()
            .unwrap();
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.url(), "ws://localhost:9000/live?key=k");
    }
}
