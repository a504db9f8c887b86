use serde::{Deserialize, Serialize};

// Outgoing messages

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Present (even when empty) to ask the service to transcribe input audio.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<AudioTranscriptionConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Audio,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AudioTranscriptionConfig {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.into()),
                inline_data: None,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<Blob>,
}

/// Base64 payload tagged with its MIME type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

// Incoming messages

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub input_transcription: Option<Transcription>,
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub turn_complete: bool,
    #[serde(default)]
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_wire_shape() {
        let msg = ClientMessage::Setup(Setup {
            model: "models/live".to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Audio],
            },
            system_instruction: Some(Content::text("Be brief.")),
            input_audio_transcription: Some(AudioTranscriptionConfig::default()),
        });
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["setup"]["model"], "models/live");
        assert_eq!(json["setup"]["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(json["setup"]["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert!(json["setup"]["inputAudioTranscription"].is_object());
    }

    #[test]
    fn test_realtime_input_wire_shape() {
        let msg = ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![Blob {
                mime_type: "audio/pcm;rate=16000".to_string(),
                data: "AAA=".to_string(),
            }],
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(
            json,
            r#"{"realtimeInput":{"mediaChunks":[{"mimeType":"audio/pcm;rate=16000","data":"AAA="}]}}"#
        );
    }

    #[test]
    fn test_parse_server_content() {
        let raw = r#"{"serverContent":{"inputTranscription":{"text":" a dog"}}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = msg.server_content.unwrap();
        assert_eq!(content.input_transcription.unwrap().text, " a dog");
        assert!(!content.turn_complete);

        let raw = r#"{"serverContent":{"turnComplete":true}}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.server_content.unwrap().turn_complete);

        let msg: ServerMessage = serde_json::from_str(r#"{"setupComplete":{}}"#).unwrap();
        assert!(msg.setup_complete.is_some());
    }
}
