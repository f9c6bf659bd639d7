//! Completion response and stream chunk shapes (OpenAI-compatible).

use serde::Deserialize;

/// A complete, non-streamed chat completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Text of the first choice's message, or empty when there is none.
    pub fn assistant_text(&self) -> String {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .map(MessageContent::to_text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: AssistantMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content: plain text or a list of typed parts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flatten to display text. Parts are joined by newlines; parts that
    /// render to nothing are skipped.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(ContentPart::to_text)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        #[serde(default)]
        text: String,
    },
    ImageUrl {
        #[serde(default)]
        image_url: serde_json::Value,
    },
    InputAudio {
        #[serde(default)]
        input_audio: serde_json::Value,
    },
    #[serde(other)]
    Unknown,
}

impl ContentPart {
    pub fn to_text(&self) -> &str {
        match self {
            ContentPart::Text { text } => text,
            ContentPart::ImageUrl { .. } => "[image]",
            ContentPart::InputAudio { .. } => "[audio]",
            ContentPart::Unknown => "",
        }
    }
}

/// One streamed completion chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ChunkError>,
}

impl ChatChunk {
    /// A chunk carrying `content` as the first choice's delta.
    pub fn from_delta(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: Delta {
                    content: Some(content.into()),
                },
                finish_reason: None,
            }],
            error: None,
        }
    }

    /// The first choice's content delta, or empty when absent.
    pub fn delta(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkError {
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}
