//! Chat completion transport.
//!
//! A [`ChatTransport`] sends a message list and hands back either a complete
//! response or a stream of incremental chunks; the caller branches on
//! [`ChatSendResult`] instead of inspecting the payload shape.

mod error;
mod openrouter;
mod response;
mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;

pub use error::ChatError;
pub use openrouter::OpenRouterTransport;
pub use response::{
    AssistantMessage, ChatChunk, ChatResponse, Choice, ChunkChoice, ChunkError, ContentPart,
    Delta, MessageContent,
};
pub use sse::SseDecoder;

/// Default model requested from OpenRouter.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

/// Default completion length cap.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Message as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
}

/// Ordered chunks of a streamed reply, each consumed once.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, ChatError>> + Send>>;

/// What a send produced.
pub enum ChatSendResult {
    /// The whole reply at once.
    Complete(ChatResponse),
    /// The reply as incremental chunks.
    Streaming(ChunkStream),
}

impl std::fmt::Debug for ChatSendResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Complete(response) => f.debug_tuple("Complete").field(response).finish(),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Trait for chat completion backends.
///
/// # Example
///
/// ```ignore
/// use router_chat::llm::{ChatSendResult, ChatTransport};
/// use futures::StreamExt;
///
/// async fn print_reply(transport: &dyn ChatTransport, request: ChatRequest) {
///     match transport.send(request).await.unwrap() {
///         ChatSendResult::Complete(response) => println!("{}", response.assistant_text()),
///         ChatSendResult::Streaming(mut chunks) => {
///             while let Some(Ok(chunk)) = chunks.next().await {
///                 print!("{}", chunk.delta());
///             }
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a chat completion request.
    async fn send(&self, request: ChatRequest) -> Result<ChatSendResult, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: "Hello".to_string(),
            }],
            stream: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "openai/gpt-4o",
                "max_tokens": 1000,
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": true
            })
        );
    }

    #[test]
    fn test_request_omits_max_tokens() {
        let request = ChatRequest {
            model: "m".to_string(),
            max_tokens: None,
            messages: vec![],
            stream: true,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("max_tokens"));
    }
}
