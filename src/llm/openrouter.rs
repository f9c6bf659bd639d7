//! OpenRouter chat completions (OpenAI-compatible API).

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;

use super::{
    ChatChunk, ChatError, ChatRequest, ChatResponse, ChatSendResult, ChatTransport, ChunkStream,
    SseDecoder,
};
use crate::auth::DEFAULT_API_BASE_URL;

/// Chat transport talking to `POST {api_base}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenRouterTransport {
    client: Client,
    api_base: String,
    api_key: String,
}

impl OpenRouterTransport {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn api_base(&self) -> &str {
        if self.api_base.is_empty() {
            DEFAULT_API_BASE_URL
        } else {
            &self.api_base
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base().trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatTransport for OpenRouterTransport {
    async fn send(&self, request: ChatRequest) -> Result<ChatSendResult, ChatError> {
        if !self.is_configured() {
            return Err(ChatError::NotConfigured);
        }

        let url = self.completions_url();
        tracing::debug!(
            %url,
            model = %request.model,
            messages = request.messages.len(),
            "sending chat request"
        );

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", "https://github.com/router-chat/router-chat")
            .header("X-Title", "router-chat")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if is_event_stream {
            return Ok(ChatSendResult::Streaming(chunk_stream(response.bytes_stream())));
        }

        let body = response.text().await?;
        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ChatError::Decode(e.to_string()))?;

        if value.get("choices").is_some_and(|c| c.is_array()) {
            let complete: ChatResponse =
                serde_json::from_value(value).map_err(|e| ChatError::Decode(e.to_string()))?;
            return Ok(ChatSendResult::Complete(complete));
        }

        match serde_json::from_value::<ErrorResponse>(value) {
            Ok(err) => Err(ChatError::Api {
                status: status.as_u16(),
                message: err.error.message,
            }),
            Err(_) => Err(ChatError::Decode(
                "response has neither choices nor an event stream".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

struct StreamState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    finished: bool,
}

/// Turn an SSE byte stream into a stream of completion chunks.
///
/// Ends at `data: [DONE]` or when the body ends. Unparseable payloads are
/// logged and skipped; an in-band error object ends the stream with an error.
fn chunk_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<ChatError> + Send + 'static,
{
    let state = StreamState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            let data = match state.decoder.next_data() {
                Some(data) => data,
                None if state.finished => return None,
                None => match state.bytes.next().await {
                    Some(Ok(bytes)) => {
                        state.decoder.push(bytes.as_ref());
                        continue;
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        state.decoder = SseDecoder::new();
                        return Some((Err(e.into()), state));
                    }
                    None => {
                        state.finished = true;
                        match state.decoder.finish() {
                            Some(data) => data,
                            None => return None,
                        }
                    }
                },
            };

            if data == "[DONE]" {
                return None;
            }

            match serde_json::from_str::<ChatChunk>(&data) {
                Ok(chunk) => {
                    if let Some(error) = chunk.error {
                        state.finished = true;
                        state.decoder = SseDecoder::new();
                        return Some((Err(ChatError::Stream(error.message)), state));
                    }
                    return Some((Ok(chunk), state));
                }
                Err(e) => {
                    tracing::warn!("skipping unparseable stream payload: {e}");
                }
            }
        }
    }))
}
