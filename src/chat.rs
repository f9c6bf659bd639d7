//! Chat session state and streamed reply assembly.
//!
//! Sending appends the user message and an empty assistant message, then
//! fills that assistant message from the transport: once for a complete
//! reply, or after every chunk for a streamed one.

use futures::StreamExt;

use crate::llm::{ChatError, ChatRequest, ChatSendResult, ChatTransport};
use crate::message::{Message, Role};

/// Greeting the assistant opens every session with.
pub const DEFAULT_GREETING: &str = "Hello! I'm your AI assistant powered by OpenRouter. \
I can help you with a wide variety of tasks. What would you like to know or discuss today?";

/// An ordered, append-only conversation plus the loading flag.
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<Message>,
    loading: bool,
    model: String,
    max_tokens: Option<u32>,
}

impl ChatSession {
    pub fn new(model: impl Into<String>, max_tokens: Option<u32>) -> Self {
        Self {
            messages: Vec::new(),
            loading: false,
            model: model.into(),
            max_tokens,
        }
    }

    /// Start the conversation with an assistant greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        let greeting = greeting.into();
        if !greeting.is_empty() {
            self.messages.push(Message::assistant(greeting));
        }
        self
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Whether `message` is the reply currently being assembled.
    pub fn is_incoming(&self, message: &Message) -> bool {
        self.loading
            && message.role == Role::Assistant
            && self.messages.last().is_some_and(|last| last.id == message.id)
    }

    /// Send `input` and assemble the reply into the last message.
    ///
    /// `on_update` sees the in-flight assistant message together with the
    /// loading flag: once while it is still empty, then after every change
    /// to its content, in order. Blank input, or input while a reply is
    /// still loading, is ignored and returns `Ok(false)`.
    pub async fn send<T, F>(
        &mut self,
        transport: &T,
        input: &str,
        mut on_update: F,
    ) -> Result<bool, ChatError>
    where
        T: ChatTransport + ?Sized,
        F: FnMut(&Message, bool),
    {
        if input.trim().is_empty() || self.loading {
            return Ok(false);
        }

        self.loading = true;
        self.messages.push(Message::user(input));

        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: self.messages.iter().map(Message::to_wire).collect(),
            stream: true,
        };

        self.messages.push(Message::assistant(String::new()));
        if let Some(message) = self.messages.last() {
            on_update(message, self.loading);
        }

        let result = self.assemble(transport, request, &mut on_update).await;
        self.loading = false;

        if let Err(err) = &result {
            tracing::warn!("chat request failed: {err}");
            if self.messages.last().is_some_and(|m| m.content.is_empty()) {
                self.messages.pop();
            }
        }

        result.map(|()| true)
    }

    async fn assemble<T, F>(
        &mut self,
        transport: &T,
        request: ChatRequest,
        on_update: &mut F,
    ) -> Result<(), ChatError>
    where
        T: ChatTransport + ?Sized,
        F: FnMut(&Message, bool),
    {
        let loading = self.loading;
        match transport.send(request).await? {
            ChatSendResult::Complete(response) => {
                let text = response.assistant_text();
                if let Some(message) = self.in_flight() {
                    message.content = text;
                    on_update(message, loading);
                }
            }
            ChatSendResult::Streaming(mut chunks) => {
                let mut buffer = String::new();
                while let Some(chunk) = chunks.next().await {
                    buffer.push_str(chunk?.delta());
                    if let Some(message) = self.in_flight() {
                        message.content.clone_from(&buffer);
                        on_update(message, loading);
                    }
                }
            }
        }
        Ok(())
    }

    /// The message being streamed into: the last one, if it is an assistant's.
    fn in_flight(&mut self) -> Option<&mut Message> {
        self.messages
            .last_mut()
            .filter(|message| message.role == Role::Assistant)
    }
}
