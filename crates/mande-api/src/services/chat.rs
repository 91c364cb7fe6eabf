//! Chat: context assembly followed by a cancellable generation call.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use mande_core::{
    CancellationSignal, ChatTurn, Error, GenerationBackend, GenerationRequest, Result,
    SamplingOptions,
};

use crate::services::context::{ContextAssembler, ContextSource};

/// Generated answer plus the context it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub sources: Vec<ContextSource>,
}

#[derive(Clone)]
pub struct ChatService {
    assembler: ContextAssembler,
    generator: Arc<dyn GenerationBackend>,
    options: SamplingOptions,
}

impl ChatService {
    pub fn new(assembler: ContextAssembler, generator: Arc<dyn GenerationBackend>) -> Self {
        Self {
            assembler,
            generator,
            options: SamplingOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SamplingOptions) -> Self {
        self.options = options;
        self
    }

    /// Answer `message` for `owner_id`.
    ///
    /// Returns `Cancelled` if `cancel` fires before generation finishes.
    #[instrument(skip(self, message, history, cancel), fields(subsystem = "api", component = "chat", op = "respond", owner_id = %owner_id, prompt_len = tracing::field::Empty))]
    pub async fn respond(
        &self,
        owner_id: Uuid,
        message: &str,
        history: &[ChatTurn],
        cancel: &CancellationSignal,
    ) -> Result<ChatReply> {
        if message.trim().is_empty() {
            return Err(Error::InvalidInput("Message is empty".to_string()));
        }
        let start = Instant::now();

        let context = self
            .assembler
            .build_context(message, owner_id, history)
            .await?;
        tracing::Span::current().record("prompt_len", context.prompt.len());

        let request = GenerationRequest::new(context.prompt).with_options(self.options);
        let response = self.generator.generate(&request, cancel).await?;

        info!(
            model = self.generator.model_name(),
            sources = context.sources.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Chat response generated"
        );
        Ok(ChatReply {
            response,
            sources: context.sources,
        })
    }
}
