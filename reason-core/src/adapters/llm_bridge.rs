//! Bridges the provider-rich `llm::LLMClient` trait to the narrow
//! `generate`/`generate_batch` contract every strategy executor and the
//! fast-path orchestrator actually depends on.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::llm::{ChatMessage, CompletionRequest, LLMClient};
use crate::strategy::executors::{GenerateOptions, LlmPort};

/// Adapts any [`LLMClient`] (Anthropic, OpenAI, ...) to [`LlmPort`].
///
/// Strategy executors only need text in, text out; everything else about
/// the provider (routing, batching, cost tracking) stays behind the client.
pub struct LlmClientBridge {
    client: Arc<dyn LLMClient>,
}

impl LlmClientBridge {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LlmPort for LlmClientBridge {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        let mut request = CompletionRequest::new().with_message(ChatMessage::user(prompt));
        if let Some(model) = &options.model {
            request = request.with_model(model.clone());
        }
        request.temperature = options.temperature;
        request.max_tokens = options.max_tokens;

        let response = self.client.complete(request).await?;
        Ok(response.content)
    }

    async fn generate_batch(&self, prompts: &[String], options: &GenerateOptions) -> Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            outputs.push(self.generate(prompt, options).await?);
        }
        Ok(outputs)
    }
}
