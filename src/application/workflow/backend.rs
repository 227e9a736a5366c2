//! Structured calls to the reasoning backend.

use std::sync::Arc;

use super::errors::StageError;
use super::prompts::Prompt;
use super::retry::RetryPolicy;
use crate::domain::assessment::{ExtractionError, ResponseSanitizer};
use crate::domain::turn::Stage;
use crate::ports::{AIProvider, CompletionRequest, MessageRole, RequestMetadata};

const MAX_TOKENS: u32 = 1_024;
const TEMPERATURE: f32 = 0.3;

/// Sends a prompt and parses the answer against a typed contract, retrying
/// transient and malformed responses under one [`RetryPolicy`].
#[derive(Clone)]
pub struct BackendClient {
    ai: Arc<dyn AIProvider>,
    retry: RetryPolicy,
    sanitizer: ResponseSanitizer,
}

impl BackendClient {
    pub fn new(ai: Arc<dyn AIProvider>, retry: RetryPolicy) -> Self {
        Self {
            ai,
            retry,
            sanitizer: ResponseSanitizer::new(),
        }
    }

    pub async fn structured<T, P>(
        &self,
        stage: Stage,
        prompt: Prompt,
        metadata: RequestMetadata,
        parse: P,
    ) -> Result<T, StageError>
    where
        T: Send,
        P: Fn(&ResponseSanitizer, &str) -> Result<T, ExtractionError> + Sync,
    {
        let purpose = metadata.purpose;
        let request = CompletionRequest::new(metadata)
            .with_system_prompt(prompt.system)
            .with_message(MessageRole::User, prompt.user)
            .with_max_tokens(MAX_TOKENS)
            .with_temperature(TEMPERATURE);

        self.retry
            .run(stage, |attempt| {
                let request = request.clone();
                let parse = &parse;
                async move {
                    let response = self.ai.complete(request).await?;
                    tracing::debug!(
                        purpose = %purpose,
                        attempt,
                        tokens = response.usage.total_tokens,
                        "backend responded"
                    );
                    parse(&self.sanitizer, &response.content).map_err(|e| {
                        tracing::warn!(purpose = %purpose, attempt, error = %e, "malformed backend output");
                        StageError::from(e)
                    })
                }
            })
            .await
    }
}
