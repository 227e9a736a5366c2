//! Mock AI Provider for testing.
//!
//! Responses are scripted per [`CompletionPurpose`] so a test can say
//! "the assessment returns this, the fitness plan returns that" without
//! caring about call order across stages.
//!
//! # Features
//!
//! - Scripted responses per purpose, consumed in order
//! - Sticky fallbacks once a purpose's script is exhausted
//! - Error injection for resilience testing
//! - Simulated delays for timeout testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_response(CompletionPurpose::Assessment, r#"{"primary_goal": "sleep"}"#)
//!     .with_error(CompletionPurpose::NeedsEvaluation, MockError::Unavailable {
//!         message: "down".into(),
//!     });
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionPurpose, CompletionRequest, CompletionResponse, FinishReason,
    TokenUsage,
};

/// Content returned when nothing was scripted for a purpose.
pub const DEFAULT_MOCK_CONTENT: &str = "Mock response";

/// Mock AI provider for testing.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    scripted: Arc<Mutex<HashMap<CompletionPurpose, VecDeque<MockResponse>>>>,
    fallbacks: Arc<Mutex<HashMap<CompletionPurpose, MockResponse>>>,
    model: String,
    delay: Duration,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success {
        content: String,
        usage: TokenUsage,
        finish_reason: FinishReason,
    },
    Error(MockError),
}

impl MockResponse {
    fn success(content: impl Into<String>) -> Self {
        MockResponse::Success {
            content: content.into(),
            usage: TokenUsage::new(10, 20),
            finish_reason: FinishReason::Stop,
        }
    }
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    ContentFiltered { reason: String },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    Timeout { timeout_secs: u32 },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::ContentFiltered { reason } => AIError::content_filtered(reason),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Network { message } => AIError::network(message),
            MockError::Timeout { timeout_secs } => AIError::Timeout { timeout_secs },
        }
    }
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Locks a mutex, recovering the data if a panicking test poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockAIProvider {
    pub fn new() -> Self {
        Self {
            scripted: Arc::new(Mutex::new(HashMap::new())),
            fallbacks: Arc::new(Mutex::new(HashMap::new())),
            model: "mock-model-1".to_string(),
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queues a successful response for `purpose`.
    pub fn with_response(self, purpose: CompletionPurpose, content: impl Into<String>) -> Self {
        self.push(purpose, MockResponse::success(content));
        self
    }

    /// Queues an error for `purpose`.
    pub fn with_error(self, purpose: CompletionPurpose, error: MockError) -> Self {
        self.push(purpose, MockResponse::Error(error));
        self
    }

    /// Response returned for `purpose` every time its queue is empty.
    pub fn with_fallback(self, purpose: CompletionPurpose, content: impl Into<String>) -> Self {
        lock(&self.fallbacks).insert(purpose, MockResponse::success(content));
        self
    }

    /// Error returned for `purpose` every time its queue is empty.
    pub fn with_fallback_error(self, purpose: CompletionPurpose, error: MockError) -> Self {
        lock(&self.fallbacks).insert(purpose, MockResponse::Error(error));
        self
    }

    /// Queues a response on an already shared provider.
    pub fn push_response(&self, purpose: CompletionPurpose, content: impl Into<String>) {
        self.push(purpose, MockResponse::success(content));
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of calls made for `purpose`.
    pub fn calls_for(&self, purpose: CompletionPurpose) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.purpose() == purpose)
            .count()
    }

    pub fn get_calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn push(&self, purpose: CompletionPurpose, response: MockResponse) {
        lock(&self.scripted)
            .entry(purpose)
            .or_default()
            .push_back(response);
    }

    fn next_response(&self, purpose: CompletionPurpose) -> MockResponse {
        if let Some(next) = lock(&self.scripted)
            .get_mut(&purpose)
            .and_then(VecDeque::pop_front)
        {
            return next;
        }
        lock(&self.fallbacks)
            .get(&purpose)
            .cloned()
            .unwrap_or_else(|| MockResponse::success(DEFAULT_MOCK_CONTENT))
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        let purpose = request.purpose();
        lock(&self.calls).push(request);

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.next_response(purpose) {
            MockResponse::Success {
                content,
                usage,
                finish_reason,
            } => Ok(CompletionResponse {
                content,
                usage,
                model: self.model.clone(),
                finish_reason,
            }),
            MockResponse::Error(err) => Err(err.into()),
        }
    }
}
