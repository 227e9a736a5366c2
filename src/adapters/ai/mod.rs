//! AI Provider Adapters.
//!
//! - `AnthropicProvider` - Anthropic Claude models over the Messages API
//! - `MockAIProvider` - Scripted double for tests

mod anthropic_provider;
mod mock_provider;

pub use anthropic_provider::{AnthropicConfig, AnthropicProvider, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use mock_provider::{MockAIProvider, MockError, MockResponse, DEFAULT_MOCK_CONTENT};
