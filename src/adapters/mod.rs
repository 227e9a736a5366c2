//! Adapters - Implementations of port interfaces.
//!
//! - `ai` - reasoning backend clients (Anthropic, mock)
//! - `embedding` - local feature-hashing embedder
//! - `memory` - in-process stores for `memory://` and tests
//! - `postgres` - PostgreSQL stores

pub mod ai;
pub mod embedding;
pub mod memory;
pub mod postgres;

pub use ai::{AnthropicConfig, AnthropicProvider, MockAIProvider, MockError};
pub use embedding::HashingEmbedder;
pub use memory::{InMemoryMemoryStore, InMemorySessionRepository};
pub use postgres::{PostgresMemoryStore, PostgresSessionRepository};
