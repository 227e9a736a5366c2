//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `AIProvider` - the reasoning backend (opaque text completion)
//! - `Embedder` - profile text to embedding vector
//! - `MemoryStore` - sealed profiles, turns and plans, plus nearest-profile lookup
//! - `SessionRepository` - session records with integrity tags

mod ai_provider;
mod embedder;
mod memory_store;
mod session_repository;
mod store_error;

pub use ai_provider::{
    AIError, AIProvider, CompletionPurpose, CompletionRequest, CompletionResponse, FinishReason,
    Message, MessageRole, RequestMetadata, TokenUsage,
};
pub use embedder::{cosine_similarity, Embedder, Embedding, EmbeddingError};
pub use memory_store::{MemoryStore, ProfileMatch, StoredPlan, StoredProfile, StoredTurn};
pub use session_repository::{SessionRecord, SessionRepository};
pub use store_error::StoreError;
