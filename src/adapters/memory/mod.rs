//! In-process adapters for the storage ports.

mod memory_store;
mod session_repository;

pub use memory_store::InMemoryMemoryStore;
pub use session_repository::InMemorySessionRepository;
