//! Embedding adapters.

mod hashing;

pub use hashing::{HashingEmbedder, DEFAULT_DIMENSIONS};
