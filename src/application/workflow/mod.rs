//! Workflow Engine - the per-turn stage pipeline.
//!
//! - `engine` - stage sequencing, failure recording, memory update
//! - `backend` - typed calls to the reasoning backend
//! - `retry` - bounded retries with backoff and per-call timeouts
//! - `prompts` - stage prompt construction
//! - `response` - user-facing response rendering

pub(crate) mod backend;
mod engine;
mod errors;
pub(crate) mod prompts;
pub mod response;
mod retry;

pub use backend::BackendClient;
pub use engine::{TurnReport, WorkflowEngine};
pub use errors::{StageError, WorkflowError};
pub use response::APOLOGY;
pub use retry::RetryPolicy;
