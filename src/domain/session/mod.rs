//! Session module - lifecycle of a user's coaching session.

mod aggregate;
mod errors;

pub use aggregate::Session;
pub use errors::SessionError;
