//! Domain layer - pure types and rules, no I/O.

pub mod assessment;
pub mod foundation;
pub mod plan;
pub mod profile;
pub mod session;
pub mod turn;
pub mod vault;
