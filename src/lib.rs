//! Growth Coach - stateful workflow engine for a conversational coaching agent
//!
//! Each user message runs through a fixed pipeline (assessment, profile
//! resolution, needs evaluation, plan synthesis, memory update) with
//! encrypted per-user memory behind it. Weekly updates skip assessment and
//! add a progress review.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
