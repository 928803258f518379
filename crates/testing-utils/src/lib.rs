//! # Conveyor Testing Utils
//!
//! Shared testing utilities for the conveyor task queue workspace.
//! This crate provides mock transports, callbacks and periodic backends,
//! plus small builders for task envelopes, usable across all other
//! crates in the workspace.
//!
//! ## Usage
//!
//! Add this crate as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! conveyor-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! Then use the mocks in your tests:
//!
//! ```rust
//! use conveyor_testing_utils::{RecordingTransport, task_named};
//! ```

pub mod builders;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use mocks::*;
