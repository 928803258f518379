//! Dispatch Loops
//!
//! This crate holds the two scheduling loops of the worker: the mediator
//! moving ready tasks into execution, and the delayed task controller
//! promoting held tasks and triggering periodic ones.

pub mod delayed;
pub mod mediator;
pub mod periodic;

pub use delayed::*;
pub use mediator::*;
pub use periodic::*;
