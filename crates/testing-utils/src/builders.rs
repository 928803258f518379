//! Test data builders for creating task envelopes
//!
//! Thin constructors over the core message builders, with sensible
//! defaults for tests.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use conveyor_core::TaskMessage;

/// A minimal task message with only the name set
pub fn task_named(name: &str) -> TaskMessage {
    TaskMessage::new(name)
}

/// A task message carrying small positional args for assertions
pub fn task_with_args(name: &str) -> TaskMessage {
    TaskMessage::new(name).with_args(vec![json!(1), json!("x")])
}

/// A task message already past its eta
pub fn task_overdue(name: &str, seconds_ago: i64) -> TaskMessage {
    TaskMessage::new(name).with_eta(Utc::now() - Duration::seconds(seconds_ago))
}

/// A task message held until a future point in time
pub fn task_due_at(name: &str, eta: DateTime<Utc>) -> TaskMessage {
    TaskMessage::new(name).with_eta(eta)
}
