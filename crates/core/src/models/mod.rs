pub mod task;

pub use task::{generate_task_id, HoldEntry, TaskMessage};
