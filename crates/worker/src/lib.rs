pub mod executors;
pub mod pool;
pub mod registry;

pub use executors::{
    HttpExecutor, HttpTaskParams, ShellExecutor, ShellTaskParams, TaskExecutor, TaskOutcome,
};
pub use pool::TaskPool;
pub use registry::TaskRegistry;
