pub mod background;
pub mod config;
pub mod errors;
pub mod models;
pub mod queue;
pub mod signals;
pub mod traits;

pub use background::{spawn_loop, BackgroundLoop, LoopHandle};
pub use config::{
    AppConfig, ControllerConfig, MediatorConfig, ObservabilityConfig, PeriodicTaskDef,
    TransportConfig, TransportType, WorkerConfig,
};
pub use errors::{ConveyorError, Result};
pub use models::{generate_task_id, HoldEntry, TaskMessage};
pub use queue::{HoldQueue, ReadyQueue, WorkQueue};
pub use signals::{SignalHub, TaskSentEvent};
pub use traits::{ExecutionCallback, PeriodicBackend, SendOptions, Transport};
