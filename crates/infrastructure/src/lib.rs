pub mod amqp;
pub mod factory;
pub mod ingest;
pub mod memory;
pub mod publisher;

pub use amqp::*;
pub use factory::*;
pub use ingest::*;
pub use memory::*;
pub use publisher::*;
