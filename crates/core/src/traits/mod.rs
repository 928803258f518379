pub mod callback;
pub mod periodic;
pub mod transport;

pub use callback::*;
pub use periodic::*;
pub use transport::*;
