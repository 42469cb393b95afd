pub mod client;
pub mod collector;
pub mod runtime;
pub mod transport;

mod error;
mod server;

pub use crate::error::RuntimeError;
pub use crate::runtime::DriverRuntime;
pub use crate::server::ServerError;
