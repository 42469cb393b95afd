//! Worker-to-driver report transport
//!
//! Reports travel as bincode-encoded [`Message`]s over a websocket. A worker sends a
//! [`WorkerReport`] and waits for the driver's [`Ack`] before sending the next one.
mod error;
mod interchange;
mod message;
mod protocol;

pub use error::TransportError;
pub use interchange::StatsStream;
pub use message::{Ack, Message, WorkerReport};
pub use protocol::{receive_reports, send_report};
