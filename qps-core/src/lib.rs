mod aggregator;
mod config;
mod constants;
mod error;
mod histogram;
mod metrics;
mod results;
mod stats;

pub use aggregator::*;
pub use config::*;
pub use constants::*;
pub use error::*;
pub use histogram::*;
pub use metrics::*;
pub use results::*;
pub use stats::*;
