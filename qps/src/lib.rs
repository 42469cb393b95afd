#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;

#[macro_use]
mod macros;

pub mod measurement;
#[doc(hidden)]
pub mod recorder;
pub(crate) mod timer;
pub mod worker;

pub use qps_core as core;
pub use qps_macros::rpc;

pub use error::WorkerError;
pub use measurement::Measurement;
pub use recorder::{AsStatus, SharedHistogram};
pub use worker::Worker;

cfg_rt! {
    pub use qps_runtime::runtime::{self, DriverRuntime};
    pub use qps_runtime::client;
    pub use qps_runtime::RuntimeError;
}

pub mod prelude {
    pub use crate::core::{
        ClientStats, HistogramParams, RunConfig, RunReport, ServerStats, Stats, Status, WorkerId,
    };
    pub use crate::recorder::AsStatus;
    pub use crate::worker::Worker;
    pub use qps_macros::rpc;

    cfg_rt! {
        pub use qps_runtime::runtime::DriverRuntime;
        pub use qps_runtime::client::report_stats;
    }
}
