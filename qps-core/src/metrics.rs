/// Metric names emitted for a recorded RPC when the `metrics` feature of `qps` is enabled.
#[derive(Copy, Clone, Debug)]
pub struct RpcLabels {
    pub success: &'static str,
    pub error: &'static str,
    pub latency: &'static str,
}

impl RpcLabels {
    pub const fn unlabeled() -> Self {
        Self {
            success: "qps_rpc_success",
            error: "qps_rpc_error",
            latency: "qps_rpc_latency",
        }
    }
}

#[macro_export]
macro_rules! generate_labels {
    ($base_name:expr) => {
        ::qps::core::RpcLabels {
            success: concat!(stringify!($base_name), "_success"),
            error: concat!(stringify!($base_name), "_error"),
            latency: concat!(stringify!($base_name), "_latency"),
        }
    };
}
