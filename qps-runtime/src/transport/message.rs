use super::TransportError;
use qps_core::{Stats, WorkerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<M> {
    inner: M,
}

impl<M> Message<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<M: Serialize> Message<M> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, TransportError> {
        Ok(bincode::serialize(self)?)
    }
}

impl<M: for<'a> Deserialize<'a>> Message<M> {
    pub fn from_bytes(bytes: &[u8]) -> Result<Message<M>, TransportError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// A snapshot sent by one worker during the run identified by `run_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub run_id: Uuid,
    pub worker: WorkerId,
    pub stats: Stats,
}

impl WorkerReport {
    pub fn new(run_id: Uuid, worker: WorkerId, stats: impl Into<Stats>) -> Self {
        Self {
            run_id,
            worker,
            stats: stats.into(),
        }
    }
}

/// Driver reply to every [`WorkerReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ack {
    Accepted,
    Rejected(String),
}
