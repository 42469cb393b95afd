use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// RPC status code, using the gRPC numbering.
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Status(pub i32);

impl Status {
    pub const OK: Status = Status(0);
    pub const CANCELLED: Status = Status(1);
    pub const UNKNOWN: Status = Status(2);
    pub const INVALID_ARGUMENT: Status = Status(3);
    pub const DEADLINE_EXCEEDED: Status = Status(4);
    pub const NOT_FOUND: Status = Status(5);
    pub const ALREADY_EXISTS: Status = Status(6);
    pub const PERMISSION_DENIED: Status = Status(7);
    pub const RESOURCE_EXHAUSTED: Status = Status(8);
    pub const FAILED_PRECONDITION: Status = Status(9);
    pub const ABORTED: Status = Status(10);
    pub const OUT_OF_RANGE: Status = Status(11);
    pub const UNIMPLEMENTED: Status = Status(12);
    pub const INTERNAL: Status = Status(13);
    pub const UNAVAILABLE: Status = Status(14);
    pub const DATA_LOSS: Status = Status(15);
    pub const UNAUTHENTICATED: Status = Status(16);

    pub fn code(&self) -> i32 {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        *self == Status::OK
    }

    fn name(&self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "OK",
            1 => "CANCELLED",
            2 => "UNKNOWN",
            3 => "INVALID_ARGUMENT",
            4 => "DEADLINE_EXCEEDED",
            5 => "NOT_FOUND",
            6 => "ALREADY_EXISTS",
            7 => "PERMISSION_DENIED",
            8 => "RESOURCE_EXHAUSTED",
            9 => "FAILED_PRECONDITION",
            10 => "ABORTED",
            11 => "OUT_OF_RANGE",
            12 => "UNIMPLEMENTED",
            13 => "INTERNAL",
            14 => "UNAVAILABLE",
            15 => "DATA_LOSS",
            16 => "UNAUTHENTICATED",
            _ => return None,
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "STATUS_{}", self.0),
        }
    }
}

/// Number of RPCs that finished with a given status code.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RequestResultCount {
    pub status_code: i32,
    pub count: i64,
}

impl RequestResultCount {
    pub fn new(status_code: i32, count: i64) -> Self {
        Self { status_code, count }
    }
}

/// Per-status request counts, keyed by status code.
///
/// On the wire this is a flat list of [`RequestResultCount`]; the list order carries no
/// meaning, so it is held here as a map and serialized back out as pairs.
#[derive(PartialEq, Eq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RequestResultCount>", into = "Vec<RequestResultCount>")]
pub struct RequestResults {
    counts: BTreeMap<i32, i64>,
}

impl RequestResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, status: Status) {
        self.add(status.code(), 1);
    }

    pub fn add(&mut self, status_code: i32, count: i64) {
        let entry = self.counts.entry(status_code).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    pub fn merge(&mut self, other: &RequestResults) {
        for (code, count) in other.counts.iter() {
            self.add(*code, *count);
        }
    }

    pub fn get(&self, status_code: i32) -> i64 {
        self.counts.get(&status_code).copied().unwrap_or(0)
    }

    pub fn total(&self) -> i64 {
        self.counts.values().sum()
    }

    pub fn successes(&self) -> i64 {
        self.get(Status::OK.code())
    }

    pub fn failures(&self) -> i64 {
        self.total() - self.successes()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Status, i64)> + '_ {
        self.counts.iter().map(|(code, count)| (Status(*code), *count))
    }

    pub fn to_counts(&self) -> Vec<RequestResultCount> {
        self.counts
            .iter()
            .map(|(code, count)| RequestResultCount::new(*code, *count))
            .collect()
    }
}

impl From<Vec<RequestResultCount>> for RequestResults {
    fn from(counts: Vec<RequestResultCount>) -> Self {
        counts.into_iter().collect()
    }
}

impl From<RequestResults> for Vec<RequestResultCount> {
    fn from(results: RequestResults) -> Self {
        results.to_counts()
    }
}

impl FromIterator<RequestResultCount> for RequestResults {
    fn from_iter<I: IntoIterator<Item = RequestResultCount>>(iter: I) -> Self {
        let mut results = RequestResults::new();
        for RequestResultCount { status_code, count } in iter {
            results.add(status_code, count);
        }
        results
    }
}

/// Combine two request-result lists, summing counts per status code.
///
/// A code missing from one side counts as zero there. The order of the output is unspecified.
pub fn merge_request_results(
    a: &[RequestResultCount],
    b: &[RequestResultCount],
) -> Vec<RequestResultCount> {
    a.iter()
        .chain(b.iter())
        .copied()
        .collect::<RequestResults>()
        .to_counts()
}
