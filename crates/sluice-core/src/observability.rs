use serde::{Deserialize, Serialize};

/// Snapshot of retained task records by state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub waiting: usize,
    pub running: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Durable records held for later retrieval.
    pub archived: usize,
    /// Summed weight of running tasks.
    pub running_weight: u32,
}
