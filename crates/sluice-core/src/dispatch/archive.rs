//! Retention index of completed durable records.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::domain::TaskId;

/// Durable task ids in completion order.
///
/// The records themselves stay in the dispatcher's task map; this only decides
/// which ids to evict.
#[derive(Debug, Default)]
pub(crate) struct Archive {
    entries: VecDeque<(DateTime<Utc>, TaskId)>,
}

impl Archive {
    pub(crate) fn push(&mut self, completed_at: DateTime<Utc>, id: TaskId) {
        self.entries.push_back((completed_at, id));
    }

    /// Ids to evict so at most `max_records` remain, oldest first.
    pub(crate) fn over_capacity(&mut self, max_records: usize) -> Vec<TaskId> {
        let excess = self.entries.len().saturating_sub(max_records);
        self.entries.drain(..excess).map(|(_, id)| id).collect()
    }

    /// Ids of records completed before `cutoff`.
    pub(crate) fn expired(&mut self, cutoff: DateTime<Utc>) -> Vec<TaskId> {
        let mut out = Vec::new();
        while let Some((completed_at, _)) = self.entries.front() {
            if *completed_at >= cutoff {
                break;
            }
            if let Some((_, id)) = self.entries.pop_front() {
                out.push(id);
            }
        }
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ulid::Ulid;

    fn id() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    #[test]
    fn capacity_evicts_oldest_completed_first() {
        let t0 = Utc::now();
        let (a, b, c) = (id(), id(), id());
        let mut archive = Archive::default();
        archive.push(t0, a);
        archive.push(t0 + Duration::seconds(1), b);
        archive.push(t0 + Duration::seconds(2), c);

        assert_eq!(archive.over_capacity(2), vec![a]);
        assert_eq!(archive.over_capacity(2), Vec::<TaskId>::new());
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn expiry_stops_at_first_fresh_record() {
        let t0 = Utc::now();
        let (a, b) = (id(), id());
        let mut archive = Archive::default();
        archive.push(t0, a);
        archive.push(t0 + Duration::minutes(10), b);

        assert_eq!(archive.expired(t0 + Duration::minutes(5)), vec![a]);
        assert_eq!(archive.len(), 1);
    }
}
