//! Reservation table: held and waiting claims per resource key.
//!
//! Design:
//! - `slots`: ResourceKey -> who holds it (and how) + who waits on it
//! - `held_by`: TaskId -> keys it holds (release in one step)
//! - `parked`: TaskId -> keys it waits on (re-park / withdraw in one step)
//! - Invariant: `held_by` and the `held` lists of `slots` are kept in sync,
//!   and likewise `parked` and the `waiting` queues.
//!
//! Waiting queues are ordered by submission sequence, not by insertion, so a
//! task that is re-evaluated and parked again keeps its place in line.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{OperationKind, ResourceClaim, ResourceKey, TaskId};

use super::resolver;

/// Outcome of [`ReservationTable::try_acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    /// Every claim was recorded as held.
    Granted,

    /// Nothing was recorded as held; the task is parked on `keys`.
    Blocked {
        by: Vec<TaskId>,
        keys: Vec<ResourceKey>,
    },
}

/// Outcome of [`ReservationTable::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    Released {
        /// Keys the task held.
        touched: Vec<ResourceKey>,
        /// Keys nobody holds any more.
        freed: Vec<ResourceKey>,
    },

    /// The task holds nothing (never granted, or released before).
    AlreadyReleased,
}

#[derive(Debug, Default)]
pub(super) struct KeySlot {
    pub(super) held: Vec<(TaskId, OperationKind)>,
    /// submission seq -> waiter
    pub(super) waiting: BTreeMap<u64, (TaskId, OperationKind)>,
}

impl KeySlot {
    fn is_empty(&self) -> bool {
        self.held.is_empty() && self.waiting.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ReservationTable {
    pub(super) slots: HashMap<ResourceKey, KeySlot>,
    held_by: HashMap<TaskId, Vec<ResourceKey>>,
    parked: HashMap<TaskId, (u64, Vec<ResourceKey>)>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant all of `claims` to `task`, or none of them.
    ///
    /// A claim is grantable when it is compatible with every claim held on its
    /// key by other tasks and with every claim of tasks that were submitted
    /// earlier (`seq` lower) and are still waiting on that key. The second rule
    /// is what keeps admission FIFO per key.
    ///
    /// On `Blocked` the task is (re)parked on the keys where it conflicts.
    pub fn try_acquire(&mut self, task: TaskId, seq: u64, claims: &[ResourceClaim]) -> Acquire {
        self.unpark(task);

        let blockers = resolver::blockers(self, task, seq, claims);
        if blockers.is_empty() {
            let mut keys = Vec::with_capacity(claims.len());
            for claim in claims {
                self.slots
                    .entry(claim.key.clone())
                    .or_default()
                    .held
                    .push((task, claim.kind));
                keys.push(claim.key.clone());
            }
            self.held_by.insert(task, keys);
            return Acquire::Granted;
        }

        let mut by: Vec<TaskId> = blockers.iter().map(|b| b.task).collect();
        by.sort();
        by.dedup();
        let mut keys: Vec<ResourceKey> = blockers.into_iter().map(|b| b.key).collect();
        keys.sort();
        keys.dedup();

        let blocked_claims: Vec<ResourceClaim> = claims
            .iter()
            .filter(|c| keys.contains(&c.key))
            .cloned()
            .collect();
        self.park(task, seq, &blocked_claims);

        Acquire::Blocked { by, keys }
    }

    /// Queue `task` on every key in `claims` without granting anything.
    /// Replaces any earlier parking of the same task.
    pub fn park(&mut self, task: TaskId, seq: u64, claims: &[ResourceClaim]) {
        self.unpark(task);
        let mut keys = Vec::with_capacity(claims.len());
        for claim in claims {
            self.slots
                .entry(claim.key.clone())
                .or_default()
                .waiting
                .insert(seq, (task, claim.kind));
            keys.push(claim.key.clone());
        }
        if !keys.is_empty() {
            self.parked.insert(task, (seq, keys));
        }
    }

    /// Remove `task` from every wait queue; returns the keys it waited on.
    pub fn unpark(&mut self, task: TaskId) -> Vec<ResourceKey> {
        let Some((seq, keys)) = self.parked.remove(&task) else {
            return Vec::new();
        };
        for key in &keys {
            if let Some(slot) = self.slots.get_mut(key) {
                slot.waiting.remove(&seq);
                if slot.is_empty() {
                    self.slots.remove(key);
                }
            }
        }
        keys
    }

    /// Drop every claim held by `task` in one step.
    ///
    /// Calling this twice is harmless: the second call reports
    /// `AlreadyReleased` and touches nothing.
    pub fn release(&mut self, task: TaskId) -> Release {
        let Some(keys) = self.held_by.remove(&task) else {
            return Release::AlreadyReleased;
        };
        let mut freed = Vec::new();
        for key in &keys {
            let Some(slot) = self.slots.get_mut(key) else {
                continue;
            };
            slot.held.retain(|(holder, _)| *holder != task);
            if slot.held.is_empty() {
                freed.push(key.clone());
            }
            if slot.is_empty() {
                self.slots.remove(key);
            }
        }
        Release::Released {
            touched: keys,
            freed,
        }
    }

    pub fn holds(&self, task: TaskId) -> bool {
        self.held_by.contains_key(&task)
    }

    pub fn is_parked(&self, task: TaskId) -> bool {
        self.parked.contains_key(&task)
    }

    /// Current holders of `key`.
    pub fn holders(&self, key: &ResourceKey) -> Vec<(TaskId, OperationKind)> {
        self.slots
            .get(key)
            .map(|slot| slot.held.clone())
            .unwrap_or_default()
    }

    /// Waiters on `key`, in submission order.
    pub fn waiters(&self, key: &ResourceKey) -> Vec<TaskId> {
        self.slots
            .get(key)
            .map(|slot| slot.waiting.values().map(|(task, _)| *task).collect())
            .unwrap_or_default()
    }

    /// Number of tasks holding at least one reservation.
    pub fn holder_count(&self) -> usize {
        self.held_by.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.held_by.is_empty() && self.parked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CONSUMER, REPOSITORY};
    use ulid::Ulid;

    fn task() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    fn key(t: &str, id: &str) -> ResourceKey {
        ResourceKey::new(t, id)
    }

    #[test]
    fn compatible_reads_are_granted_together() {
        let mut table = ReservationTable::new();
        let (a, b) = (task(), task());
        let claims = [ResourceClaim::read(REPOSITORY, "r1")];

        assert_eq!(table.try_acquire(a, 1, &claims), Acquire::Granted);
        assert_eq!(table.try_acquire(b, 2, &claims), Acquire::Granted);
        assert_eq!(table.holders(&key(REPOSITORY, "r1")).len(), 2);
    }

    #[test]
    fn update_blocks_behind_create_and_parks() {
        let mut table = ReservationTable::new();
        let (t1, t2) = (task(), task());

        assert_eq!(
            table.try_acquire(t1, 1, &[ResourceClaim::create(CONSUMER, "c1")]),
            Acquire::Granted
        );
        let outcome = table.try_acquire(t2, 2, &[ResourceClaim::update(CONSUMER, "c1")]);
        assert_eq!(
            outcome,
            Acquire::Blocked {
                by: vec![t1],
                keys: vec![key(CONSUMER, "c1")],
            }
        );
        assert!(table.is_parked(t2));
        assert_eq!(table.waiters(&key(CONSUMER, "c1")), vec![t2]);
    }

    #[test]
    fn acquisition_is_all_or_nothing() {
        let mut table = ReservationTable::new();
        let (holder, t) = (task(), task());
        table.try_acquire(holder, 1, &[ResourceClaim::delete(REPOSITORY, "r1")]);

        let outcome = table.try_acquire(
            t,
            2,
            &[
                ResourceClaim::read(CONSUMER, "c1"),
                ResourceClaim::read(REPOSITORY, "r1"),
            ],
        );
        assert!(matches!(outcome, Acquire::Blocked { .. }));
        assert!(!table.holds(t));
        assert!(table.holders(&key(CONSUMER, "c1")).is_empty());
        // parked only where it conflicts
        assert!(table.waiters(&key(CONSUMER, "c1")).is_empty());
        assert_eq!(table.waiters(&key(REPOSITORY, "r1")), vec![t]);
    }

    #[test]
    fn release_reports_freed_keys_and_is_idempotent() {
        let mut table = ReservationTable::new();
        let (a, b) = (task(), task());
        table.try_acquire(
            a,
            1,
            &[
                ResourceClaim::read(CONSUMER, "c1"),
                ResourceClaim::read(REPOSITORY, "r1"),
            ],
        );
        table.try_acquire(b, 2, &[ResourceClaim::read(REPOSITORY, "r1")]);

        match table.release(a) {
            Release::Released { touched, freed } => {
                assert_eq!(touched.len(), 2);
                assert_eq!(freed, vec![key(CONSUMER, "c1")]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(table.release(a), Release::AlreadyReleased);
        // b is untouched by the second release
        assert_eq!(table.holders(&key(REPOSITORY, "r1")), vec![(b, OperationKind::Read)]);
    }

    #[test]
    fn later_reader_queues_behind_earlier_waiting_writer() {
        let mut table = ReservationTable::new();
        let (reader, writer, late_reader) = (task(), task(), task());
        let r1 = [ResourceClaim::read(REPOSITORY, "r1")];

        table.try_acquire(reader, 1, &r1);
        assert!(matches!(
            table.try_acquire(writer, 2, &[ResourceClaim::update(REPOSITORY, "r1")]),
            Acquire::Blocked { .. }
        ));
        // compatible with the holder, but not with the writer ahead of it
        let outcome = table.try_acquire(late_reader, 3, &r1);
        assert_eq!(
            outcome,
            Acquire::Blocked {
                by: vec![writer],
                keys: vec![key(REPOSITORY, "r1")],
            }
        );
    }

    #[test]
    fn unrelated_key_is_not_held_up_by_waiters_elsewhere() {
        let mut table = ReservationTable::new();
        let (holder, waiter, other) = (task(), task(), task());
        table.try_acquire(holder, 1, &[ResourceClaim::update(CONSUMER, "c1")]);
        table.try_acquire(
            waiter,
            2,
            &[
                ResourceClaim::update(CONSUMER, "c1"),
                ResourceClaim::update(REPOSITORY, "r1"),
            ],
        );

        assert_eq!(
            table.try_acquire(other, 3, &[ResourceClaim::read(REPOSITORY, "r1")]),
            Acquire::Granted
        );
    }

    #[test]
    fn reparking_keeps_submission_order() {
        let mut table = ReservationTable::new();
        let (holder, first, second) = (task(), task(), task());
        let c1 = [ResourceClaim::update(CONSUMER, "c1")];
        table.try_acquire(holder, 1, &c1);
        table.try_acquire(first, 2, &c1);
        table.try_acquire(second, 3, &c1);

        // re-evaluate in reverse order; queue order must not change
        table.try_acquire(second, 3, &c1);
        table.try_acquire(first, 2, &c1);
        assert_eq!(table.waiters(&key(CONSUMER, "c1")), vec![first, second]);
    }

    #[test]
    fn unpark_cleans_up_empty_slots() {
        let mut table = ReservationTable::new();
        let t = task();
        table.park(t, 1, &[ResourceClaim::read(CONSUMER, "c1")]);
        assert_eq!(table.unpark(t), vec![key(CONSUMER, "c1")]);
        assert!(table.is_empty());
    }

    #[test]
    fn claimless_task_is_granted_and_released_once() {
        let mut table = ReservationTable::new();
        let t = task();
        assert_eq!(table.try_acquire(t, 1, &[]), Acquire::Granted);
        assert!(matches!(table.release(t), Release::Released { .. }));
        assert_eq!(table.release(t), Release::AlreadyReleased);
    }
}
