//! Conflict resolution: which tasks stand in the way of a claim set.

use crate::domain::{ResourceClaim, ResourceKey, TaskId};

use super::ReservationTable;

/// One reason a claim set cannot be granted right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    pub key: ResourceKey,
    pub task: TaskId,
}

/// Every (key, task) pair that blocks `task` from acquiring `claims`.
///
/// Blockers are other tasks that either hold a conflicting claim on the key, or
/// wait on it with a conflicting claim and were submitted before `seq`.
/// An empty result means the claims are grantable.
pub fn blockers(
    table: &ReservationTable,
    task: TaskId,
    seq: u64,
    claims: &[ResourceClaim],
) -> Vec<Blocker> {
    let mut out = Vec::new();
    for claim in claims {
        let Some(slot) = table.slots.get(&claim.key) else {
            continue;
        };
        for (holder, kind) in &slot.held {
            if *holder != task && kind.conflicts_with(claim.kind) {
                out.push(Blocker {
                    key: claim.key.clone(),
                    task: *holder,
                });
            }
        }
        for (waiter, kind) in slot.waiting.range(..seq).map(|(_, w)| w) {
            if *waiter != task && kind.conflicts_with(claim.kind) {
                out.push(Blocker {
                    key: claim.key.clone(),
                    task: *waiter,
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CONSUMER, REPOSITORY};
    use ulid::Ulid;

    fn task() -> TaskId {
        TaskId::from_ulid(Ulid::new())
    }

    #[test]
    fn empty_table_has_no_blockers() {
        let table = ReservationTable::new();
        assert!(blockers(&table, task(), 1, &[ResourceClaim::delete(CONSUMER, "c1")]).is_empty());
    }

    #[test]
    fn own_claims_never_block() {
        let mut table = ReservationTable::new();
        let t = task();
        let claims = [ResourceClaim::update(CONSUMER, "c1")];
        table.park(t, 5, &claims);
        assert!(blockers(&table, t, 5, &claims).is_empty());
    }

    #[test]
    fn later_waiters_do_not_block_earlier_submissions() {
        let mut table = ReservationTable::new();
        let (early, late) = (task(), task());
        table.park(late, 9, &[ResourceClaim::update(REPOSITORY, "r1")]);
        assert!(blockers(&table, early, 3, &[ResourceClaim::update(REPOSITORY, "r1")]).is_empty());
    }

    #[test]
    fn each_conflicting_key_is_reported() {
        let mut table = ReservationTable::new();
        let (holder, t) = (task(), task());
        table.try_acquire(
            holder,
            1,
            &[
                ResourceClaim::create(CONSUMER, "c1"),
                ResourceClaim::update(REPOSITORY, "r1"),
            ],
        );
        let found = blockers(
            &table,
            t,
            2,
            &[
                ResourceClaim::update(CONSUMER, "c1"),
                ResourceClaim::read(REPOSITORY, "r1"),
            ],
        );
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|b| b.task == holder));
    }
}
