//! The dispatcher: admission, hand-off to workers, completion and eviction.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, info, warn};

use super::archive::Archive;
use super::config::DispatcherConfig;
use crate::domain::{Operation, OperationDescriptor, TaskId, TaskRecord, TaskState};
use crate::error::{DispatchError, ValidationError};
use crate::observability::TaskCounts;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::reservation::{Acquire, Release, ReservationTable};

/// An admitted task handed to a worker.
pub(crate) struct Dispatched {
    pub task_id: TaskId,
    pub operation: Arc<dyn Operation>,
    pub args: Vec<Value>,
}

struct Job {
    operation: Arc<dyn Operation>,
    args: Vec<Value>,
}

struct Entry {
    record: TaskRecord,
    /// Submission order; ties wait queues to FIFO.
    seq: u64,
    /// Taken by the worker that runs it (or dropped on cancel).
    job: Option<Job>,
    status: watch::Sender<TaskState>,
}

/// Everything behind the dispatcher's lock.
///
/// Design:
/// - `tasks`: every retained record (waiting, running, and terminal records
///   that have not been evicted yet)
/// - `waiting`: WAITING tasks by submission seq; re-evaluation walks it in order
/// - `ready`: admitted (RUNNING) tasks no worker has picked up yet
/// - `table`: held claims and per-key wait queues
struct DispatchState {
    tasks: HashMap<TaskId, Entry>,
    waiting: BTreeMap<u64, TaskId>,
    ready: VecDeque<TaskId>,
    table: ReservationTable,
    archive: Archive,
    running_weight: u32,
    capacity: u32,
    next_seq: u64,
    closed: bool,
}

impl DispatchState {
    fn new(capacity: u32) -> Self {
        Self {
            tasks: HashMap::new(),
            waiting: BTreeMap::new(),
            ready: VecDeque::new(),
            table: ReservationTable::new(),
            archive: Archive::default(),
            running_weight: 0,
            capacity,
            next_seq: 1,
            closed: false,
        }
    }

    /// Admit `id` if both its claims and its weight fit right now.
    ///
    /// A task blocked on capacity is parked on all of its keys so later
    /// conflicting submissions still queue behind it.
    fn try_admit(&mut self, id: TaskId, now: DateTime<Utc>) -> bool {
        let Some(entry) = self.tasks.get(&id) else {
            return false;
        };
        if entry.record.state() != TaskState::Waiting {
            return false;
        }
        let seq = entry.seq;
        let weight = entry.record.weight;
        let claims = entry.record.claims.clone();

        if self.running_weight.saturating_add(weight) > self.capacity {
            self.table.park(id, seq, &claims);
            debug!(
                task_id = %id,
                weight,
                running_weight = self.running_weight,
                "task waiting for capacity"
            );
            return false;
        }

        if let Acquire::Blocked { by, keys } = self.table.try_acquire(id, seq, &claims) {
            debug!(task_id = %id, blocked_by = ?by, keys = ?keys, "task waiting for reservations");
            return false;
        }

        let Some(entry) = self.tasks.get_mut(&id) else {
            return false;
        };
        if let Err(e) = entry.record.start(now) {
            warn!(error = %e, "admission refused by state machine");
            self.table.release(id);
            return false;
        }
        entry.status.send_replace(TaskState::Running);
        info!(
            task_id = %id,
            operation = %entry.record.operation,
            weight,
            "task admitted"
        );

        self.waiting.remove(&seq);
        self.running_weight += weight;
        self.ready.push_back(id);
        true
    }

    /// One pass over every waiting task in submission order.
    ///
    /// A single pass is enough: admission only ever adds holders and weight,
    /// so a task that stays blocked here cannot be unblocked by a later
    /// admission in the same pass.
    fn reevaluate(&mut self, now: DateTime<Utc>) -> usize {
        let candidates: Vec<TaskId> = self.waiting.values().copied().collect();
        candidates
            .into_iter()
            .filter(|id| self.try_admit(*id, now))
            .count()
    }

    /// Keep a completed durable record, evicting the oldest past `max_records`.
    fn retain(&mut self, id: TaskId, now: DateTime<Utc>, max_records: usize) {
        self.archive.push(now, id);
        for evicted in self.archive.over_capacity(max_records) {
            self.tasks.remove(&evicted);
            debug!(task_id = %evicted, "archived task evicted (capacity)");
        }
    }

    fn counts(&self) -> TaskCounts {
        let mut counts = TaskCounts {
            archived: self.archive.len(),
            running_weight: self.running_weight,
            ..TaskCounts::default()
        };
        for entry in self.tasks.values() {
            match entry.record.state() {
                TaskState::Waiting => counts.waiting += 1,
                TaskState::Running => counts.running += 1,
                TaskState::Succeeded => counts.succeeded += 1,
                TaskState::Failed => counts.failed += 1,
                TaskState::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

struct Inner {
    state: Mutex<DispatchState>,
    notify: Notify,
    config: DispatcherConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

/// Task coordination over claimed resources.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Result<Self, ValidationError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::with_ports(config, clock, ids)
    }

    pub fn with_ports(
        config: DispatcherConfig,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DispatchState::new(config.capacity)),
                notify: Notify::new(),
                config,
                clock,
                ids,
            }),
        })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Accept a descriptor and try to admit it at once.
    ///
    /// Returns the new task id; the task is either RUNNING (admitted) or
    /// WAITING behind conflicting claims or capacity.
    pub async fn submit(&self, descriptor: OperationDescriptor) -> Result<TaskId, DispatchError> {
        let capacity = self.inner.config.capacity;
        if descriptor.weight() > capacity {
            return Err(ValidationError::WeightExceedsCapacity {
                weight: descriptor.weight(),
                capacity,
            }
            .into());
        }
        let parts = descriptor.into_parts();

        let (task_id, admitted) = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            if state.closed {
                return Err(DispatchError::ShuttingDown);
            }
            let now = self.inner.clock.now();
            let task_id = self.inner.ids.generate_task_id();
            let seq = state.next_seq;
            state.next_seq += 1;

            let record = TaskRecord::new(
                task_id,
                parts.operation.name(),
                parts.claims,
                parts.weight,
                parts.tags,
                parts.mode,
                parts.durable,
                now,
            );
            info!(
                task_id = %task_id,
                operation = %record.operation,
                weight = record.weight,
                mode = record.mode.as_str(),
                durable = record.durable,
                "task submitted"
            );
            let (status, _) = watch::channel(TaskState::Waiting);
            state.tasks.insert(
                task_id,
                Entry {
                    record,
                    seq,
                    job: Some(Job {
                        operation: parts.operation,
                        args: parts.args,
                    }),
                    status,
                },
            );
            state.waiting.insert(seq, task_id);
            (task_id, state.try_admit(task_id, now))
        };

        if admitted {
            self.inner.notify.notify_one();
        }
        Ok(task_id)
    }

    /// Snapshot of a task.
    ///
    /// A terminal, non-durable ASYNC record is evicted by this call: the first
    /// retrieval after completion is the last.
    pub async fn get_task(&self, task_id: TaskId) -> Result<TaskRecord, DispatchError> {
        let mut state = self.inner.state.lock().await;
        let entry = state
            .tasks
            .get(&task_id)
            .ok_or(DispatchError::NotFound(task_id))?;
        let snapshot = entry.record.clone();
        if snapshot.is_terminal() && !snapshot.durable && snapshot.mode.is_async() {
            state.tasks.remove(&task_id);
            debug!(task_id = %task_id, "task evicted after retrieval");
        }
        Ok(snapshot)
    }

    /// Snapshot for the synchronous caller that owns the task. Terminal
    /// non-durable records are evicted.
    pub async fn take(&self, task_id: TaskId) -> Result<TaskRecord, DispatchError> {
        let mut state = self.inner.state.lock().await;
        let entry = state
            .tasks
            .get(&task_id)
            .ok_or(DispatchError::NotFound(task_id))?;
        let snapshot = entry.record.clone();
        if snapshot.is_terminal() && !snapshot.durable {
            state.tasks.remove(&task_id);
            debug!(task_id = %task_id, "task evicted after retrieval");
        }
        Ok(snapshot)
    }

    /// State changes of a retained task.
    pub async fn subscribe(
        &self,
        task_id: TaskId,
    ) -> Result<watch::Receiver<TaskState>, DispatchError> {
        let state = self.inner.state.lock().await;
        state
            .tasks
            .get(&task_id)
            .map(|entry| entry.status.subscribe())
            .ok_or(DispatchError::NotFound(task_id))
    }

    /// Suspend until the task is terminal, then [`take`](Self::take) it.
    pub async fn wait(&self, task_id: TaskId) -> Result<TaskRecord, DispatchError> {
        let mut rx = self.subscribe(task_id).await?;
        rx.wait_for(|s| s.is_terminal())
            .await
            .map_err(|_| DispatchError::NotFound(task_id))?;
        self.take(task_id).await
    }

    /// Cancel a task that has not been admitted yet.
    ///
    /// Admission and cancellation are serialised by the dispatcher lock; if
    /// admission got there first the answer is `TooLate`.
    pub async fn cancel(&self, task_id: TaskId) -> Result<(), DispatchError> {
        let admitted = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            let now = self.inner.clock.now();
            let entry = state
                .tasks
                .get_mut(&task_id)
                .ok_or(DispatchError::NotFound(task_id))?;

            let current = entry.record.state();
            if !current.is_cancellable() {
                debug!(task_id = %task_id, state = %current, "cancel rejected");
                return Err(DispatchError::TooLate {
                    task_id,
                    state: current,
                });
            }
            entry
                .record
                .cancel(now)
                .map_err(|e| DispatchError::TooLate {
                    task_id,
                    state: e.from,
                })?;
            entry.job = None;
            entry.status.send_replace(TaskState::Cancelled);
            let (seq, durable) = (entry.seq, entry.record.durable);

            state.waiting.remove(&seq);
            state.table.unpark(task_id);
            info!(task_id = %task_id, "task cancelled");
            if durable {
                state.retain(task_id, now, self.inner.config.archive.max_records);
            }
            state.reevaluate(now)
        };
        self.wake(admitted);
        Ok(())
    }

    /// Record the outcome of a running task, release its claims, and admit
    /// whatever that unblocks.
    ///
    /// Failures release exactly like successes. A second completion for the
    /// same task is ignored.
    pub(crate) async fn complete(&self, task_id: TaskId, outcome: Result<Value, String>) {
        let admitted = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            let now = self.inner.clock.now();
            let Some(entry) = state.tasks.get_mut(&task_id) else {
                warn!(task_id = %task_id, "completion for unknown task");
                return;
            };

            let transition = match outcome {
                Ok(value) => entry.record.succeed(value, now),
                Err(message) => entry.record.fail(message, now),
            };
            if let Err(e) = transition {
                warn!(error = %e, "completion ignored");
                return;
            }
            let final_state = entry.record.state();
            let (weight, durable) = (entry.record.weight, entry.record.durable);
            if let Some(error) = entry.record.error() {
                warn!(task_id = %task_id, error, "task failed");
            }
            entry.status.send_replace(final_state);

            state.running_weight = state.running_weight.saturating_sub(weight);
            match state.table.release(task_id) {
                Release::Released { touched, freed } => {
                    debug!(task_id = %task_id, touched = ?touched, freed = ?freed, "reservations released");
                }
                Release::AlreadyReleased => {
                    warn!(task_id = %task_id, "reservations already released");
                }
            }
            info!(task_id = %task_id, state = %final_state, "task completed");

            if durable {
                state.retain(task_id, now, self.inner.config.archive.max_records);
            }
            state.reevaluate(now)
        };
        self.wake(admitted);
    }

    /// Wait for the next admitted task.
    ///
    /// Cancel-safe: nothing is removed from the ready queue unless this
    /// returns it.
    pub(crate) async fn next_ready(&self) -> Dispatched {
        loop {
            {
                let mut guard = self.inner.state.lock().await;
                let state = &mut *guard;
                while let Some(task_id) = state.ready.pop_front() {
                    let job = state.tasks.get_mut(&task_id).and_then(|e| e.job.take());
                    if let Some(job) = job {
                        return Dispatched {
                            task_id,
                            operation: job.operation,
                            args: job.args,
                        };
                    }
                }
            }
            self.inner.notify.notified().await;
        }
    }

    /// Evict durable records completed longer ago than the archive's max age,
    /// along with terminal records nobody came back for. Returns the number
    /// evicted.
    pub async fn purge_archive(&self) -> usize {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let now = self.inner.clock.now();
        let cutoff = chrono::Duration::from_std(self.inner.config.archive.max_age())
            .ok()
            .and_then(|age| now.checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return 0;
        };

        let mut evicted = state.archive.expired(cutoff);
        evicted.extend(state.tasks.iter().filter_map(|(id, entry)| {
            let stale = !entry.record.durable
                && entry.record.completed_at.is_some_and(|at| at < cutoff);
            stale.then_some(*id)
        }));
        for id in &evicted {
            state.tasks.remove(id);
        }
        if !evicted.is_empty() {
            info!(count = evicted.len(), "archive purged");
        }
        evicted.len()
    }

    pub async fn counts(&self) -> TaskCounts {
        self.inner.state.lock().await.counts()
    }

    /// Snapshots of retained records carrying `tag`, oldest submission first.
    pub async fn find_by_tag(&self, tag: &str) -> Vec<TaskRecord> {
        let state = self.inner.state.lock().await;
        let mut found: Vec<(u64, TaskRecord)> = state
            .tasks
            .values()
            .filter(|entry| entry.record.has_tag(tag))
            .map(|entry| (entry.seq, entry.record.clone()))
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        found.into_iter().map(|(_, record)| record).collect()
    }

    /// Refuse new submissions. Queued and running work is left alone.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        if !state.closed {
            state.closed = true;
            info!("dispatcher closed to new submissions");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.lock().await.closed
    }

    fn wake(&self, admitted: usize) {
        for _ in 0..admitted {
            self.inner.notify.notify_one();
        }
    }
}
