//! The call shapes offered to API-layer callers.
//!
//! - [`Execution::execute`]: block until the task is terminal, return its value
//! - [`Execution::execute_sync_created`]: same, wrapped with the location of
//!   the created resource
//! - [`Execution::execute_async`]: return a handle at once
//!
//! All three go through the same [`Dispatcher`]; the facade only decides how
//! long the caller is suspended and what it gets back.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::domain::{ExecutionMode, Link, OperationDescriptor, TaskId, TaskRecord, TaskState};
use crate::error::DispatchError;

/// Reference to a task the caller did not wait for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: TaskId,
    pub href: Link,
}

impl TaskHandle {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            href: Link::task(task_id),
        }
    }
}

/// Result of a CREATE-shaped call: the body plus where the new thing lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Created {
    pub location: Link,
    pub body: Value,
}

/// Outcome of a bounded synchronous wait.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Done(Value),
    /// Still waiting or running; nothing was cancelled.
    Pending(TaskHandle),
}

/// What [`Execution::submit`] returns for each execution mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    Result(Value),
    Created(Created),
    Handle(TaskHandle),
}

/// Execution facade over a dispatcher.
#[derive(Clone)]
pub struct Execution {
    dispatcher: Dispatcher,
}

impl Execution {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Route by the descriptor's own mode.
    pub async fn submit(&self, descriptor: OperationDescriptor) -> Result<Submitted, DispatchError> {
        match descriptor.mode().clone() {
            ExecutionMode::Sync => self.execute(descriptor).await.map(Submitted::Result),
            ExecutionMode::SyncCreated { location } => self
                .execute_sync_created(descriptor, location)
                .await
                .map(Submitted::Created),
            ExecutionMode::Async => self.execute_async(descriptor).await.map(Submitted::Handle),
        }
    }

    /// Submit and suspend until the task is terminal.
    ///
    /// Returns the operation's value, or the captured failure as
    /// [`DispatchError::Execution`].
    pub async fn execute(&self, descriptor: OperationDescriptor) -> Result<Value, DispatchError> {
        let task_id = self
            .dispatcher
            .submit(descriptor.with_mode(ExecutionMode::Sync))
            .await?;
        match self.settle(task_id, None).await? {
            Some(record) => into_value(record),
            None => Err(still_pending(task_id)),
        }
    }

    /// Like [`execute`](Self::execute) but gives up waiting after `timeout`.
    ///
    /// On timeout the task keeps its place; the returned handle can be used
    /// to observe it later.
    pub async fn execute_within(
        &self,
        descriptor: OperationDescriptor,
        timeout: Duration,
    ) -> Result<Completion, DispatchError> {
        let task_id = self
            .dispatcher
            .submit(descriptor.with_mode(ExecutionMode::Sync))
            .await?;
        match self.settle(task_id, Some(timeout)).await? {
            Some(record) => into_value(record).map(Completion::Done),
            None => {
                info!(task_id = %task_id, ?timeout, "caller stopped waiting");
                Ok(Completion::Pending(TaskHandle::new(task_id)))
            }
        }
    }

    /// Synchronous execution for operations that create something.
    pub async fn execute_sync_created(
        &self,
        descriptor: OperationDescriptor,
        location: Link,
    ) -> Result<Created, DispatchError> {
        let mode = ExecutionMode::SyncCreated {
            location: location.clone(),
        };
        let task_id = self.dispatcher.submit(descriptor.with_mode(mode)).await?;
        let record = self
            .settle(task_id, None)
            .await?
            .ok_or_else(|| still_pending(task_id))?;
        Ok(Created {
            location,
            body: into_value(record)?,
        })
    }

    /// Submit and return immediately.
    ///
    /// With an admission timeout configured, a watchdog cancels the task if it
    /// is still waiting when the timeout expires.
    pub async fn execute_async(
        &self,
        descriptor: OperationDescriptor,
    ) -> Result<TaskHandle, DispatchError> {
        let task_id = self
            .dispatcher
            .submit(descriptor.with_mode(ExecutionMode::Async))
            .await?;

        if let Some(limit) = self.dispatcher.config().admission_timeout() {
            let mut rx = self.dispatcher.subscribe(task_id).await?;
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                let admitted = tokio::time::timeout(limit, rx.wait_for(|s| *s != TaskState::Waiting))
                    .await
                    .is_ok();
                if !admitted && dispatcher.cancel(task_id).await.is_ok() {
                    warn!(task_id = %task_id, ?limit, "task not admitted in time; cancelled");
                }
            });
        }
        Ok(TaskHandle::new(task_id))
    }

    pub async fn get_task(&self, task_id: TaskId) -> Result<TaskRecord, DispatchError> {
        self.dispatcher.get_task(task_id).await
    }

    pub async fn cancel(&self, task_id: TaskId) -> Result<(), DispatchError> {
        self.dispatcher.cancel(task_id).await
    }

    /// Suspend on the task's status until it is terminal (or `timeout`
    /// passes), enforcing the admission timeout on the way.
    ///
    /// `Ok(None)` means the caller's timeout expired first; the task is left
    /// where it was, even if it has not been admitted yet.
    async fn settle(
        &self,
        task_id: TaskId,
        timeout: Option<Duration>,
    ) -> Result<Option<TaskRecord>, DispatchError> {
        let started = Instant::now();
        let deadline = timeout.map(|t| started + t);
        let mut rx = self.dispatcher.subscribe(task_id).await?;

        if let Some(limit) = self.dispatcher.config().admission_timeout() {
            let admission_deadline = started + limit;
            let wait_until = deadline.map_or(admission_deadline, |d| d.min(admission_deadline));
            let admitted =
                tokio::time::timeout_at(wait_until, rx.wait_for(|s| *s != TaskState::Waiting))
                    .await
                    .is_ok();
            if !admitted {
                if deadline.is_some_and(|d| d <= admission_deadline) {
                    return Ok(None);
                }
                match self.dispatcher.cancel(task_id).await {
                    Ok(()) => {
                        // drop the cancelled record; nobody else will ask for it
                        if let Err(e) = self.dispatcher.take(task_id).await {
                            debug!(task_id = %task_id, error = %e, "cancelled record already gone");
                        }
                        return Err(DispatchError::ConflictTimeout {
                            task_id,
                            waited: limit,
                        });
                    }
                    // admitted after all
                    Err(DispatchError::TooLate { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        let terminal = rx.wait_for(|s| s.is_terminal());
        let finished = match deadline {
            None => terminal.await.is_ok(),
            Some(deadline) => match tokio::time::timeout_at(deadline, terminal).await {
                Err(_) => return Ok(None),
                Ok(r) => r.is_ok(),
            },
        };
        if !finished {
            // status channel closed: the record was evicted under us
            return Err(DispatchError::NotFound(task_id));
        }
        self.dispatcher.take(task_id).await.map(Some)
    }
}

fn into_value(record: TaskRecord) -> Result<Value, DispatchError> {
    match record.state() {
        TaskState::Succeeded => Ok(record.result().cloned().unwrap_or(Value::Null)),
        TaskState::Failed => Err(DispatchError::Execution {
            task_id: record.id,
            message: record.error().unwrap_or_default().to_string(),
        }),
        TaskState::Cancelled => Err(DispatchError::Cancelled(record.id)),
        TaskState::Waiting | TaskState::Running => Err(still_pending(record.id)),
    }
}

fn still_pending(task_id: TaskId) -> DispatchError {
    DispatchError::Execution {
        task_id,
        message: "task has not finished".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::dispatch::{DispatcherConfig, WorkerGroup};
    use crate::domain::types::CONSUMER;
    use crate::domain::{Operation, ResourceClaim, operation_fn};
    use crate::error::OperationError;

    fn setup(config: DispatcherConfig) -> (Execution, WorkerGroup) {
        let dispatcher = Dispatcher::new(config).unwrap();
        let workers = WorkerGroup::spawn(&dispatcher);
        (Execution::new(dispatcher), workers)
    }

    fn returning(value: Value) -> OperationDescriptor {
        OperationDescriptor::builder()
            .operation(operation_fn("const", move |_| {
                let value = value.clone();
                async move { Ok(value) }
            }))
            .build()
            .unwrap()
    }

    /// Operation that blocks until the semaphore gets a permit.
    fn gated(gate: &Arc<Semaphore>) -> Arc<dyn Operation> {
        let gate = Arc::clone(gate);
        operation_fn("gated", move |_| {
            let gate = Arc::clone(&gate);
            async move {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|e| OperationError::failed(e.to_string()))?;
                Ok(json!("released"))
            }
        })
    }

    #[tokio::test]
    async fn execute_returns_the_operation_value() {
        let (exec, workers) = setup(DispatcherConfig::default());
        let value = exec.execute(returning(json!({"id": "c1"}))).await.unwrap();
        assert_eq!(value, json!({"id": "c1"}));
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn execute_surfaces_the_captured_failure() {
        let (exec, workers) = setup(DispatcherConfig::default());
        let desc = OperationDescriptor::builder()
            .operation(operation_fn("unregister", |_| async {
                Err(OperationError::missing("consumer", "ghost"))
            }))
            .build()
            .unwrap();
        match exec.execute(desc).await {
            Err(DispatchError::Execution { message, .. }) => {
                assert_eq!(message, "missing resource consumer:ghost");
            }
            other => panic!("unexpected {other:?}"),
        }
        // the record was handed to the caller and evicted
        assert_eq!(exec.dispatcher().counts().await.failed, 0);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn sync_created_wraps_body_with_location() {
        let (exec, workers) = setup(DispatcherConfig::default());
        let created = exec
            .execute_sync_created(returning(json!({"id": "c1"})), Link::new("/consumers/c1/"))
            .await
            .unwrap();
        assert_eq!(created.location.href, "/consumers/c1/");
        assert_eq!(created.body, json!({"id": "c1"}));
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn async_returns_a_handle_before_the_work_finishes() {
        let (exec, workers) = setup(DispatcherConfig::default());
        let gate = Arc::new(Semaphore::new(0));
        let desc = OperationDescriptor::builder()
            .operation(gated(&gate))
            .build()
            .unwrap();

        let handle = exec.execute_async(desc).await.unwrap();
        assert_eq!(handle.href, Link::task(handle.task_id));
        let record = exec.get_task(handle.task_id).await.unwrap();
        assert!(!record.is_terminal());
        assert!(record.mode.is_async());

        gate.add_permits(1);
        let mut rx = exec.dispatcher().subscribe(handle.task_id).await.unwrap();
        rx.wait_for(|s| s.is_terminal()).await.unwrap();
        let done = exec.get_task(handle.task_id).await.unwrap();
        assert_eq!(done.result(), Some(&json!("released")));
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn bounded_wait_returns_pending_without_cancelling() {
        let (exec, workers) = setup(DispatcherConfig::default());
        let gate = Arc::new(Semaphore::new(0));
        let desc = OperationDescriptor::builder()
            .operation(gated(&gate))
            .build()
            .unwrap();

        let completion = exec
            .execute_within(desc, Duration::from_millis(20))
            .await
            .unwrap();
        let handle = match completion {
            Completion::Pending(handle) => handle,
            Completion::Done(value) => panic!("expected pending, got {value}"),
        };
        assert_eq!(
            exec.get_task(handle.task_id).await.unwrap().state(),
            TaskState::Running
        );

        gate.add_permits(1);
        let record = exec.dispatcher().wait(handle.task_id).await.unwrap();
        assert_eq!(record.state(), TaskState::Succeeded);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn bounded_wait_shorter_than_admission_timeout_leaves_task_waiting() {
        let (exec, workers) = setup(DispatcherConfig {
            admission_timeout_ms: Some(500),
            ..DispatcherConfig::default()
        });
        let gate = Arc::new(Semaphore::new(0));
        let holder = OperationDescriptor::builder()
            .operation(gated(&gate))
            .claim(ResourceClaim::update(CONSUMER, "c1"))
            .build()
            .unwrap();
        let holder = exec.execute_async(holder).await.unwrap();

        let blocked = OperationDescriptor::builder()
            .operation(operation_fn("update", |_| async { Ok(json!("updated")) }))
            .claim(ResourceClaim::update(CONSUMER, "c1"))
            .build()
            .unwrap();
        let started = Instant::now();
        let completion = exec
            .execute_within(blocked, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_millis(400));
        let handle = match completion {
            Completion::Pending(handle) => handle,
            Completion::Done(value) => panic!("expected pending, got {value}"),
        };
        assert_eq!(
            exec.get_task(handle.task_id).await.unwrap().state(),
            TaskState::Waiting
        );

        gate.add_permits(1);
        let record = exec.dispatcher().wait(handle.task_id).await.unwrap();
        assert_eq!(record.result(), Some(&json!("updated")));
        exec.dispatcher().wait(holder.task_id).await.unwrap();
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn admission_timeout_cancels_a_blocked_sync_call() {
        let (exec, workers) = setup(DispatcherConfig {
            admission_timeout_ms: Some(30),
            ..DispatcherConfig::default()
        });
        let gate = Arc::new(Semaphore::new(0));
        let holder = OperationDescriptor::builder()
            .operation(gated(&gate))
            .claim(ResourceClaim::update(CONSUMER, "c1"))
            .build()
            .unwrap();
        let holder = exec.execute_async(holder).await.unwrap();

        let blocked = OperationDescriptor::builder()
            .operation(operation_fn("update", |_| async { Ok(Value::Null) }))
            .claim(ResourceClaim::update(CONSUMER, "c1"))
            .build()
            .unwrap();
        let err = exec.execute(blocked).await.unwrap_err();
        assert!(matches!(err, DispatchError::ConflictTimeout { .. }));

        let counts = exec.dispatcher().counts().await;
        assert_eq!(counts.waiting, 0);
        assert_eq!(counts.cancelled, 0);

        gate.add_permits(1);
        let record = exec.dispatcher().wait(holder.task_id).await.unwrap();
        assert_eq!(record.state(), TaskState::Succeeded);
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn submit_routes_by_descriptor_mode() {
        let (exec, workers) = setup(DispatcherConfig::default());

        let sync = exec.submit(returning(json!(1))).await.unwrap();
        assert_eq!(sync, Submitted::Result(json!(1)));

        let created = returning(json!(2)).with_mode(ExecutionMode::SyncCreated {
            location: Link::new("/consumers/c2/"),
        });
        match exec.submit(created).await.unwrap() {
            Submitted::Created(c) => assert_eq!(c.location.href, "/consumers/c2/"),
            other => panic!("unexpected {other:?}"),
        }

        let handle = exec
            .submit(returning(json!(3)).with_mode(ExecutionMode::Async))
            .await
            .unwrap();
        assert!(matches!(handle, Submitted::Handle(_)));
        workers.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn closed_dispatcher_rejects_every_shape() {
        let (exec, workers) = setup(DispatcherConfig::default());
        exec.dispatcher().close().await;
        assert!(matches!(
            exec.execute(returning(json!(1))).await,
            Err(DispatchError::ShuttingDown)
        ));
        assert!(matches!(
            exec.execute_async(returning(json!(1))).await,
            Err(DispatchError::ShuttingDown)
        ));
        workers.shutdown_and_join().await;
    }
}
