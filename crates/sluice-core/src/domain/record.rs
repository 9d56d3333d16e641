//! Task record: lifecycle state, timestamps, and outcome of one submission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ExecutionMode, ResourceClaim, TaskId, TaskState};
use crate::error::IllegalTransition;

/// Metadata + outcome of a submitted task.
///
/// Design:
/// - Owned by the dispatcher; callers only ever see clones (snapshots).
/// - All state transitions go through the methods below, which refuse
///   anything `TaskState::can_transition_to` does not allow.
/// - `result` and `error` are only set on reaching a terminal state and never
///   both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    state: TaskState,

    /// Name of the operation, for observability.
    pub operation: String,
    pub claims: Vec<ResourceClaim>,
    pub weight: u32,
    pub tags: Vec<String>,
    pub mode: ExecutionMode,
    pub durable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,

    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TaskId,
        operation: impl Into<String>,
        claims: Vec<ResourceClaim>,
        weight: u32,
        tags: Vec<String>,
        mode: ExecutionMode,
        durable: bool,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            state: TaskState::Waiting,
            operation: operation.into(),
            claims,
            weight,
            tags,
            mode,
            durable,
            result: None,
            error: None,
            submitted_at,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Waiting -> Running.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.transition(TaskState::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    /// Running -> Succeeded.
    pub fn succeed(&mut self, result: Value, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.transition(TaskState::Succeeded)?;
        self.result = Some(result);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Running -> Failed.
    pub fn fail(&mut self, error: String, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.transition(TaskState::Failed)?;
        self.error = Some(error);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Waiting -> Cancelled.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), IllegalTransition> {
        self.transition(TaskState::Cancelled)?;
        self.completed_at = Some(now);
        Ok(())
    }

    fn transition(&mut self, next: TaskState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                task_id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types;
    use chrono::Duration;
    use serde_json::json;
    use ulid::Ulid;

    fn record() -> TaskRecord {
        TaskRecord::new(
            TaskId::from_ulid(Ulid::new()),
            "op",
            vec![ResourceClaim::read(types::CONSUMER, "c1")],
            0,
            vec!["pulp:consumer:c1".into()],
            ExecutionMode::Sync,
            false,
            Utc::now(),
        )
    }

    #[test]
    fn new_record_is_waiting_without_outcome() {
        let r = record();
        assert_eq!(r.state(), TaskState::Waiting);
        assert!(r.result().is_none() && r.error().is_none());
        assert!(r.started_at.is_none() && r.completed_at.is_none());
        assert!(r.has_tag("pulp:consumer:c1"));
    }

    #[test]
    fn success_path_sets_result_and_timestamps() {
        let mut r = record();
        let t0 = r.submitted_at;
        r.start(t0 + Duration::milliseconds(5)).unwrap();
        r.succeed(json!({"ok": true}), t0 + Duration::milliseconds(9))
            .unwrap();

        assert_eq!(r.state(), TaskState::Succeeded);
        assert_eq!(r.result(), Some(&json!({"ok": true})));
        assert!(r.error().is_none());
        assert!(r.started_at.unwrap() < r.completed_at.unwrap());
    }

    #[test]
    fn failure_sets_error_only() {
        let mut r = record();
        r.start(Utc::now()).unwrap();
        r.fail("boom".into(), Utc::now()).unwrap();
        assert_eq!(r.error(), Some("boom"));
        assert!(r.result().is_none());
    }

    #[test]
    fn running_task_cannot_be_cancelled() {
        let mut r = record();
        r.start(Utc::now()).unwrap();
        let err = r.cancel(Utc::now()).unwrap_err();
        assert_eq!(err.from, TaskState::Running);
        assert_eq!(r.state(), TaskState::Running);
    }

    #[test]
    fn terminal_state_is_final() {
        let mut r = record();
        r.cancel(Utc::now()).unwrap();
        assert!(r.start(Utc::now()).is_err());
        assert!(r.succeed(json!(1), Utc::now()).is_err());
        assert_eq!(r.state(), TaskState::Cancelled);
        assert!(r.result().is_none());
    }
}
