use std::time::Duration;

use thiserror::Error;

use crate::domain::{OperationKind, ResourceKey, TaskId, TaskState};

/// A malformed request. Reported synchronously; nothing is queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("descriptor has no operation to run")]
    MissingOperation,

    #[error("conflicting claims on {key}: {first} and {second}")]
    ConflictingClaims {
        key: ResourceKey,
        first: OperationKind,
        second: OperationKind,
    },

    #[error("resource key '{0}' has an empty type or id")]
    EmptyResourceKey(String),

    #[error("weight {weight} exceeds dispatcher capacity {capacity}")]
    WeightExceedsCapacity { weight: u32, capacity: u32 },

    #[error("unknown content action '{0}'")]
    UnknownContentAction(String),

    #[error("malformed task id '{0}'")]
    MalformedTaskId(String),

    #[error("invalid dispatcher config: {0}")]
    InvalidConfig(String),
}

/// Errors surfaced by the dispatcher and the execution facade.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("task {task_id} is already {state}; too late to cancel")]
    TooLate { task_id: TaskId, state: TaskState },

    #[error("task {task_id} was not admitted within {waited:?}")]
    ConflictTimeout { task_id: TaskId, waited: Duration },

    #[error("task {task_id} failed: {message}")]
    Execution { task_id: TaskId, message: String },

    #[error("task {0} was cancelled")]
    Cancelled(TaskId),

    #[error("dispatcher is shutting down")]
    ShuttingDown,
}

/// Error returned by an operation. Captured into the task record; it never
/// escapes the worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("missing resource {resource_type}:{resource_id}")]
    MissingResource {
        resource_type: String,
        resource_id: String,
    },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),
}

impl OperationError {
    pub fn missing(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        OperationError::MissingResource {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        OperationError::Failed(message.into())
    }
}

impl From<serde_json::Error> for OperationError {
    fn from(e: serde_json::Error) -> Self {
        OperationError::InvalidArguments(e.to_string())
    }
}

/// A state change the task state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition for {task_id}: {from} -> {to}")]
pub struct IllegalTransition {
    pub task_id: TaskId,
    pub from: TaskState,
    pub to: TaskState,
}
