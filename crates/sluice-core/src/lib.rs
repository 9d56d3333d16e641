//! sluice-core
//!
//! Task coordination for operations over named resources: decides whether
//! and when an operation may run, runs it on a bounded worker pool, and
//! reports its outcome.
//!
//! # Modules
//! - **domain**: ids, resource claims, descriptors, task records and states
//! - **reservation**: reservation table + conflict resolution
//! - **dispatch**: dispatcher engine, worker group, archive sweeper, config
//! - **execution**: sync / sync-created / async call shapes
//! - **typed**: typed operations (`Call`, `Handler<C>`)
//! - **catalog**: consumer records, manager ports, request builders
//! - **ports**: clock and id generation
//! - **impls**: in-memory manager implementations

pub mod catalog;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod execution;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod reservation;
pub mod typed;

pub use dispatch::{ArchiveSweeper, Dispatcher, DispatcherConfig, WorkerGroup};
pub use domain::{
    ExecutionMode, Link, Operation, OperationDescriptor, OperationKind, ResourceClaim, ResourceKey,
    TaskId, TaskRecord, TaskState,
};
pub use error::{DispatchError, OperationError, ValidationError};
pub use execution::{Completion, Created, Execution, Submitted, TaskHandle};
pub use observability::TaskCounts;
