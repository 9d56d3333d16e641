//! Scheduling: admission, the worker pool, and record retention.

mod archive;
pub mod config;
mod dispatcher;
mod sweeper;
mod worker;

pub use config::{ArchivePolicy, DispatcherConfig, TaskWeights};
pub use dispatcher::Dispatcher;
pub use sweeper::ArchiveSweeper;
pub use worker::WorkerGroup;
