//! Domain model: ids, resources and claims, descriptors, task records.

pub mod descriptor;
pub mod ids;
pub mod link;
pub mod operation;
pub mod record;
pub mod resource;
pub mod state;

pub use descriptor::{DescriptorBuilder, ExecutionMode, OperationDescriptor};
pub use ids::TaskId;
pub use link::Link;
pub use operation::{FnOperation, Operation, operation_fn};
pub use record::TaskRecord;
pub use resource::{OperationKind, ResourceClaim, ResourceKey, types};
pub use state::TaskState;
