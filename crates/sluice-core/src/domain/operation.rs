//! The unit of work a descriptor carries.
//!
//! The dispatcher never looks inside an operation. It only decides when it is
//! safe to call it and records what came back.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::OperationError;

/// A callable invoked with the descriptor's ordered arguments.
///
/// Lifecycle operations (bind/unbind, profile delete, ...) are expected to be
/// idempotent: invoking them when the target is already in the desired state
/// should return `Ok` rather than fail.
#[async_trait]
pub trait Operation: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn invoke(&self, args: Vec<Value>) -> Result<Value, OperationError>;
}

/// Operation backed by a closure.
pub struct FnOperation<F, Fut> {
    name: String,
    f: F,
    _fut: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> Operation for FnOperation<F, Fut>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, OperationError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, args: Vec<Value>) -> Result<Value, OperationError> {
        (self.f)(args).await
    }
}

/// Wrap a closure as a shareable operation.
///
/// ```ignore
/// let op = operation_fn("echo", |args| async move { Ok(Value::Array(args)) });
/// ```
pub fn operation_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn Operation>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, OperationError>> + Send + 'static,
{
    Arc::new(FnOperation {
        name: name.into(),
        f,
        _fut: PhantomData,
    })
}
