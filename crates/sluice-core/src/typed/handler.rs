//! Handler trait - typed operations and their type erasure.
//!
//! - `Handler<C>`: generic over the call record, checked at compile time
//! - `TypedOperation<C, H>`: erases a handler into `dyn Operation` so it can
//!   ride in an `OperationDescriptor`

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::Call;
use crate::domain::Operation;
use crate::error::OperationError;

/// Runs one kind of call.
///
/// # Example
/// ```ignore
/// struct UnbindHandler(Arc<dyn BindManager>);
///
/// #[async_trait]
/// impl Handler<Unbind> for UnbindHandler {
///     async fn handle(&self, call: Unbind) -> Result<Value, OperationError> {
///         let removed = self.0.unbind(&call.consumer_id, &call.repo_id, &call.distributor_id).await?;
///         Ok(serde_json::to_value(removed)?)
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<C: Call>: Send + Sync {
    async fn handle(&self, call: C) -> Result<Value, OperationError>;
}

pub struct TypedOperation<C: Call, H: Handler<C>> {
    handler: H,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Call, H: Handler<C>> TypedOperation<C, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<C: Call, H: Handler<C>> Operation for TypedOperation<C, H> {
    fn name(&self) -> &str {
        C::NAME
    }

    async fn invoke(&self, args: Vec<Value>) -> Result<Value, OperationError> {
        let call = C::from_args(args)?;
        self.handler.handle(call).await
    }
}

/// Erase `handler` into a shareable operation.
pub fn typed<C, H>(handler: H) -> Arc<dyn Operation>
where
    C: Call,
    H: Handler<C> + 'static,
{
    Arc::new(TypedOperation::<C, H>::new(handler))
}
