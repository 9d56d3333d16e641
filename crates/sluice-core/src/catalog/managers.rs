//! Manager ports.
//!
//! The business logic behind each consumer endpoint. Implementations are
//! handed to [`ConsumerRequests`](super::ConsumerRequests) at construction;
//! nothing is looked up globally.
//!
//! Bind/unbind and profile delete must be idempotent: repeating them against
//! a target already in the desired state succeeds.

use async_trait::async_trait;
use serde_json::Value;

use super::{Binding, Consumer, ConsumerDelta, ContentUnit, Profile};
use crate::error::OperationError;

#[async_trait]
pub trait ConsumerManager: Send + Sync {
    async fn register(&self, consumer: Consumer) -> Result<Consumer, OperationError>;

    async fn unregister(&self, consumer_id: &str) -> Result<(), OperationError>;

    async fn update(
        &self,
        consumer_id: &str,
        delta: ConsumerDelta,
    ) -> Result<Consumer, OperationError>;
}

#[async_trait]
pub trait BindManager: Send + Sync {
    async fn bind(
        &self,
        consumer_id: &str,
        repo_id: &str,
        distributor_id: &str,
    ) -> Result<Binding, OperationError>;

    /// Returns the removed binding, or `None` if there was none.
    async fn unbind(
        &self,
        consumer_id: &str,
        repo_id: &str,
        distributor_id: &str,
    ) -> Result<Option<Binding>, OperationError>;
}

#[async_trait]
pub trait ProfileManager: Send + Sync {
    async fn create(
        &self,
        consumer_id: &str,
        content_type: &str,
        profile: Value,
    ) -> Result<Profile, OperationError>;

    async fn update(
        &self,
        consumer_id: &str,
        content_type: &str,
        profile: Value,
    ) -> Result<Profile, OperationError>;

    /// Returns the removed profile, or `None` if there was none.
    async fn delete(
        &self,
        consumer_id: &str,
        content_type: &str,
    ) -> Result<Option<Profile>, OperationError>;
}

/// Talks to the agent running on a consumer.
#[async_trait]
pub trait AgentManager: Send + Sync {
    async fn install_content(
        &self,
        consumer_id: &str,
        units: Vec<ContentUnit>,
        options: Value,
    ) -> Result<Value, OperationError>;

    async fn update_content(
        &self,
        consumer_id: &str,
        units: Vec<ContentUnit>,
        options: Value,
    ) -> Result<Value, OperationError>;

    async fn uninstall_content(
        &self,
        consumer_id: &str,
        units: Vec<ContentUnit>,
        options: Value,
    ) -> Result<Value, OperationError>;
}
