//! Typed calls behind each consumer request, and the handlers that forward
//! them to the manager ports.
//!
//! Argument order on the wire is the field order of each record.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::managers::{AgentManager, BindManager, ConsumerManager, ProfileManager};
use super::{Consumer, ConsumerDelta, ContentAction, ContentUnit};
use crate::error::OperationError;
use crate::typed::{Call, Handler};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterConsumer {
    pub id: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub notes: Option<std::collections::BTreeMap<String, String>>,
}

impl Call for RegisterConsumer {
    const NAME: &'static str = "consumer.register";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterConsumer {
    pub id: String,
}

impl Call for UnregisterConsumer {
    const NAME: &'static str = "consumer.unregister";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConsumer {
    pub id: String,
    pub delta: ConsumerDelta,
}

impl Call for UpdateConsumer {
    const NAME: &'static str = "consumer.update";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindCall {
    pub consumer_id: String,
    pub repo_id: String,
    pub distributor_id: String,
}

impl Call for BindCall {
    const NAME: &'static str = "consumer.bind";
}

/// Same arguments as a bind; a separate record so the two stay distinct
/// operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnbindCall {
    pub consumer_id: String,
    pub repo_id: String,
    pub distributor_id: String,
}

impl Call for UnbindCall {
    const NAME: &'static str = "consumer.unbind";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCall {
    pub consumer_id: String,
    #[serde(default)]
    pub units: Vec<ContentUnit>,
    #[serde(default)]
    pub options: Value,
}

impl Call for ContentCall {
    const NAME: &'static str = "consumer.content";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCall {
    pub consumer_id: String,
    pub content_type: String,
    pub profile: Value,
}

impl Call for ProfileCall {
    const NAME: &'static str = "consumer.profile";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteProfile {
    pub consumer_id: String,
    pub content_type: String,
}

impl Call for DeleteProfile {
    const NAME: &'static str = "consumer.profile.delete";
}

pub(crate) struct RegisterHandler(pub Arc<dyn ConsumerManager>);

#[async_trait]
impl Handler<RegisterConsumer> for RegisterHandler {
    async fn handle(&self, call: RegisterConsumer) -> Result<Value, OperationError> {
        let consumer = Consumer {
            id: call.id,
            display_name: call.display_name,
            description: call.description,
            notes: call.notes.unwrap_or_default(),
        };
        let registered = self.0.register(consumer).await?;
        Ok(serde_json::to_value(registered)?)
    }
}

pub(crate) struct UnregisterHandler(pub Arc<dyn ConsumerManager>);

#[async_trait]
impl Handler<UnregisterConsumer> for UnregisterHandler {
    async fn handle(&self, call: UnregisterConsumer) -> Result<Value, OperationError> {
        self.0.unregister(&call.id).await?;
        Ok(Value::Null)
    }
}

pub(crate) struct UpdateHandler(pub Arc<dyn ConsumerManager>);

#[async_trait]
impl Handler<UpdateConsumer> for UpdateHandler {
    async fn handle(&self, call: UpdateConsumer) -> Result<Value, OperationError> {
        let updated = self.0.update(&call.id, call.delta).await?;
        Ok(serde_json::to_value(updated)?)
    }
}

pub(crate) struct BindHandler(pub Arc<dyn BindManager>);

#[async_trait]
impl Handler<BindCall> for BindHandler {
    async fn handle(&self, call: BindCall) -> Result<Value, OperationError> {
        let binding = self
            .0
            .bind(&call.consumer_id, &call.repo_id, &call.distributor_id)
            .await?;
        Ok(serde_json::to_value(binding)?)
    }
}

pub(crate) struct UnbindHandler(pub Arc<dyn BindManager>);

#[async_trait]
impl Handler<UnbindCall> for UnbindHandler {
    async fn handle(&self, call: UnbindCall) -> Result<Value, OperationError> {
        let removed = self
            .0
            .unbind(&call.consumer_id, &call.repo_id, &call.distributor_id)
            .await?;
        Ok(serde_json::to_value(removed)?)
    }
}

/// One handler per content action; the action picks the agent method.
pub(crate) struct ContentHandler {
    pub agent: Arc<dyn AgentManager>,
    pub action: ContentAction,
}

#[async_trait]
impl Handler<ContentCall> for ContentHandler {
    async fn handle(&self, call: ContentCall) -> Result<Value, OperationError> {
        let ContentCall {
            consumer_id,
            units,
            options,
        } = call;
        match self.action {
            ContentAction::Install => self.agent.install_content(&consumer_id, units, options).await,
            ContentAction::Update => self.agent.update_content(&consumer_id, units, options).await,
            ContentAction::Uninstall => {
                self.agent
                    .uninstall_content(&consumer_id, units, options)
                    .await
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ProfileWrite {
    Create,
    Update,
}

pub(crate) struct ProfileHandler {
    pub profiles: Arc<dyn ProfileManager>,
    pub write: ProfileWrite,
}

#[async_trait]
impl Handler<ProfileCall> for ProfileHandler {
    async fn handle(&self, call: ProfileCall) -> Result<Value, OperationError> {
        let profile = match self.write {
            ProfileWrite::Create => {
                self.profiles
                    .create(&call.consumer_id, &call.content_type, call.profile)
                    .await?
            }
            ProfileWrite::Update => {
                self.profiles
                    .update(&call.consumer_id, &call.content_type, call.profile)
                    .await?
            }
        };
        Ok(serde_json::to_value(profile)?)
    }
}

pub(crate) struct DeleteProfileHandler(pub Arc<dyn ProfileManager>);

#[async_trait]
impl Handler<DeleteProfile> for DeleteProfileHandler {
    async fn handle(&self, call: DeleteProfile) -> Result<Value, OperationError> {
        let removed = self.0.delete(&call.consumer_id, &call.content_type).await?;
        Ok(serde_json::to_value(removed)?)
    }
}
