//! Descriptor builders for the consumer endpoints.
//!
//! Each method decides the claims, weight, execution mode and tags of one
//! request; the manager that does the work is injected at construction.

use std::sync::Arc;

use serde_json::{Value, json};

use super::calls::{
    BindCall, BindHandler, ContentCall, ContentHandler, DeleteProfile, DeleteProfileHandler,
    ProfileCall, ProfileHandler, ProfileWrite, RegisterConsumer, RegisterHandler,
    UnbindCall, UnbindHandler, UnregisterConsumer, UnregisterHandler, UpdateConsumer,
    UpdateHandler,
};
use super::entities::{binding_link, profile_link};
use super::managers::{AgentManager, BindManager, ConsumerManager, ProfileManager};
use super::tags::{action_tag, resource_tag};
use super::{Consumer, ConsumerDelta, ContentAction, ContentUnit};
use crate::dispatch::TaskWeights;
use crate::domain::types::{CONSUMER, REPOSITORY, REPOSITORY_DISTRIBUTOR};
use crate::domain::{ExecutionMode, OperationDescriptor, ResourceClaim};
use crate::error::ValidationError;
use crate::typed::typed;

/// The managers behind the consumer endpoints.
#[derive(Clone)]
pub struct Managers {
    pub consumers: Arc<dyn ConsumerManager>,
    pub binds: Arc<dyn BindManager>,
    pub profiles: Arc<dyn ProfileManager>,
    pub agent: Arc<dyn AgentManager>,
}

/// Builds one descriptor per consumer request.
#[derive(Clone)]
pub struct ConsumerRequests {
    managers: Managers,
    weights: TaskWeights,
}

impl ConsumerRequests {
    pub fn new(managers: Managers, weights: TaskWeights) -> Self {
        Self { managers, weights }
    }

    /// Register a consumer. Answers with the consumer and its location.
    pub fn register(&self, consumer: Consumer) -> Result<OperationDescriptor, ValidationError> {
        let location = consumer.link();
        let Consumer {
            id,
            display_name,
            description,
            notes,
        } = consumer;
        OperationDescriptor::builder()
            .operation(typed::<RegisterConsumer, _>(RegisterHandler(
                self.managers.consumers.clone(),
            )))
            .args([json!(id), json!(display_name), json!(description), json!(notes)])
            .claim(ResourceClaim::create(CONSUMER, &id))
            .weight(self.weights.create)
            .tags([resource_tag(CONSUMER, &id), action_tag("create")])
            .mode(ExecutionMode::SyncCreated { location })
            .build()
    }

    pub fn unregister(&self, consumer_id: &str) -> Result<OperationDescriptor, ValidationError> {
        OperationDescriptor::builder()
            .operation(typed::<UnregisterConsumer, _>(UnregisterHandler(
                self.managers.consumers.clone(),
            )))
            .arg(json!(consumer_id))
            .claim(ResourceClaim::delete(CONSUMER, consumer_id))
            .weight(self.weights.default_weight)
            .tags([resource_tag(CONSUMER, consumer_id), action_tag("delete")])
            .mode(ExecutionMode::Sync)
            .build()
    }

    pub fn update(
        &self,
        consumer_id: &str,
        delta: ConsumerDelta,
    ) -> Result<OperationDescriptor, ValidationError> {
        OperationDescriptor::builder()
            .operation(typed::<UpdateConsumer, _>(UpdateHandler(
                self.managers.consumers.clone(),
            )))
            .args([json!(consumer_id), json!(delta)])
            .claim(ResourceClaim::update(CONSUMER, consumer_id))
            .weight(self.weights.default_weight)
            .tags([resource_tag(CONSUMER, consumer_id), action_tag("update")])
            .mode(ExecutionMode::Sync)
            .build()
    }

    /// Bind a consumer to a repository distributor. Reads all three
    /// resources; nothing else is locked out.
    pub fn bind(
        &self,
        consumer_id: &str,
        repo_id: &str,
        distributor_id: &str,
    ) -> Result<OperationDescriptor, ValidationError> {
        OperationDescriptor::builder()
            .operation(typed::<BindCall, _>(BindHandler(self.managers.binds.clone())))
            .args([json!(consumer_id), json!(repo_id), json!(distributor_id)])
            .claims(binding_claims(consumer_id, repo_id, distributor_id))
            .weight(0)
            .tags(binding_tags(consumer_id, repo_id, distributor_id, "bind"))
            .mode(ExecutionMode::SyncCreated {
                location: binding_link(consumer_id, repo_id, distributor_id),
            })
            .build()
    }

    pub fn unbind(
        &self,
        consumer_id: &str,
        repo_id: &str,
        distributor_id: &str,
    ) -> Result<OperationDescriptor, ValidationError> {
        OperationDescriptor::builder()
            .operation(typed::<UnbindCall, _>(UnbindHandler(self.managers.binds.clone())))
            .args([json!(consumer_id), json!(repo_id), json!(distributor_id)])
            .claims(binding_claims(consumer_id, repo_id, distributor_id))
            .weight(self.weights.default_weight)
            .tags(binding_tags(consumer_id, repo_id, distributor_id, "unbind"))
            .mode(ExecutionMode::Sync)
            .build()
    }

    /// Content action on a consumer's agent, by name. Unknown names are
    /// rejected before anything is built.
    ///
    /// The result is archived so it can be fetched after completion.
    pub fn content(
        &self,
        consumer_id: &str,
        action: &str,
        units: Vec<ContentUnit>,
        options: Value,
    ) -> Result<OperationDescriptor, ValidationError> {
        let action: ContentAction = action.parse()?;
        OperationDescriptor::builder()
            .operation(typed::<ContentCall, _>(ContentHandler {
                agent: self.managers.agent.clone(),
                action,
            }))
            .args([json!(consumer_id), json!(units), options])
            .claim(ResourceClaim::read(CONSUMER, consumer_id))
            .weight(0)
            .tags([resource_tag(CONSUMER, consumer_id), action_tag(action.as_str())])
            .mode(ExecutionMode::Async)
            .durable(true)
            .build()
    }

    pub fn create_profile(
        &self,
        consumer_id: &str,
        content_type: &str,
        profile: Value,
    ) -> Result<OperationDescriptor, ValidationError> {
        self.write_profile(consumer_id, content_type, profile, ProfileWrite::Create)
    }

    pub fn update_profile(
        &self,
        consumer_id: &str,
        content_type: &str,
        profile: Value,
    ) -> Result<OperationDescriptor, ValidationError> {
        self.write_profile(consumer_id, content_type, profile, ProfileWrite::Update)
    }

    pub fn delete_profile(
        &self,
        consumer_id: &str,
        content_type: &str,
    ) -> Result<OperationDescriptor, ValidationError> {
        OperationDescriptor::builder()
            .operation(typed::<DeleteProfile, _>(DeleteProfileHandler(
                self.managers.profiles.clone(),
            )))
            .args([json!(consumer_id), json!(content_type)])
            .claim(ResourceClaim::read(CONSUMER, consumer_id))
            .weight(self.weights.default_weight)
            .tag(resource_tag(CONSUMER, consumer_id))
            .mode(ExecutionMode::Sync)
            .build()
    }

    fn write_profile(
        &self,
        consumer_id: &str,
        content_type: &str,
        profile: Value,
        write: ProfileWrite,
    ) -> Result<OperationDescriptor, ValidationError> {
        let action = match write {
            ProfileWrite::Create => "create_profile",
            ProfileWrite::Update => "update_profile",
        };
        OperationDescriptor::builder()
            .operation(typed::<ProfileCall, _>(ProfileHandler {
                profiles: self.managers.profiles.clone(),
                write,
            }))
            .args([json!(consumer_id), json!(content_type), profile])
            .claim(ResourceClaim::read(CONSUMER, consumer_id))
            .weight(0)
            .tags([resource_tag(CONSUMER, consumer_id), action_tag(action)])
            .mode(ExecutionMode::SyncCreated {
                location: profile_link(consumer_id, content_type),
            })
            .build()
    }
}

fn binding_claims(consumer_id: &str, repo_id: &str, distributor_id: &str) -> [ResourceClaim; 3] {
    [
        ResourceClaim::read(CONSUMER, consumer_id),
        ResourceClaim::read(REPOSITORY, repo_id),
        ResourceClaim::read(REPOSITORY_DISTRIBUTOR, distributor_id),
    ]
}

fn binding_tags(consumer_id: &str, repo_id: &str, distributor_id: &str, action: &str) -> [String; 4] {
    [
        resource_tag(CONSUMER, consumer_id),
        resource_tag(REPOSITORY, repo_id),
        resource_tag(REPOSITORY_DISTRIBUTOR, distributor_id),
        action_tag(action),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Link, OperationKind};
    use crate::impls::InMemoryCatalog;

    fn requests() -> ConsumerRequests {
        let catalog = Arc::new(InMemoryCatalog::default());
        ConsumerRequests::new(
            catalog.managers(),
            TaskWeights {
                create: 3,
                default_weight: 1,
            },
        )
    }

    fn kinds(d: &OperationDescriptor) -> Vec<(String, OperationKind)> {
        d.claims()
            .iter()
            .map(|c| (c.key.to_string(), c.kind))
            .collect()
    }

    #[test]
    fn register_creates_with_configured_weight_and_location() {
        let d = requests().register(Consumer::new("c1")).unwrap();
        assert_eq!(kinds(&d), vec![("consumer:c1".to_string(), OperationKind::Create)]);
        assert_eq!(d.weight(), 3);
        assert_eq!(
            d.mode(),
            &ExecutionMode::SyncCreated {
                location: Link::new("/v2/consumers/c1/")
            }
        );
        assert_eq!(d.tags(), &["pulp:consumer:c1", "pulp:action:create"]);
        assert_eq!(d.operation().name(), "consumer.register");
        assert_eq!(d.args().len(), 4);
    }

    #[test]
    fn unregister_and_update_are_exclusive_sync_calls() {
        let r = requests();
        let unregister = r.unregister("c1").unwrap();
        assert_eq!(kinds(&unregister), vec![("consumer:c1".to_string(), OperationKind::Delete)]);
        assert_eq!(unregister.mode(), &ExecutionMode::Sync);
        assert_eq!(unregister.weight(), 1);

        let update = r.update("c1", ConsumerDelta::default()).unwrap();
        assert_eq!(kinds(&update), vec![("consumer:c1".to_string(), OperationKind::Update)]);
        assert!(update.tags().contains(&"pulp:action:update".to_string()));
    }

    #[test]
    fn bind_reads_three_resources_at_zero_weight() {
        let d = requests().bind("c1", "repo-1", "yum").unwrap();
        assert_eq!(
            kinds(&d),
            vec![
                ("consumer:c1".to_string(), OperationKind::Read),
                ("repository:repo-1".to_string(), OperationKind::Read),
                ("repository_distributor:yum".to_string(), OperationKind::Read),
            ]
        );
        assert_eq!(d.weight(), 0);
        assert_eq!(
            d.mode(),
            &ExecutionMode::SyncCreated {
                location: Link::new("/v2/consumers/c1/bindings/repo-1/yum/")
            }
        );
    }

    #[test]
    fn unbind_uses_default_weight_and_tags_every_resource() {
        let d = requests().unbind("c1", "repo-1", "yum").unwrap();
        assert_eq!(d.weight(), 1);
        assert_eq!(d.mode(), &ExecutionMode::Sync);
        assert_eq!(
            d.tags(),
            &[
                "pulp:consumer:c1",
                "pulp:repository:repo-1",
                "pulp:repository_distributor:yum",
                "pulp:action:unbind",
            ]
        );
    }

    #[test]
    fn content_actions_are_async_and_archived() {
        let d = requests()
            .content("c1", "install", vec![], Value::Null)
            .unwrap();
        assert_eq!(d.mode(), &ExecutionMode::Async);
        assert!(d.durable());
        assert_eq!(d.weight(), 0);
        assert_eq!(d.tags(), &["pulp:consumer:c1", "pulp:action:install"]);
    }

    #[test]
    fn unknown_content_action_is_a_validation_error() {
        let err = requests()
            .content("c1", "reboot", vec![], Value::Null)
            .unwrap_err();
        assert_eq!(err, ValidationError::UnknownContentAction("reboot".into()));
    }

    #[test]
    fn profile_writes_are_created_under_the_consumer() {
        let r = requests();
        let create = r.create_profile("c1", "rpm", json!({"zsh": "5.9"})).unwrap();
        assert_eq!(
            create.mode(),
            &ExecutionMode::SyncCreated {
                location: Link::new("/v2/consumers/c1/profiles/rpm/")
            }
        );
        assert_eq!(create.weight(), 0);

        let delete = r.delete_profile("c1", "rpm").unwrap();
        assert_eq!(delete.mode(), &ExecutionMode::Sync);
        assert_eq!(delete.weight(), 1);
        assert_eq!(delete.tags(), &["pulp:consumer:c1"]);
    }

    #[test]
    fn empty_consumer_id_is_rejected() {
        let err = requests().unregister("").unwrap_err();
        assert!(matches!(err, ValidationError::EmptyResourceKey(_)));
    }
}
