//! InMemoryCatalog - manager ports backed by in-process maps
//!
//! For tests and the demo binary. Every manager port is implemented on the
//! same struct so bind and profile calls can check that the consumer exists.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::catalog::{
    AgentManager, BindManager, Binding, Consumer, ConsumerDelta, ConsumerManager, ContentAction,
    ContentUnit, Managers, Profile, ProfileManager,
};
use crate::domain::types::CONSUMER;
use crate::error::OperationError;

#[derive(Default)]
struct CatalogState {
    consumers: BTreeMap<String, Consumer>,
    bindings: BTreeSet<(String, String, String)>,
    profiles: HashMap<(String, String), Profile>,
    /// Content action requests the agent received, in order.
    agent_log: Vec<(ContentAction, String, usize)>,
}

impl CatalogState {
    fn require_consumer(&self, consumer_id: &str) -> Result<(), OperationError> {
        if self.consumers.contains_key(consumer_id) {
            Ok(())
        } else {
            Err(OperationError::missing(CONSUMER, consumer_id))
        }
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// This catalog as every manager port.
    pub fn managers(self: &Arc<Self>) -> Managers {
        Managers {
            consumers: self.clone(),
            binds: self.clone(),
            profiles: self.clone(),
            agent: self.clone(),
        }
    }

    pub async fn consumer(&self, consumer_id: &str) -> Option<Consumer> {
        self.state.lock().await.consumers.get(consumer_id).cloned()
    }

    pub async fn bindings_of(&self, consumer_id: &str) -> Vec<Binding> {
        self.state
            .lock()
            .await
            .bindings
            .iter()
            .filter(|(c, _, _)| c == consumer_id)
            .map(|(c, r, d)| Binding::new(c, r, d))
            .collect()
    }

    pub async fn agent_log(&self) -> Vec<(ContentAction, String, usize)> {
        self.state.lock().await.agent_log.clone()
    }

    async fn content(
        &self,
        action: ContentAction,
        consumer_id: &str,
        units: Vec<ContentUnit>,
        options: Value,
    ) -> Result<Value, OperationError> {
        let mut state = self.state.lock().await;
        state.require_consumer(consumer_id)?;
        state
            .agent_log
            .push((action, consumer_id.to_string(), units.len()));
        Ok(json!({
            "action": action,
            "consumer_id": consumer_id,
            "units": units.len(),
            "options": options,
            "succeeded": true,
        }))
    }
}

#[async_trait]
impl ConsumerManager for InMemoryCatalog {
    async fn register(&self, consumer: Consumer) -> Result<Consumer, OperationError> {
        let mut state = self.state.lock().await;
        if state.consumers.contains_key(&consumer.id) {
            return Err(OperationError::failed(format!(
                "consumer {} already exists",
                consumer.id
            )));
        }
        state.consumers.insert(consumer.id.clone(), consumer.clone());
        Ok(consumer)
    }

    async fn unregister(&self, consumer_id: &str) -> Result<(), OperationError> {
        let mut state = self.state.lock().await;
        state
            .consumers
            .remove(consumer_id)
            .ok_or_else(|| OperationError::missing(CONSUMER, consumer_id))?;
        state.bindings.retain(|(c, _, _)| c != consumer_id);
        state.profiles.retain(|(c, _), _| c != consumer_id);
        Ok(())
    }

    async fn update(
        &self,
        consumer_id: &str,
        delta: ConsumerDelta,
    ) -> Result<Consumer, OperationError> {
        let mut state = self.state.lock().await;
        let current = state
            .consumers
            .get(consumer_id)
            .ok_or_else(|| OperationError::missing(CONSUMER, consumer_id))?;
        let updated = delta.apply(current);
        state
            .consumers
            .insert(consumer_id.to_string(), updated.clone());
        Ok(updated)
    }
}

#[async_trait]
impl BindManager for InMemoryCatalog {
    async fn bind(
        &self,
        consumer_id: &str,
        repo_id: &str,
        distributor_id: &str,
    ) -> Result<Binding, OperationError> {
        let mut state = self.state.lock().await;
        state.require_consumer(consumer_id)?;
        // already bound is fine
        state.bindings.insert((
            consumer_id.to_string(),
            repo_id.to_string(),
            distributor_id.to_string(),
        ));
        Ok(Binding::new(consumer_id, repo_id, distributor_id))
    }

    async fn unbind(
        &self,
        consumer_id: &str,
        repo_id: &str,
        distributor_id: &str,
    ) -> Result<Option<Binding>, OperationError> {
        let mut state = self.state.lock().await;
        let key = (
            consumer_id.to_string(),
            repo_id.to_string(),
            distributor_id.to_string(),
        );
        Ok(state
            .bindings
            .remove(&key)
            .then(|| Binding::new(consumer_id, repo_id, distributor_id)))
    }
}

#[async_trait]
impl ProfileManager for InMemoryCatalog {
    async fn create(
        &self,
        consumer_id: &str,
        content_type: &str,
        profile: Value,
    ) -> Result<Profile, OperationError> {
        let mut state = self.state.lock().await;
        state.require_consumer(consumer_id)?;
        let profile = Profile {
            consumer_id: consumer_id.to_string(),
            content_type: content_type.to_string(),
            profile,
        };
        state.profiles.insert(
            (consumer_id.to_string(), content_type.to_string()),
            profile.clone(),
        );
        Ok(profile)
    }

    async fn update(
        &self,
        consumer_id: &str,
        content_type: &str,
        profile: Value,
    ) -> Result<Profile, OperationError> {
        let mut state = self.state.lock().await;
        let key = (consumer_id.to_string(), content_type.to_string());
        let entry = state
            .profiles
            .get_mut(&key)
            .ok_or_else(|| OperationError::missing("profile", format!("{consumer_id}/{content_type}")))?;
        entry.profile = profile;
        Ok(entry.clone())
    }

    async fn delete(
        &self,
        consumer_id: &str,
        content_type: &str,
    ) -> Result<Option<Profile>, OperationError> {
        let mut state = self.state.lock().await;
        Ok(state
            .profiles
            .remove(&(consumer_id.to_string(), content_type.to_string())))
    }
}

#[async_trait]
impl AgentManager for InMemoryCatalog {
    async fn install_content(
        &self,
        consumer_id: &str,
        units: Vec<ContentUnit>,
        options: Value,
    ) -> Result<Value, OperationError> {
        self.content(ContentAction::Install, consumer_id, units, options)
            .await
    }

    async fn update_content(
        &self,
        consumer_id: &str,
        units: Vec<ContentUnit>,
        options: Value,
    ) -> Result<Value, OperationError> {
        self.content(ContentAction::Update, consumer_id, units, options)
            .await
    }

    async fn uninstall_content(
        &self,
        consumer_id: &str,
        units: Vec<ContentUnit>,
        options: Value,
    ) -> Result<Value, OperationError> {
        self.content(ContentAction::Uninstall, consumer_id, units, options)
            .await
    }
}
