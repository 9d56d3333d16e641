//! Records the consumer endpoints work with.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::Link;
use crate::error::ValidationError;

/// A registered consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumer {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
}

impl Consumer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            description: None,
            notes: BTreeMap::new(),
        }
    }

    pub fn link(&self) -> Link {
        Link::child("/v2/consumers", &[&self.id])
    }
}

/// Partial update of a consumer.
///
/// `None` leaves a field alone. In `notes`, a key mapped to `None` removes
/// that note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerDelta {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: BTreeMap<String, Option<String>>,
}

impl ConsumerDelta {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.description.is_none() && self.notes.is_empty()
    }

    /// The consumer with this delta applied. The input is not modified.
    pub fn apply(&self, consumer: &Consumer) -> Consumer {
        let mut notes = consumer.notes.clone();
        for (key, value) in &self.notes {
            match value {
                Some(v) => {
                    notes.insert(key.clone(), v.clone());
                }
                None => {
                    notes.remove(key);
                }
            }
        }
        Consumer {
            id: consumer.id.clone(),
            display_name: self
                .display_name
                .clone()
                .or_else(|| consumer.display_name.clone()),
            description: self
                .description
                .clone()
                .or_else(|| consumer.description.clone()),
            notes,
        }
    }
}

/// Association between a consumer and a repository's distributor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub consumer_id: String,
    pub repo_id: String,
    pub distributor_id: String,
}

impl Binding {
    pub fn new(
        consumer_id: impl Into<String>,
        repo_id: impl Into<String>,
        distributor_id: impl Into<String>,
    ) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            repo_id: repo_id.into(),
            distributor_id: distributor_id.into(),
        }
    }

    pub fn link(&self) -> Link {
        binding_link(&self.consumer_id, &self.repo_id, &self.distributor_id)
    }
}

pub(crate) fn binding_link(consumer_id: &str, repo_id: &str, distributor_id: &str) -> Link {
    Link::child(
        &format!("/v2/consumers/{consumer_id}/bindings"),
        &[repo_id, distributor_id],
    )
}

/// Installed-content profile of one content type on a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub consumer_id: String,
    pub content_type: String,
    pub profile: Value,
}

impl Profile {
    pub fn link(&self) -> Link {
        profile_link(&self.consumer_id, &self.content_type)
    }
}

pub(crate) fn profile_link(consumer_id: &str, content_type: &str) -> Link {
    Link::child(
        &format!("/v2/consumers/{consumer_id}/profiles"),
        &[content_type],
    )
}

/// A content unit addressed by type and key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentUnit {
    pub type_id: String,
    #[serde(default)]
    pub unit_key: Map<String, Value>,
}

impl ContentUnit {
    pub fn new(type_id: impl Into<String>, unit_key: Map<String, Value>) -> Self {
        Self {
            type_id: type_id.into(),
            unit_key,
        }
    }
}

/// Content actions a consumer agent can carry out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentAction {
    Install,
    Update,
    Uninstall,
}

impl ContentAction {
    pub const ALL: [ContentAction; 3] = [
        ContentAction::Install,
        ContentAction::Update,
        ContentAction::Uninstall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentAction::Install => "install",
            ContentAction::Update => "update",
            ContentAction::Uninstall => "uninstall",
        }
    }
}

impl fmt::Display for ContentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownContentAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn consumer() -> Consumer {
        Consumer {
            id: "c1".into(),
            display_name: Some("Web 1".into()),
            description: None,
            notes: BTreeMap::from([
                ("env".to_string(), "prod".to_string()),
                ("rack".to_string(), "b4".to_string()),
            ]),
        }
    }

    #[test]
    fn delta_is_applied_as_a_pure_function() {
        let before = consumer();
        let delta = ConsumerDelta {
            description: Some("front end".into()),
            notes: BTreeMap::from([
                ("env".to_string(), Some("stage".to_string())),
                ("rack".to_string(), None),
            ]),
            ..ConsumerDelta::default()
        };

        let after = delta.apply(&before);
        assert_eq!(after.display_name.as_deref(), Some("Web 1"));
        assert_eq!(after.description.as_deref(), Some("front end"));
        assert_eq!(
            after.notes,
            BTreeMap::from([("env".to_string(), "stage".to_string())])
        );
        // input untouched
        assert_eq!(before, consumer());
    }

    #[test]
    fn empty_delta_changes_nothing() {
        let delta = ConsumerDelta::default();
        assert!(delta.is_empty());
        assert_eq!(delta.apply(&consumer()), consumer());
    }

    #[test]
    fn delta_decodes_with_missing_fields() {
        let delta: ConsumerDelta =
            serde_json::from_str(r#"{"notes": {"rack": null}}"#).unwrap();
        assert_eq!(delta.notes.get("rack"), Some(&None));
        assert!(delta.display_name.is_none());
    }

    #[test]
    fn links_point_under_the_consumer() {
        assert_eq!(consumer().link().href, "/v2/consumers/c1/");
        assert_eq!(
            Binding::new("c1", "repo-1", "yum").link().href,
            "/v2/consumers/c1/bindings/repo-1/yum/"
        );
        let profile = Profile {
            consumer_id: "c1".into(),
            content_type: "rpm".into(),
            profile: Value::Null,
        };
        assert_eq!(profile.link().href, "/v2/consumers/c1/profiles/rpm/");
    }

    #[rstest]
    #[case("install", ContentAction::Install)]
    #[case("update", ContentAction::Update)]
    #[case("uninstall", ContentAction::Uninstall)]
    fn known_actions_parse(#[case] text: &str, #[case] expected: ContentAction) {
        assert_eq!(text.parse::<ContentAction>().unwrap(), expected);
        assert_eq!(expected.to_string(), text);
    }

    #[rstest]
    #[case("reboot")]
    #[case("Install")]
    #[case("")]
    fn unknown_actions_are_rejected(#[case] text: &str) {
        assert_eq!(
            text.parse::<ContentAction>(),
            Err(ValidationError::UnknownContentAction(text.to_string()))
        );
    }
}
