//! Resource identity and the claim vocabulary.
//!
//! Resource types are defined by the surrounding system ("consumer",
//! "repository", "repository_distributor", ...). The dispatcher treats them as
//! uninterpreted identity components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Resource type names used by the consumer catalog.
pub mod types {
    pub const CONSUMER: &str = "consumer";
    pub const REPOSITORY: &str = "repository";
    pub const REPOSITORY_DISTRIBUTOR: &str = "repository_distributor";
}

/// Canonical identity of a contended resource: `(resource_type, resource_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    resource_type: String,
    resource_id: String,
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource_id)
    }
}

/// What an operation intends to do to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Delete,
}

impl OperationKind {
    /// Can a claim of kind `requested` be granted while `self` is held on the
    /// same key?
    ///
    /// ```text
    /// held \ requested | READ | CREATE | UPDATE | DELETE
    /// READ             |  ok  |   ok   |   --   |   --
    /// CREATE           |  ok  |   --   |   --   |   --
    /// UPDATE / DELETE  |  --  |   --   |   --   |   --
    /// ```
    ///
    /// The matrix is symmetric, so the argument order does not matter.
    pub fn is_compatible_with(self, requested: OperationKind) -> bool {
        use OperationKind::*;
        matches!(
            (self, requested),
            (Read, Read) | (Read, Create) | (Create, Read)
        )
    }

    pub fn conflicts_with(self, requested: OperationKind) -> bool {
        !self.is_compatible_with(requested)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Read => "READ",
            OperationKind::Create => "CREATE",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a descriptor's resource set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceClaim {
    pub key: ResourceKey,
    pub kind: OperationKind,
}

impl ResourceClaim {
    pub fn new(key: ResourceKey, kind: OperationKind) -> Self {
        Self { key, kind }
    }

    pub fn read(resource_type: &str, resource_id: &str) -> Self {
        Self::new(ResourceKey::new(resource_type, resource_id), OperationKind::Read)
    }

    pub fn create(resource_type: &str, resource_id: &str) -> Self {
        Self::new(ResourceKey::new(resource_type, resource_id), OperationKind::Create)
    }

    pub fn update(resource_type: &str, resource_id: &str) -> Self {
        Self::new(ResourceKey::new(resource_type, resource_id), OperationKind::Update)
    }

    pub fn delete(resource_type: &str, resource_id: &str) -> Self {
        Self::new(ResourceKey::new(resource_type, resource_id), OperationKind::Delete)
    }
}

impl fmt::Display for ResourceClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind, self.key)
    }
}
