//! Operation descriptors: what to run and which resources it touches.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Link, Operation, ResourceClaim};
use crate::error::ValidationError;

/// How the caller wants to observe the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Block until terminal and return the result.
    Sync,

    /// Like `Sync`, but the result is returned with the location of the
    /// created resource.
    SyncCreated { location: Link },

    /// Return a handle immediately.
    Async,
}

impl ExecutionMode {
    pub fn is_async(&self) -> bool {
        matches!(self, ExecutionMode::Async)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sync => "sync",
            ExecutionMode::SyncCreated { .. } => "sync_created",
            ExecutionMode::Async => "async",
        }
    }
}

/// An immutable unit-of-work request.
///
/// Built with [`OperationDescriptor::builder`]; `build()` validates the claim
/// set so a descriptor that exists is internally consistent.
#[derive(Clone)]
pub struct OperationDescriptor {
    operation: Arc<dyn Operation>,
    args: Vec<Value>,
    claims: Vec<ResourceClaim>,
    weight: u32,
    tags: Vec<String>,
    mode: ExecutionMode,
    durable: bool,
}

impl OperationDescriptor {
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder::default()
    }

    pub fn operation(&self) -> &Arc<dyn Operation> {
        &self.operation
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn claims(&self) -> &[ResourceClaim] {
        &self.claims
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    pub fn durable(&self) -> bool {
        self.durable
    }

    /// Same descriptor, different execution mode. Used by the execution facade
    /// before submission.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub(crate) fn into_parts(self) -> DescriptorParts {
        DescriptorParts {
            operation: self.operation,
            args: self.args,
            claims: self.claims,
            weight: self.weight,
            tags: self.tags,
            mode: self.mode,
            durable: self.durable,
        }
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("operation", &self.operation.name())
            .field("args", &self.args)
            .field("claims", &self.claims)
            .field("weight", &self.weight)
            .field("tags", &self.tags)
            .field("mode", &self.mode)
            .field("durable", &self.durable)
            .finish()
    }
}

/// Descriptor fields, moved out at submission.
pub(crate) struct DescriptorParts {
    pub operation: Arc<dyn Operation>,
    pub args: Vec<Value>,
    pub claims: Vec<ResourceClaim>,
    pub weight: u32,
    pub tags: Vec<String>,
    pub mode: ExecutionMode,
    pub durable: bool,
}

pub struct DescriptorBuilder {
    operation: Option<Arc<dyn Operation>>,
    args: Vec<Value>,
    claims: Vec<ResourceClaim>,
    weight: u32,
    tags: Vec<String>,
    mode: ExecutionMode,
    durable: bool,
}

impl Default for DescriptorBuilder {
    fn default() -> Self {
        Self {
            operation: None,
            args: Vec::new(),
            claims: Vec::new(),
            weight: 1,
            tags: Vec::new(),
            mode: ExecutionMode::Sync,
            durable: false,
        }
    }
}

impl DescriptorBuilder {
    pub fn operation(mut self, operation: Arc<dyn Operation>) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn arg(mut self, arg: Value) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn claim(mut self, claim: ResourceClaim) -> Self {
        self.claims.push(claim);
        self
    }

    pub fn claims(mut self, claims: impl IntoIterator<Item = ResourceClaim>) -> Self {
        self.claims.extend(claims);
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tags.extend(tags);
        self
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Validate and freeze.
    ///
    /// - an operation must be set
    /// - resource types and ids must be non-empty
    /// - a key may appear more than once only with the same kind; exact
    ///   duplicates collapse to one claim
    pub fn build(self) -> Result<OperationDescriptor, ValidationError> {
        let operation = self.operation.ok_or(ValidationError::MissingOperation)?;
        let claims = normalize_claims(self.claims)?;
        Ok(OperationDescriptor {
            operation,
            args: self.args,
            claims,
            weight: self.weight,
            tags: self.tags,
            mode: self.mode,
            durable: self.durable,
        })
    }
}

fn normalize_claims(claims: Vec<ResourceClaim>) -> Result<Vec<ResourceClaim>, ValidationError> {
    let mut seen = HashMap::with_capacity(claims.len());
    let mut out = Vec::with_capacity(claims.len());
    for claim in claims {
        if claim.key.resource_type().is_empty() || claim.key.resource_id().is_empty() {
            return Err(ValidationError::EmptyResourceKey(claim.key.to_string()));
        }
        match seen.get(&claim.key) {
            Some(&kind) if kind == claim.kind => continue,
            Some(&kind) => {
                return Err(ValidationError::ConflictingClaims {
                    key: claim.key.clone(),
                    first: kind,
                    second: claim.kind,
                });
            }
            None => {
                seen.insert(claim.key.clone(), claim.kind);
                out.push(claim);
            }
        }
    }
    Ok(out)
}
