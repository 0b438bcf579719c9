//! Namespace records and the slash-delimited path algebra every other
//! component leans on.
//!
//! A namespace's `name` is its full path (`/acme/prod`); the bare segment
//! supplied at creation is appended to the parent's path by the persistence
//! layer and is immutable afterwards. Ancestry is pure string algebra over
//! `/` boundaries, so resolution code can be tested with literal path lists.

use serde::{Deserialize, Serialize};
use vigil_shard::{ShardError, ShardKey, ShardResult, Shardable};

use crate::identity::NAMESPACE_IDENTITY;
use crate::{ModelError, ModelResult};

/// A tenant scope in the namespace hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Namespace {
    /// Unique identifier, minted by the persistence layer.
    pub id: String,

    /// Namespace the record was declared in (the parent path).
    pub namespace: String,

    /// Full slash-delimited path of this namespace. Immutable after
    /// creation.
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

impl Namespace {
    /// Apply the set fields of a sparse record.
    ///
    /// The sparse record must designate the same record (`id`), must not
    /// rename the namespace, and must not touch the shard key.
    pub fn patch(&mut self, sparse: &SparseNamespace) -> ModelResult<()> {
        if let Some(id) = &sparse.id {
            if id != &self.id {
                return Err(ModelError::InvariantViolation(format!(
                    "cannot patch namespace '{}' from a sparse record with id '{id}'",
                    self.id
                )));
            }
        }
        if let Some(name) = &sparse.name {
            if name != &self.name {
                return Err(ModelError::InvariantViolation(
                    "namespace name is immutable after creation".to_string(),
                ));
            }
        }
        if let Some(key) = sparse.shard_key {
            if self.shard_key != Some(key) {
                return Err(ModelError::InvariantViolation(
                    "shard key cannot change after creation".to_string(),
                ));
            }
        }
        if let Some(description) = &sparse.description {
            self.description = description.clone();
        }
        Ok(())
    }
}

impl Shardable for Namespace {
    fn identity_name(&self) -> &'static str {
        NAMESPACE_IDENTITY.name
    }

    fn natural_key(&self) -> ShardResult<String> {
        if self.name.is_empty() {
            return Err(ShardError::MissingNaturalKey("name"));
        }
        Ok(self.name.clone())
    }

    fn shard_key(&self) -> Option<ShardKey> {
        self.shard_key
    }

    fn set_shard_key(&mut self, key: ShardKey) {
        self.shard_key = Some(key);
    }
}

/// Sparse projection of [`Namespace`] used for partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseNamespace {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

impl Shardable for SparseNamespace {
    fn identity_name(&self) -> &'static str {
        NAMESPACE_IDENTITY.name
    }

    fn natural_key(&self) -> ShardResult<String> {
        match &self.name {
            Some(name) if !name.is_empty() => Ok(name.clone()),
            _ => Err(ShardError::MissingNaturalKey("name")),
        }
    }

    fn shard_key(&self) -> Option<ShardKey> {
        self.shard_key
    }

    fn set_shard_key(&mut self, key: ShardKey) {
        self.shard_key = Some(key);
    }
}

/// The ancestor chain of a path, root first and inclusive of the path
/// itself: `/acme/prod` yields `["/", "/acme", "/acme/prod"]`.
pub fn ancestor_chain(path: &str) -> Vec<String> {
    let mut chain = vec!["/".to_string()];
    if path == "/" {
        return chain;
    }

    let mut current = String::with_capacity(path.len());
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        current.push('/');
        current.push_str(segment);
        chain.push(current.clone());
    }
    chain
}

/// True when `parent` is a strict ancestor of `child`.
pub fn is_ancestor_of(parent: &str, child: &str) -> bool {
    if parent == child || child == "/" {
        return false;
    }
    if parent == "/" {
        return child.starts_with('/');
    }
    child.starts_with(parent) && child.as_bytes().get(parent.len()) == Some(&b'/')
}

/// Join a bare segment onto a parent path.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}
