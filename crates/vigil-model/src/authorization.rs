//! Authorization records: the policy objects binding subject expressions to
//! permissions.

use serde::{Deserialize, Serialize};
use vigil_shard::{ShardError, ShardKey, ShardResult, Shardable};

use crate::identity::AUTHORIZATION_IDENTITY;
use crate::validation::{validate_cidr_list_optional, validate_subject};
use crate::{ModelError, ModelResult};

/// A grant of `permissions` to every claim set matching `subject`, applying
/// at `target_namespace` and propagating into its subtree.
///
/// There is no deny counterpart: an authorization either grants or is
/// silent, and overlapping grants union at resolution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    /// Unique identifier, minted by the persistence layer.
    pub id: String,

    /// Namespace the record was declared in.
    pub namespace: String,

    /// Namespace the grant applies to. Must be the declaring namespace or a
    /// descendant of it.
    pub target_namespace: String,

    /// Subject expression: OR across lines, AND across the tags of a line.
    #[serde(default)]
    pub subject: Vec<Vec<String>>,

    /// Permission names granted to matching claim sets.
    #[serde(default)]
    pub permissions: Vec<String>,

    /// When non-empty, the grant only applies to callers whose IP falls in
    /// at least one of these CIDRs.
    #[serde(default)]
    pub subnets: Vec<String>,

    /// Soft-delete: a disabled record never takes part in resolution.
    #[serde(default)]
    pub disabled: bool,

    /// Cuts propagation of ancestor-declared grants into the subtree
    /// strictly below `target_namespace`.
    #[serde(default)]
    pub hidden: bool,

    /// Always true: grants apply to the target namespace and its subtree.
    pub propagate: bool,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

impl Authorization {
    pub fn new(namespace: impl Into<String>, target_namespace: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            namespace: namespace.into(),
            target_namespace: target_namespace.into(),
            subject: Vec::new(),
            permissions: Vec::new(),
            subnets: Vec::new(),
            disabled: false,
            hidden: false,
            propagate: true,
            description: String::new(),
            shard_key: None,
        }
    }

    /// Validate the user-settable fields of the record.
    pub fn validate(&self) -> ModelResult<()> {
        if self.target_namespace.is_empty() {
            return Err(ModelError::validation(
                "targetNamespace",
                "Attribute 'targetNamespace' must not be empty",
            ));
        }
        validate_subject("subject", &self.subject)?;
        validate_cidr_list_optional("subnets", &self.subnets)?;
        Ok(())
    }

    /// Apply the set fields of a sparse record.
    pub fn patch(&mut self, sparse: &SparseAuthorization) -> ModelResult<()> {
        if let Some(id) = &sparse.id {
            if id != &self.id {
                return Err(ModelError::InvariantViolation(format!(
                    "cannot patch authorization '{}' from a sparse record with id '{id}'",
                    self.id
                )));
            }
        }
        if let Some(key) = sparse.shard_key {
            if self.shard_key != Some(key) {
                return Err(ModelError::InvariantViolation(
                    "shard key cannot change after creation".to_string(),
                ));
            }
        }
        if let Some(target_namespace) = &sparse.target_namespace {
            self.target_namespace = target_namespace.clone();
        }
        if let Some(subject) = &sparse.subject {
            self.subject = subject.clone();
        }
        if let Some(permissions) = &sparse.permissions {
            self.permissions = permissions.clone();
        }
        if let Some(subnets) = &sparse.subnets {
            self.subnets = subnets.clone();
        }
        if let Some(disabled) = sparse.disabled {
            self.disabled = disabled;
        }
        if let Some(hidden) = sparse.hidden {
            self.hidden = hidden;
        }
        if let Some(description) = &sparse.description {
            self.description = description.clone();
        }
        Ok(())
    }
}

impl Shardable for Authorization {
    fn identity_name(&self) -> &'static str {
        AUTHORIZATION_IDENTITY.name
    }

    fn natural_key(&self) -> ShardResult<String> {
        if self.id.is_empty() {
            return Err(ShardError::MissingNaturalKey("id"));
        }
        Ok(self.id.clone())
    }

    fn shard_key(&self) -> Option<ShardKey> {
        self.shard_key
    }

    fn set_shard_key(&mut self, key: ShardKey) {
        self.shard_key = Some(key);
    }
}

/// Sparse projection of [`Authorization`] used for partial updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseAuthorization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Vec<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnets: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

impl Shardable for SparseAuthorization {
    fn identity_name(&self) -> &'static str {
        AUTHORIZATION_IDENTITY.name
    }

    fn natural_key(&self) -> ShardResult<String> {
        match &self.id {
            Some(id) if !id.is_empty() => Ok(id.clone()),
            _ => Err(ShardError::MissingNaturalKey("id")),
        }
    }

    fn shard_key(&self) -> Option<ShardKey> {
        self.shard_key
    }

    fn set_shard_key(&mut self, key: ShardKey) {
        self.shard_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_authorization() -> Authorization {
        let mut auth = Authorization::new("/acme", "/acme/prod");
        auth.id = "a1".to_string();
        auth.subject = vec![vec![
            "@auth:realm=certificate".to_string(),
            "@auth:claim=a".to_string(),
        ]];
        auth.permissions = vec!["read".to_string()];
        auth
    }

    #[test]
    fn new_records_propagate() {
        assert!(Authorization::new("/", "/").propagate);
    }

    #[test]
    fn validate_checks_subject_and_subnets() {
        let mut auth = valid_authorization();
        auth.validate().expect("valid");

        auth.subnets = vec!["not-a-cidr".to_string()];
        auth.validate().expect_err("bad subnet");

        auth.subnets = vec!["10.0.0.0/8".to_string()];
        auth.subject = vec![vec!["@auth:realm=certificate".to_string()]];
        auth.validate().expect_err("short subject line");

        auth.subject = Vec::new();
        auth.target_namespace = String::new();
        auth.validate().expect_err("missing target");
    }

    #[test]
    fn patch_updates_fields_in_place() {
        let mut auth = valid_authorization();
        auth.patch(&SparseAuthorization {
            id: Some("a1".to_string()),
            disabled: Some(true),
            permissions: Some(vec!["read".to_string(), "write".to_string()]),
            ..Default::default()
        })
        .expect("patch");
        assert!(auth.disabled);
        assert_eq!(auth.permissions.len(), 2);
    }

    #[test]
    fn patch_rejects_foreign_records() {
        let mut auth = valid_authorization();
        let err = auth
            .patch(&SparseAuthorization {
                id: Some("other".to_string()),
                ..Default::default()
            })
            .expect_err("identity mismatch");
        assert!(matches!(err, ModelError::InvariantViolation(_)));
    }

    #[test]
    fn records_serialize_with_camel_case_fields() {
        let auth = valid_authorization();
        let encoded = serde_json::to_value(&auth).expect("encode");
        assert!(encoded.get("targetNamespace").is_some());
        assert!(encoded.get("target_namespace").is_none());
        assert!(encoded.get("shardKey").is_none());
    }

    #[test]
    fn patch_rejects_shard_key_changes() {
        let mut auth = valid_authorization();
        vigil_shard::assign(&mut auth).expect("assign");
        let err = auth
            .patch(&SparseAuthorization {
                shard_key: Some(vigil_shard::ShardKey { zone: 0, zhash: 42 }),
                ..Default::default()
            })
            .expect_err("shard key change");
        assert!(matches!(err, ModelError::InvariantViolation(_)));
    }
}
