//! Identity source records: where claims may be minted from.
//!
//! Sources are administrative records scoped to a namespace. mTLS, LDAP and
//! peer-platform sources are addressed by `(namespace, name)` and shard by
//! that pair; OIDC and HTTP sources shard by their identifier like every
//! other record.

use serde::{Deserialize, Serialize};
use vigil_shard::{ShardError, ShardKey, ShardResult, Shardable};

use crate::identity::{
    HTTP_SOURCE_IDENTITY, LDAP_SOURCE_IDENTITY, MTLS_SOURCE_IDENTITY, OIDC_SOURCE_IDENTITY,
    VIGIL_SOURCE_IDENTITY,
};
use crate::{ModelError, ModelResult};

// Shard routing by the `namespace:name` pair that addresses the source.
macro_rules! shardable_by_scoped_name {
    ($type:ident, $identity:expr) => {
        impl Shardable for $type {
            fn identity_name(&self) -> &'static str {
                $identity.name
            }

            fn natural_key(&self) -> ShardResult<String> {
                if self.namespace.is_empty() {
                    return Err(ShardError::MissingNaturalKey("namespace"));
                }
                if self.name.is_empty() {
                    return Err(ShardError::MissingNaturalKey("name"));
                }
                Ok(format!("{}:{}", self.namespace, self.name))
            }

            fn shard_key(&self) -> Option<ShardKey> {
                self.shard_key
            }

            fn set_shard_key(&mut self, key: ShardKey) {
                self.shard_key = Some(key);
            }
        }
    };
}

// Sparse counterpart: the natural-key fields must be set.
macro_rules! shardable_by_scoped_name_sparse {
    ($type:ident, $identity:expr) => {
        impl Shardable for $type {
            fn identity_name(&self) -> &'static str {
                $identity.name
            }

            fn natural_key(&self) -> ShardResult<String> {
                let namespace = match self.namespace.as_deref() {
                    Some(namespace) if !namespace.is_empty() => namespace,
                    _ => return Err(ShardError::MissingNaturalKey("namespace")),
                };
                let name = match self.name.as_deref() {
                    Some(name) if !name.is_empty() => name,
                    _ => return Err(ShardError::MissingNaturalKey("name")),
                };
                Ok(format!("{namespace}:{name}"))
            }

            fn shard_key(&self) -> Option<ShardKey> {
                self.shard_key
            }

            fn set_shard_key(&mut self, key: ShardKey) {
                self.shard_key = Some(key);
            }
        }
    };
}

// Shard routing by record identifier.
macro_rules! shardable_by_id {
    ($type:ident, $identity:expr) => {
        impl Shardable for $type {
            fn identity_name(&self) -> &'static str {
                $identity.name
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
    };
}

// Identity-checked partial update, shared by every source kind.
macro_rules! patch_guard {
    ($record:expr, $sparse:expr) => {
        if let Some(id) = &$sparse.id {
            if id != &$record.id {
                return Err(ModelError::InvariantViolation(format!(
                    "cannot patch source '{}' from a sparse record with id '{id}'",
                    $record.id
                )));
            }
        }
        if let Some(key) = $sparse.shard_key {
            if $record.shard_key != Some(key) {
                return Err(ModelError::InvariantViolation(
                    "shard key cannot change after creation".to_string(),
                ));
            }
        }
    };
}

/// Source trusting client certificates signed by a CA bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MtlsSource {
    pub id: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// PEM bundle of the accepted certificate authorities.
    pub certificate_authority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

impl MtlsSource {
    pub fn patch(&mut self, sparse: &SparseMtlsSource) -> ModelResult<()> {
        patch_guard!(self, sparse);
        if let Some(description) = &sparse.description {
            self.description = description.clone();
        }
        if let Some(certificate_authority) = &sparse.certificate_authority {
            self.certificate_authority = certificate_authority.clone();
        }
        Ok(())
    }
}

/// Sparse projection of [`MtlsSource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseMtlsSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

/// Source binding against an LDAP directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LdapSource {
    pub id: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub address: String,
    pub base_dn: String,
    pub bind_dn: String,
    pub bind_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

impl LdapSource {
    pub fn patch(&mut self, sparse: &SparseLdapSource) -> ModelResult<()> {
        patch_guard!(self, sparse);
        if let Some(description) = &sparse.description {
            self.description = description.clone();
        }
        if let Some(address) = &sparse.address {
            self.address = address.clone();
        }
        if let Some(base_dn) = &sparse.base_dn {
            self.base_dn = base_dn.clone();
        }
        if let Some(bind_dn) = &sparse.bind_dn {
            self.bind_dn = bind_dn.clone();
        }
        if let Some(bind_password) = &sparse.bind_password {
            self.bind_password = bind_password.clone();
        }
        Ok(())
    }
}

/// Sparse projection of [`LdapSource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseLdapSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_dn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_dn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

/// Source trusting identity tokens issued by a peer vigil deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VigilSource {
    pub id: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Issuer URL of the peer deployment.
    pub issuer: String,
    #[serde(default)]
    pub certificate_authority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

impl VigilSource {
    pub fn patch(&mut self, sparse: &SparseVigilSource) -> ModelResult<()> {
        patch_guard!(self, sparse);
        if let Some(description) = &sparse.description {
            self.description = description.clone();
        }
        if let Some(issuer) = &sparse.issuer {
            self.issuer = issuer.clone();
        }
        if let Some(certificate_authority) = &sparse.certificate_authority {
            self.certificate_authority = certificate_authority.clone();
        }
        Ok(())
    }
}

/// Sparse projection of [`VigilSource`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseVigilSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

/// Source trusting tokens from an external OIDC provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcSource {
    pub id: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

/// Source delegating claim minting to an external HTTP endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSource {
    pub id: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub certificate_authority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_key: Option<ShardKey>,
}

shardable_by_scoped_name!(MtlsSource, MTLS_SOURCE_IDENTITY);
shardable_by_scoped_name_sparse!(SparseMtlsSource, MTLS_SOURCE_IDENTITY);
shardable_by_scoped_name!(LdapSource, LDAP_SOURCE_IDENTITY);
shardable_by_scoped_name_sparse!(SparseLdapSource, LDAP_SOURCE_IDENTITY);
shardable_by_scoped_name!(VigilSource, VIGIL_SOURCE_IDENTITY);
shardable_by_scoped_name_sparse!(SparseVigilSource, VIGIL_SOURCE_IDENTITY);
shardable_by_id!(OidcSource, OIDC_SOURCE_IDENTITY);
shardable_by_id!(HttpSource, HTTP_SOURCE_IDENTITY);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_sources_hash_namespace_and_name() {
        let mut full = MtlsSource {
            id: "s1".to_string(),
            namespace: "/t".to_string(),
            name: "n".to_string(),
            ..Default::default()
        };
        let mut sparse = SparseMtlsSource {
            namespace: Some("/t".to_string()),
            name: Some("n".to_string()),
            ..Default::default()
        };
        let full_key = vigil_shard::assign(&mut full).expect("full");
        let sparse_key = vigil_shard::assign(&mut sparse).expect("sparse");
        assert_eq!(full_key.zhash, sparse_key.zhash);
        assert_eq!(full_key.zone, 0);

        let mut renamed = MtlsSource {
            id: "s2".to_string(),
            namespace: "/t".to_string(),
            name: "m".to_string(),
            ..Default::default()
        };
        let renamed_key = vigil_shard::assign(&mut renamed).expect("renamed");
        assert_ne!(full_key.zhash, renamed_key.zhash);
    }

    #[test]
    fn scoped_sparse_without_natural_key_cannot_shard() {
        let mut sparse = SparseLdapSource {
            name: Some("directory".to_string()),
            ..Default::default()
        };
        let err = vigil_shard::assign(&mut sparse).expect_err("missing namespace");
        assert!(matches!(
            err,
            vigil_shard::ShardError::MissingNaturalKey("namespace")
        ));
    }

    #[test]
    fn id_keyed_sources_hash_their_identifier() {
        let mut oidc = OidcSource {
            id: "o1".to_string(),
            namespace: "/t".to_string(),
            name: "corp".to_string(),
            ..Default::default()
        };
        let key = vigil_shard::assign(&mut oidc).expect("assign");
        assert_eq!(key.zhash, vigil_shard::zhash("o1"));

        let mut http = HttpSource::default();
        vigil_shard::assign(&mut http).expect_err("no id yet");
    }

    #[test]
    fn same_scoped_pair_hashes_identically_across_kinds() {
        // Routing is per-collection; the key only has to be stable within a
        // kind, and the pair form keeps renames within a namespace cheap.
        let mut ldap = LdapSource {
            id: "l1".to_string(),
            namespace: "/t".to_string(),
            name: "n".to_string(),
            ..Default::default()
        };
        let mut vigil = VigilSource {
            id: "v1".to_string(),
            namespace: "/t".to_string(),
            name: "n".to_string(),
            ..Default::default()
        };
        let ldap_key = vigil_shard::assign(&mut ldap).expect("ldap");
        let vigil_key = vigil_shard::assign(&mut vigil).expect("vigil");
        assert_eq!(ldap_key.zhash, vigil_key.zhash);
    }

    #[test]
    fn patch_respects_identity_and_shard_key() {
        let mut source = MtlsSource {
            id: "s1".to_string(),
            namespace: "/t".to_string(),
            name: "n".to_string(),
            ..Default::default()
        };
        vigil_shard::assign(&mut source).expect("assign");

        source
            .patch(&SparseMtlsSource {
                id: Some("s1".to_string()),
                certificate_authority: Some("-----BEGIN CERTIFICATE-----".to_string()),
                ..Default::default()
            })
            .expect("patch");
        assert!(source.certificate_authority.starts_with("-----BEGIN"));

        let err = source
            .patch(&SparseMtlsSource {
                id: Some("s2".to_string()),
                ..Default::default()
            })
            .expect_err("foreign id");
        assert!(matches!(err, ModelError::InvariantViolation(_)));
    }

    #[test]
    fn ldap_and_vigil_patches_update_in_place() {
        let mut ldap = LdapSource {
            id: "l1".to_string(),
            namespace: "/t".to_string(),
            name: "dir".to_string(),
            ..Default::default()
        };
        ldap.patch(&SparseLdapSource {
            id: Some("l1".to_string()),
            address: Some("ldaps://dir.example.com:636".to_string()),
            bind_dn: Some("cn=reader,dc=example,dc=com".to_string()),
            ..Default::default()
        })
        .expect("ldap patch");
        assert_eq!(ldap.address, "ldaps://dir.example.com:636");

        let mut peer = VigilSource {
            id: "v1".to_string(),
            namespace: "/t".to_string(),
            name: "peer".to_string(),
            ..Default::default()
        };
        peer.patch(&SparseVigilSource {
            issuer: Some("https://vigil.peer.example.com".to_string()),
            ..Default::default()
        })
        .expect("peer patch");
        assert_eq!(peer.issuer, "https://vigil.peer.example.com");
    }
}
