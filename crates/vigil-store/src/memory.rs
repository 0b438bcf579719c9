//! In-memory implementation of the policy store.
//!
//! # Purpose
//! Implements [`PolicyStore`] entirely in memory using `HashMap`s guarded by
//! `tokio::sync::RwLock`. It exists for:
//! - local development and tests (no external dependencies)
//! - the integration harness that drives the resolver end-to-end
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: write locks for mutations, read locks
//!   for reads.
//! - **No multi-node coordination**: each process has independent state.
//!
//! # Shard keys
//! Every create assigns the record's shard key exactly once, as part of the
//! insertion, and patches refuse to touch it afterwards. A record arriving
//! with a shard key already attached is rejected: assignment belongs to this
//! layer, nowhere else.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use vigil_authz::AuthorizationSource;
use vigil_model::namespace::{child_path, is_ancestor_of};
use vigil_model::validation::{validate_namespace_path, validate_namespace_segment};
use vigil_model::{
    Authorization, HttpSource, LdapSource, ModelError, MtlsSource, Namespace, OidcSource,
    SparseAuthorization, SparseLdapSource, SparseMtlsSource, SparseNamespace, VigilSource,
};

use super::{PolicyStore, StoreError, StoreResult};

/// Key addressing a source record inside its kind: `(namespace, name)`.
type ScopedKey = (String, String);

/// In-memory policy store.
///
/// All maps are wrapped in `Arc<RwLock<...>>` so the store can be cloned and
/// shared across async request handlers while writes stay serialized.
#[derive(Clone, Default)]
pub struct MemoryStore {
    /// Namespaces keyed by their full path.
    namespaces: Arc<RwLock<HashMap<String, Namespace>>>,
    /// Authorizations keyed by id.
    authorizations: Arc<RwLock<HashMap<String, Authorization>>>,
    mtls_sources: Arc<RwLock<HashMap<ScopedKey, MtlsSource>>>,
    ldap_sources: Arc<RwLock<HashMap<ScopedKey, LdapSource>>>,
    vigil_sources: Arc<RwLock<HashMap<ScopedKey, VigilSource>>>,
    oidc_sources: Arc<RwLock<HashMap<ScopedKey, OidcSource>>>,
    http_sources: Arc<RwLock<HashMap<ScopedKey, HttpSource>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_id() -> String {
        Uuid::new_v4().to_string()
    }

    async fn require_namespace(&self, path: &str) -> StoreResult<()> {
        if path == "/" || self.namespaces.read().await.contains_key(path) {
            return Ok(());
        }
        Err(StoreError::NotFound(format!("namespace '{path}'")))
    }
}

#[async_trait]
impl PolicyStore for MemoryStore {
    async fn create_namespace(
        &self,
        parent: &str,
        name: &str,
        description: &str,
    ) -> StoreResult<Namespace> {
        validate_namespace_path("namespace", parent)?;
        validate_namespace_segment("name", name)?;

        let mut namespaces = self.namespaces.write().await;
        if parent != "/" && !namespaces.contains_key(parent) {
            return Err(StoreError::NotFound(format!("namespace '{parent}'")));
        }

        let path = child_path(parent, name);
        if namespaces.contains_key(&path) {
            return Err(StoreError::Conflict(format!("namespace '{path}' exists")));
        }

        let mut namespace = Namespace {
            id: Self::mint_id(),
            namespace: parent.to_string(),
            name: path.clone(),
            description: description.to_string(),
            shard_key: None,
        };
        vigil_shard::assign(&mut namespace)?;

        namespaces.insert(path, namespace.clone());
        metrics::gauge!("vigil_namespaces_total").set(namespaces.len() as f64);
        Ok(namespace)
    }

    async fn get_namespace(&self, path: &str) -> StoreResult<Namespace> {
        self.namespaces
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("namespace '{path}'")))
    }

    async fn list_namespaces(&self, parent: &str) -> StoreResult<Vec<Namespace>> {
        Ok(self
            .namespaces
            .read()
            .await
            .values()
            .filter(|namespace| namespace.namespace == parent)
            .cloned()
            .collect())
    }

    async fn patch_namespace(&self, path: &str, sparse: SparseNamespace) -> StoreResult<Namespace> {
        let mut namespaces = self.namespaces.write().await;
        let namespace = namespaces
            .get_mut(path)
            .ok_or_else(|| StoreError::NotFound(format!("namespace '{path}'")))?;
        namespace.patch(&sparse)?;
        Ok(namespace.clone())
    }

    async fn delete_namespace(&self, path: &str) -> StoreResult<()> {
        let mut namespaces = self.namespaces.write().await;
        if namespaces.remove(path).is_none() {
            return Err(StoreError::NotFound(format!("namespace '{path}'")));
        }
        // Cascading delete: the subtree goes with its root, as do the
        // records declared anywhere inside it.
        namespaces.retain(|candidate, _| !is_ancestor_of(path, candidate));
        metrics::gauge!("vigil_namespaces_total").set(namespaces.len() as f64);
        drop(namespaces);

        let mut authorizations = self.authorizations.write().await;
        authorizations
            .retain(|_, record| record.namespace != path && !is_ancestor_of(path, &record.namespace));
        metrics::gauge!("vigil_authorizations_total").set(authorizations.len() as f64);
        drop(authorizations);

        let in_subtree =
            |namespace: &str| namespace == path || is_ancestor_of(path, namespace);
        self.mtls_sources
            .write()
            .await
            .retain(|(namespace, _), _| !in_subtree(namespace));
        self.ldap_sources
            .write()
            .await
            .retain(|(namespace, _), _| !in_subtree(namespace));
        self.vigil_sources
            .write()
            .await
            .retain(|(namespace, _), _| !in_subtree(namespace));
        self.oidc_sources
            .write()
            .await
            .retain(|(namespace, _), _| !in_subtree(namespace));
        self.http_sources
            .write()
            .await
            .retain(|(namespace, _), _| !in_subtree(namespace));

        debug!(namespace = path, "deleted namespace subtree");
        Ok(())
    }

    async fn create_authorization(
        &self,
        authorization: Authorization,
    ) -> StoreResult<Authorization> {
        let mut authorization = authorization;
        validate_namespace_path("namespace", &authorization.namespace)?;
        self.require_namespace(&authorization.namespace).await?;

        if authorization.target_namespace.is_empty() {
            authorization.target_namespace = authorization.namespace.clone();
        }
        if authorization.target_namespace != authorization.namespace
            && !is_ancestor_of(&authorization.namespace, &authorization.target_namespace)
        {
            return Err(ModelError::validation(
                "targetNamespace",
                "Attribute 'targetNamespace' must be the declaring namespace or one of its children",
            )
            .into());
        }

        authorization.propagate = true;
        authorization.validate()?;

        if authorization.id.is_empty() {
            authorization.id = Self::mint_id();
        }
        vigil_shard::assign(&mut authorization)?;

        let mut authorizations = self.authorizations.write().await;
        if authorizations.contains_key(&authorization.id) {
            return Err(StoreError::Conflict(format!(
                "authorization '{}' exists",
                authorization.id
            )));
        }
        authorizations.insert(authorization.id.clone(), authorization.clone());
        metrics::gauge!("vigil_authorizations_total").set(authorizations.len() as f64);
        Ok(authorization)
    }

    async fn get_authorization(&self, id: &str) -> StoreResult<Authorization> {
        self.authorizations
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("authorization '{id}'")))
    }

    async fn list_authorizations(&self, namespace: &str) -> StoreResult<Vec<Authorization>> {
        Ok(self
            .authorizations
            .read()
            .await
            .values()
            .filter(|record| record.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn patch_authorization(
        &self,
        id: &str,
        sparse: SparseAuthorization,
    ) -> StoreResult<Authorization> {
        let mut authorizations = self.authorizations.write().await;
        let record = authorizations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("authorization '{id}'")))?;

        // Patch a copy first so a rejected update leaves the record intact.
        let mut updated = record.clone();
        updated.patch(&sparse)?;
        updated.validate()?;
        if updated.target_namespace != updated.namespace
            && !is_ancestor_of(&updated.namespace, &updated.target_namespace)
        {
            return Err(ModelError::validation(
                "targetNamespace",
                "Attribute 'targetNamespace' must be the declaring namespace or one of its children",
            )
            .into());
        }

        *record = updated.clone();
        Ok(updated)
    }

    async fn delete_authorization(&self, id: &str) -> StoreResult<()> {
        let mut authorizations = self.authorizations.write().await;
        if authorizations.remove(id).is_none() {
            return Err(StoreError::NotFound(format!("authorization '{id}'")));
        }
        metrics::gauge!("vigil_authorizations_total").set(authorizations.len() as f64);
        Ok(())
    }

    async fn create_mtls_source(&self, source: MtlsSource) -> StoreResult<MtlsSource> {
        let mut source = source;
        validate_namespace_path("namespace", &source.namespace)?;
        self.require_namespace(&source.namespace).await?;
        if source.name.is_empty() {
            return Err(
                ModelError::validation("name", "Attribute 'name' must not be empty").into(),
            );
        }

        let key = (source.namespace.clone(), source.name.clone());
        let mut sources = self.mtls_sources.write().await;
        if sources.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "mtls source '{}' exists in '{}'",
                source.name, source.namespace
            )));
        }

        if source.id.is_empty() {
            source.id = Self::mint_id();
        }
        vigil_shard::assign(&mut source)?;
        sources.insert(key, source.clone());
        metrics::counter!("vigil_source_creates_total", "kind" => "mtls").increment(1);
        Ok(source)
    }

    async fn get_mtls_source(&self, namespace: &str, name: &str) -> StoreResult<MtlsSource> {
        self.mtls_sources
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("mtls source '{namespace}:{name}'")))
    }

    async fn patch_mtls_source(
        &self,
        namespace: &str,
        name: &str,
        sparse: SparseMtlsSource,
    ) -> StoreResult<MtlsSource> {
        let mut sources = self.mtls_sources.write().await;
        let source = sources
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| StoreError::NotFound(format!("mtls source '{namespace}:{name}'")))?;
        source.patch(&sparse)?;
        Ok(source.clone())
    }

    async fn create_ldap_source(&self, source: LdapSource) -> StoreResult<LdapSource> {
        let mut source = source;
        validate_namespace_path("namespace", &source.namespace)?;
        self.require_namespace(&source.namespace).await?;
        if source.name.is_empty() {
            return Err(
                ModelError::validation("name", "Attribute 'name' must not be empty").into(),
            );
        }

        let key = (source.namespace.clone(), source.name.clone());
        let mut sources = self.ldap_sources.write().await;
        if sources.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "ldap source '{}' exists in '{}'",
                source.name, source.namespace
            )));
        }

        if source.id.is_empty() {
            source.id = Self::mint_id();
        }
        vigil_shard::assign(&mut source)?;
        sources.insert(key, source.clone());
        metrics::counter!("vigil_source_creates_total", "kind" => "ldap").increment(1);
        Ok(source)
    }

    async fn get_ldap_source(&self, namespace: &str, name: &str) -> StoreResult<LdapSource> {
        self.ldap_sources
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("ldap source '{namespace}:{name}'")))
    }

    async fn patch_ldap_source(
        &self,
        namespace: &str,
        name: &str,
        sparse: SparseLdapSource,
    ) -> StoreResult<LdapSource> {
        let mut sources = self.ldap_sources.write().await;
        let source = sources
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| StoreError::NotFound(format!("ldap source '{namespace}:{name}'")))?;
        source.patch(&sparse)?;
        Ok(source.clone())
    }

    async fn create_vigil_source(&self, source: VigilSource) -> StoreResult<VigilSource> {
        let mut source = source;
        validate_namespace_path("namespace", &source.namespace)?;
        self.require_namespace(&source.namespace).await?;
        if source.name.is_empty() {
            return Err(
                ModelError::validation("name", "Attribute 'name' must not be empty").into(),
            );
        }

        let key = (source.namespace.clone(), source.name.clone());
        let mut sources = self.vigil_sources.write().await;
        if sources.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "vigil source '{}' exists in '{}'",
                source.name, source.namespace
            )));
        }

        if source.id.is_empty() {
            source.id = Self::mint_id();
        }
        vigil_shard::assign(&mut source)?;
        sources.insert(key, source.clone());
        metrics::counter!("vigil_source_creates_total", "kind" => "vigil").increment(1);
        Ok(source)
    }

    async fn get_vigil_source(&self, namespace: &str, name: &str) -> StoreResult<VigilSource> {
        self.vigil_sources
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("vigil source '{namespace}:{name}'")))
    }

    async fn create_oidc_source(&self, source: OidcSource) -> StoreResult<OidcSource> {
        let mut source = source;
        validate_namespace_path("namespace", &source.namespace)?;
        self.require_namespace(&source.namespace).await?;
        if source.name.is_empty() {
            return Err(
                ModelError::validation("name", "Attribute 'name' must not be empty").into(),
            );
        }

        let key = (source.namespace.clone(), source.name.clone());
        let mut sources = self.oidc_sources.write().await;
        if sources.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "oidc source '{}' exists in '{}'",
                source.name, source.namespace
            )));
        }

        if source.id.is_empty() {
            source.id = Self::mint_id();
        }
        vigil_shard::assign(&mut source)?;
        sources.insert(key, source.clone());
        metrics::counter!("vigil_source_creates_total", "kind" => "oidc").increment(1);
        Ok(source)
    }

    async fn get_oidc_source(&self, namespace: &str, name: &str) -> StoreResult<OidcSource> {
        self.oidc_sources
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("oidc source '{namespace}:{name}'")))
    }

    async fn create_http_source(&self, source: HttpSource) -> StoreResult<HttpSource> {
        let mut source = source;
        validate_namespace_path("namespace", &source.namespace)?;
        self.require_namespace(&source.namespace).await?;
        if source.name.is_empty() {
            return Err(
                ModelError::validation("name", "Attribute 'name' must not be empty").into(),
            );
        }

        let key = (source.namespace.clone(), source.name.clone());
        let mut sources = self.http_sources.write().await;
        if sources.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "http source '{}' exists in '{}'",
                source.name, source.namespace
            )));
        }

        if source.id.is_empty() {
            source.id = Self::mint_id();
        }
        vigil_shard::assign(&mut source)?;
        sources.insert(key, source.clone());
        metrics::counter!("vigil_source_creates_total", "kind" => "http").increment(1);
        Ok(source)
    }

    async fn get_http_source(&self, namespace: &str, name: &str) -> StoreResult<HttpSource> {
        self.http_sources
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("http source '{namespace}:{name}'")))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl AuthorizationSource for MemoryStore {
    async fn authorizations_in(
        &self,
        namespace_chain: &[String],
    ) -> anyhow::Result<Vec<Authorization>> {
        Ok(self
            .authorizations
            .read()
            .await
            .values()
            .filter(|record| {
                !record.disabled && namespace_chain.contains(&record.target_namespace)
            })
            .cloned()
            .collect())
    }

    async fn namespace_exists(&self, namespace: &str) -> anyhow::Result<bool> {
        Ok(namespace == "/" || self.namespaces.read().await.contains_key(namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_shard::ShardKey;

    fn subject() -> Vec<Vec<String>> {
        vec![vec![
            "@auth:realm=certificate".to_string(),
            "@auth:claim=a".to_string(),
        ]]
    }

    #[tokio::test]
    async fn namespace_paths_join_and_conflict() {
        let store = MemoryStore::new();
        let acme = store
            .create_namespace("/", "acme", "the acme tenant")
            .await
            .expect("create /acme");
        assert_eq!(acme.name, "/acme");
        assert_eq!(acme.namespace, "/");
        assert!(acme.shard_key.is_some());

        let prod = store
            .create_namespace("/acme", "prod", "")
            .await
            .expect("create /acme/prod");
        assert_eq!(prod.name, "/acme/prod");

        let err = store
            .create_namespace("/", "acme", "")
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Conflict(_)));

        let err = store
            .create_namespace("/ghost", "x", "")
            .await
            .expect_err("missing parent");
        assert!(matches!(err, StoreError::NotFound(_)));

        let err = store
            .create_namespace("/", "no/slashes", "")
            .await
            .expect_err("slash in bare name");
        assert!(matches!(err, StoreError::Invalid(_)));

        let children = store.list_namespaces("/").await.expect("list");
        assert_eq!(children.len(), 1);
    }

    #[tokio::test]
    async fn authorization_creation_validates_and_assigns_shard_keys() {
        let store = MemoryStore::new();
        store
            .create_namespace("/", "acme", "")
            .await
            .expect("namespace");

        let mut auth = Authorization::new("/acme", "/acme");
        auth.subject = subject();
        auth.permissions = vec!["read".to_string()];
        let created = store
            .create_authorization(auth.clone())
            .await
            .expect("create");
        assert!(!created.id.is_empty());
        let key = created.shard_key.expect("shard key");
        assert_eq!(key.zone, 0);
        assert_eq!(key.zhash, vigil_shard::zhash(&created.id));

        let mut bad = Authorization::new("/acme", "/acme");
        bad.subject = vec![vec!["@auth:realm=certificate".to_string()]];
        let err = store.create_authorization(bad).await.expect_err("subject");
        assert!(matches!(err, StoreError::Invalid(_)));

        let mut outside = Authorization::new("/acme", "/other");
        outside.subject = subject();
        let err = store
            .create_authorization(outside)
            .await
            .expect_err("target outside subtree");
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn preassigned_shard_keys_are_rejected() {
        let store = MemoryStore::new();
        store
            .create_namespace("/", "acme", "")
            .await
            .expect("namespace");

        let mut auth = Authorization::new("/acme", "/acme");
        auth.subject = subject();
        auth.shard_key = Some(ShardKey { zone: 0, zhash: 7 });
        let err = store.create_authorization(auth).await.expect_err("assigned");
        assert!(matches!(
            err,
            StoreError::Shard(vigil_shard::ShardError::AlreadyAssigned { .. })
        ));
    }

    #[tokio::test]
    async fn patches_update_without_touching_shard_keys() {
        let store = MemoryStore::new();
        store
            .create_namespace("/", "acme", "")
            .await
            .expect("namespace");

        let mut auth = Authorization::new("/acme", "/acme");
        auth.subject = subject();
        auth.permissions = vec!["read".to_string()];
        let created = store.create_authorization(auth).await.expect("create");
        let original_key = created.shard_key.expect("shard key");

        let patched = store
            .patch_authorization(
                &created.id,
                SparseAuthorization {
                    disabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .expect("patch");
        assert!(patched.disabled);
        assert_eq!(patched.shard_key, Some(original_key));

        // A rejected patch leaves the stored record untouched.
        let err = store
            .patch_authorization(
                &created.id,
                SparseAuthorization {
                    subject: Some(vec![vec!["@auth:realm=certificate".to_string()]]),
                    ..Default::default()
                },
            )
            .await
            .expect_err("invalid subject");
        assert!(matches!(err, StoreError::Invalid(_)));
        let stored = store.get_authorization(&created.id).await.expect("get");
        assert_eq!(stored.subject, subject());
    }

    #[tokio::test]
    async fn deleting_a_namespace_cascades() {
        let store = MemoryStore::new();
        store.create_namespace("/", "acme", "").await.expect("ns");
        store
            .create_namespace("/acme", "prod", "")
            .await
            .expect("ns");

        let mut auth = Authorization::new("/acme/prod", "/acme/prod");
        auth.subject = subject();
        let auth = store.create_authorization(auth).await.expect("auth");

        store
            .create_mtls_source(MtlsSource {
                namespace: "/acme/prod".to_string(),
                name: "gateway".to_string(),
                ..Default::default()
            })
            .await
            .expect("source");

        store.delete_namespace("/acme").await.expect("delete");

        assert!(matches!(
            store.get_namespace("/acme/prod").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_authorization(&auth.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_mtls_source("/acme/prod", "gateway").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn scoped_sources_conflict_per_namespace_and_name() {
        let store = MemoryStore::new();
        store.create_namespace("/", "acme", "").await.expect("ns");

        store
            .create_ldap_source(LdapSource {
                namespace: "/acme".to_string(),
                name: "directory".to_string(),
                address: "ldaps://dir.acme.example:636".to_string(),
                ..Default::default()
            })
            .await
            .expect("ldap");

        let err = store
            .create_ldap_source(LdapSource {
                namespace: "/acme".to_string(),
                name: "directory".to_string(),
                ..Default::default()
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Conflict(_)));

        let fetched = store
            .get_ldap_source("/acme", "directory")
            .await
            .expect("get");
        assert_eq!(
            fetched.shard_key.expect("key").zhash,
            vigil_shard::zhash("/acme:directory")
        );
    }

    #[tokio::test]
    async fn fetches_filter_disabled_records() {
        let store = MemoryStore::new();
        store.create_namespace("/", "acme", "").await.expect("ns");

        let mut enabled = Authorization::new("/acme", "/acme");
        enabled.subject = subject();
        let enabled = store.create_authorization(enabled).await.expect("create");

        let mut disabled = Authorization::new("/acme", "/acme");
        disabled.subject = subject();
        disabled.disabled = true;
        store.create_authorization(disabled).await.expect("create");

        let chain = vec!["/".to_string(), "/acme".to_string()];
        let fetched = store.authorizations_in(&chain).await.expect("fetch");
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, enabled.id);
    }

    #[tokio::test]
    async fn backend_identity() {
        let store = MemoryStore::new();
        store.health_check().await.expect("health");
        assert!(!store.is_durable());
        assert_eq!(store.backend_name(), "memory");
    }
}
