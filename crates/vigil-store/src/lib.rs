//! Persistence boundary for policy records.
//!
//! The core engine never talks to a database; it goes through the
//! [`PolicyStore`] trait defined here. The in-memory backend in [`memory`]
//! is the reference implementation and the harness the integration tests
//! drive; a database-backed implementation lives with the deployment, not in
//! this workspace.
//!
//! Every create path assigns the record's shard key exactly once (see
//! `vigil-shard`) and validates user-settable fields before accepting the
//! record, so nothing unvalidated ever reaches resolution.

use async_trait::async_trait;
use thiserror::Error;
use vigil_model::{
    Authorization, HttpSource, LdapSource, ModelError, MtlsSource, Namespace, OidcSource,
    SparseAuthorization, SparseLdapSource, SparseMtlsSource, SparseNamespace, VigilSource,
};
use vigil_shard::ShardError;

pub mod memory;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Invalid(#[from] ModelError),
    #[error(transparent)]
    Shard(#[from] ShardError),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Create a namespace from a bare segment under a parent path.
    async fn create_namespace(
        &self,
        parent: &str,
        name: &str,
        description: &str,
    ) -> StoreResult<Namespace>;
    async fn get_namespace(&self, path: &str) -> StoreResult<Namespace>;
    /// Namespaces declared directly under the given parent.
    async fn list_namespaces(&self, parent: &str) -> StoreResult<Vec<Namespace>>;
    async fn patch_namespace(&self, path: &str, sparse: SparseNamespace) -> StoreResult<Namespace>;
    /// Delete a namespace and everything beneath it.
    async fn delete_namespace(&self, path: &str) -> StoreResult<()>;

    async fn create_authorization(&self, authorization: Authorization)
        -> StoreResult<Authorization>;
    async fn get_authorization(&self, id: &str) -> StoreResult<Authorization>;
    /// Authorizations declared in the given namespace.
    async fn list_authorizations(&self, namespace: &str) -> StoreResult<Vec<Authorization>>;
    async fn patch_authorization(
        &self,
        id: &str,
        sparse: SparseAuthorization,
    ) -> StoreResult<Authorization>;
    async fn delete_authorization(&self, id: &str) -> StoreResult<()>;

    async fn create_mtls_source(&self, source: MtlsSource) -> StoreResult<MtlsSource>;
    async fn get_mtls_source(&self, namespace: &str, name: &str) -> StoreResult<MtlsSource>;
    async fn patch_mtls_source(
        &self,
        namespace: &str,
        name: &str,
        sparse: SparseMtlsSource,
    ) -> StoreResult<MtlsSource>;

    async fn create_ldap_source(&self, source: LdapSource) -> StoreResult<LdapSource>;
    async fn get_ldap_source(&self, namespace: &str, name: &str) -> StoreResult<LdapSource>;
    async fn patch_ldap_source(
        &self,
        namespace: &str,
        name: &str,
        sparse: SparseLdapSource,
    ) -> StoreResult<LdapSource>;

    async fn create_vigil_source(&self, source: VigilSource) -> StoreResult<VigilSource>;
    async fn get_vigil_source(&self, namespace: &str, name: &str) -> StoreResult<VigilSource>;

    async fn create_oidc_source(&self, source: OidcSource) -> StoreResult<OidcSource>;
    async fn get_oidc_source(&self, namespace: &str, name: &str) -> StoreResult<OidcSource>;

    async fn create_http_source(&self, source: HttpSource) -> StoreResult<HttpSource>;
    async fn get_http_source(&self, namespace: &str, name: &str) -> StoreResult<HttpSource>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}
