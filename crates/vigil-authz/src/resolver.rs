//! Permission resolution: from a claim set to a permission map.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use ipnet::IpNet;
use tracing::debug;
use vigil_model::Authorization;
use vigil_model::namespace::{ancestor_chain, is_ancestor_of};

use crate::errors::{AuthzResult, ResolveError};
use crate::permissions::{PermissionMap, WILDCARD};
use crate::restrictions::Restrictions;
use crate::subject::subject_matches;

/// Read-side storage collaborator the resolver depends on.
///
/// Implementations may serve from an eventually-consistent replica; a
/// just-created authorization not being visible yet is accepted behavior.
#[async_trait]
pub trait AuthorizationSource: Send + Sync {
    /// All non-disabled authorizations whose target namespace is an element
    /// of the given chain.
    async fn authorizations_in(&self, namespace_chain: &[String])
        -> anyhow::Result<Vec<Authorization>>;

    /// Whether a namespace with the given path exists.
    async fn namespace_exists(&self, namespace: &str) -> anyhow::Result<bool>;
}

/// Optional inputs to a resolution call.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Scope grants to this object in addition to the wildcard scope.
    pub target_id: Option<String>,

    /// Origin address of the caller, checked against authorization subnets
    /// and token network restrictions.
    pub client_ip: Option<IpAddr>,

    /// Restrictions carried by the caller's own token, when it has one.
    pub restrictions: Option<Restrictions>,
}

/// The permission resolution engine.
pub struct Resolver {
    source: Arc<dyn AuthorizationSource>,
}

impl Resolver {
    pub fn new(source: Arc<dyn AuthorizationSource>) -> Self {
        Self { source }
    }

    /// Resolve the permission map granted to `claims` at `namespace`.
    ///
    /// An empty map is a normal outcome: unknown namespaces, unmatched
    /// claims, and out-of-restriction calls all resolve to "no permissions"
    /// rather than an error, so callers cannot probe the namespace tree.
    pub async fn resolve(
        &self,
        claims: &[String],
        namespace: &str,
        options: &ResolveOptions,
    ) -> AuthzResult<PermissionMap> {
        if let Some(restrictions) = &options.restrictions {
            if !restrictions.namespace.is_empty()
                && restrictions.namespace != namespace
                && !is_ancestor_of(&restrictions.namespace, namespace)
            {
                debug!(
                    namespace,
                    restricted = %restrictions.namespace,
                    "target outside token namespace restriction"
                );
                return Ok(PermissionMap::new());
            }
        }

        if namespace != "/" {
            let exists = self
                .source
                .namespace_exists(namespace)
                .await
                .map_err(ResolveError::Source)?;
            if !exists {
                debug!(namespace, "target namespace not found");
                return Ok(PermissionMap::new());
            }
        }

        let chain = ancestor_chain(namespace);
        let records = self
            .source
            .authorizations_in(&chain)
            .await
            .map_err(ResolveError::Source)?;

        let cutoff = hidden_cutoff(&chain, &records);
        let claim_set: HashSet<&str> = claims.iter().map(String::as_str).collect();

        let mut out = PermissionMap::new();
        for record in &records {
            if record.disabled {
                continue;
            }
            let Some(level) = chain
                .iter()
                .position(|candidate| candidate == &record.target_namespace)
            else {
                continue;
            };
            if level < cutoff {
                continue;
            }
            if !subject_matches(&record.subject, &claim_set) {
                continue;
            }
            if !record.subnets.is_empty()
                && !client_ip_in_subnets(options.client_ip, &record.subnets)?
            {
                continue;
            }

            for permission in &record.permissions {
                out.grant(permission, WILDCARD);
                if let Some(target_id) = &options.target_id {
                    out.grant(permission, target_id);
                }
            }
        }

        if let Some(restrictions) = &options.restrictions {
            if !restrictions.permissions.is_empty() {
                out = out.intersect(&PermissionMap::from_names(
                    &restrictions.permissions,
                    options.target_id.as_deref(),
                ));
            }
            if !restrictions.networks.is_empty() {
                let inside = match options.client_ip {
                    Some(ip) => restrictions.networks.iter().any(|net| net.contains(&ip)),
                    None => false,
                };
                if !inside {
                    debug!(namespace, "caller outside token network restriction");
                    return Ok(PermissionMap::new());
                }
            }
        }

        Ok(out)
    }
}

/// Index of the shallowest chain level still allowed to contribute.
///
/// A `hidden` authorization cuts grants declared at strictly shallower
/// levels out of everything strictly below its own target namespace. The
/// leaf level never cuts: a hidden record still lets ancestor grants apply
/// at its own target. With several hidden levels, the deepest strict
/// ancestor wins.
fn hidden_cutoff(chain: &[String], records: &[Authorization]) -> usize {
    let mut cutoff = 0;
    for level in 0..chain.len().saturating_sub(1) {
        if records
            .iter()
            .any(|record| record.hidden && record.target_namespace == chain[level])
        {
            cutoff = level;
        }
    }
    cutoff
}

fn client_ip_in_subnets(client_ip: Option<IpAddr>, subnets: &[String]) -> AuthzResult<bool> {
    let Some(ip) = client_ip else {
        return Ok(false);
    };

    for subnet in subnets {
        let network: IpNet = subnet
            .parse()
            .map_err(|_| ResolveError::InvalidNetwork(subnet.clone()))?;
        if network.contains(&ip) {
            return Ok(true);
        }
    }
    Ok(false)
}
