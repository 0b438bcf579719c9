//! Token restriction composition.
//!
//! At issuance time a caller may ask for a token narrower than its actual
//! entitlement: a deeper namespace, fewer networks, fewer permissions, a
//! shorter validity. Composition only ever shrinks — a request outside the
//! granted envelope is accepted syntactically and produces a token that is
//! unusable where the caller has no rights, rather than a hard error that
//! would leak which namespaces exist.

use std::time::Duration;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vigil_model::namespace::is_ancestor_of;

use crate::permissions::PermissionMap;

/// Caller-supplied narrowing, carried by an issuance request or embedded in
/// a previously issued token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrictions {
    /// Namespace the token is confined to. Empty means unrestricted.
    #[serde(default)]
    pub namespace: String,

    /// Permission names the token is confined to. Empty means unrestricted.
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Networks the token may be used from. Empty means unrestricted.
    #[serde(default)]
    pub networks: Vec<IpNet>,
}

impl Restrictions {
    pub fn is_empty(&self) -> bool {
        self.namespace.is_empty() && self.permissions.is_empty() && self.networks.is_empty()
    }
}

/// The narrowed parameters handed to the token signer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposedRestrictions {
    pub namespace: String,
    pub networks: Vec<IpNet>,
    pub permissions: Vec<String>,
    pub validity: Duration,
}

/// Compose the final token restrictions from what resolution granted and
/// what the caller requested.
pub fn compose(
    resolved: &PermissionMap,
    granted_namespace: &str,
    granted_networks: &[IpNet],
    requested: &Restrictions,
    requested_validity: Duration,
    max_validity: Duration,
) -> ComposedRestrictions {
    ComposedRestrictions {
        namespace: compose_namespace(granted_namespace, &requested.namespace),
        networks: compose_networks(granted_networks, &requested.networks),
        permissions: compose_permissions(resolved, &requested.permissions),
        validity: requested_validity.min(max_validity),
    }
}

fn compose_namespace(granted: &str, requested: &str) -> String {
    if requested.is_empty() {
        return granted.to_string();
    }
    if requested != granted && !is_ancestor_of(granted, requested) {
        // Accepted as requested: the token fails closed by attrition
        // outside the granted namespace.
        debug!(granted, requested, "namespace restriction outside grant");
    }
    requested.to_string()
}

fn compose_networks(granted: &[IpNet], requested: &[IpNet]) -> Vec<IpNet> {
    if requested.is_empty() {
        return granted.to_vec();
    }
    if granted.is_empty() {
        return requested.to_vec();
    }
    requested
        .iter()
        .filter(|requested_net| granted.iter().any(|net| net.contains(*requested_net)))
        .copied()
        .collect()
}

fn compose_permissions(resolved: &PermissionMap, requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| resolved.has_permission(name))
        .cloned()
        .collect()
}
