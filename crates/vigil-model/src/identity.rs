//! Static identity metadata for every persisted record type.
//!
//! The registry is an immutable, process-lifetime table; the persistence
//! layer uses it to route records by identity name and the shard assignor
//! uses it for zone selection.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;

/// Identity of a record type, as registered with the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    pub name: &'static str,
    pub category: &'static str,
}

pub const NAMESPACE_IDENTITY: Identity = Identity {
    name: "namespace",
    category: "namespaces",
};

pub const AUTHORIZATION_IDENTITY: Identity = Identity {
    name: "authorization",
    category: "authorizations",
};

pub const MTLS_SOURCE_IDENTITY: Identity = Identity {
    name: "mtlssource",
    category: "mtlssources",
};

pub const LDAP_SOURCE_IDENTITY: Identity = Identity {
    name: "ldapsource",
    category: "ldapsources",
};

pub const VIGIL_SOURCE_IDENTITY: Identity = Identity {
    name: "vigilsource",
    category: "vigilsources",
};

pub const OIDC_SOURCE_IDENTITY: Identity = Identity {
    name: "oidcsource",
    category: "oidcsources",
};

pub const HTTP_SOURCE_IDENTITY: Identity = Identity {
    name: "httpsource",
    category: "httpsources",
};

static REGISTRY: LazyLock<HashMap<&'static str, Identity>> = LazyLock::new(|| {
    [
        NAMESPACE_IDENTITY,
        AUTHORIZATION_IDENTITY,
        MTLS_SOURCE_IDENTITY,
        LDAP_SOURCE_IDENTITY,
        VIGIL_SOURCE_IDENTITY,
        OIDC_SOURCE_IDENTITY,
        HTTP_SOURCE_IDENTITY,
    ]
    .into_iter()
    .map(|identity| (identity.name, identity))
    .collect()
});

/// The full identity table.
pub fn registry() -> &'static HashMap<&'static str, Identity> {
    &REGISTRY
}

/// Look up an identity by its registered name.
pub fn identity_for(name: &str) -> Option<Identity> {
    REGISTRY.get(name).copied()
}
