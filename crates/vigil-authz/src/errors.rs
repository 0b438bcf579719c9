use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// A persisted authorization carries a subnet entry that does not parse
    /// as a CIDR. Validation should have rejected it; surfacing the value
    /// beats silently skipping the record.
    #[error("invalid network '{0}' in authorization subnets")]
    InvalidNetwork(String),

    /// The storage collaborator failed. Propagated unchanged; retry and
    /// backoff policy belong to the collaborator.
    #[error("unable to retrieve authorizations: {0}")]
    Source(#[source] anyhow::Error),
}

pub type AuthzResult<T> = Result<T, ResolveError>;
