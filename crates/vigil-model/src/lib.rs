//! Record types persisted by the vigil authorization backend.
//!
//! One module per entity, mirroring the administrative API surface:
//! namespaces, authorizations, and the identity source records that describe
//! where claims may be minted from. Every record carries an optional shard
//! key assigned once at creation (see `vigil-shard`), and the mutable ones
//! come with a sparse projection used for partial updates.
//!
//! Model-level validation (subject expression grammar, CIDR lists, namespace
//! names) lives in [`validation`] and is called by the persistence layer
//! before a record is accepted.

use thiserror::Error;

pub mod authorization;
pub mod identity;
pub mod namespace;
pub mod source;
pub mod validation;

pub use authorization::{Authorization, SparseAuthorization};
pub use identity::{Identity, identity_for, registry};
pub use namespace::{Namespace, SparseNamespace};
pub use source::{
    HttpSource, LdapSource, MtlsSource, OidcSource, SparseLdapSource, SparseMtlsSource,
    SparseVigilSource, VigilSource,
};

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    /// A user-supplied field failed validation. Reported with the attribute
    /// name and the rule that was violated; never retried.
    #[error("validation error on '{attribute}': {message}")]
    Validation { attribute: String, message: String },

    /// A caller bug: patching across identities, renaming an immutable
    /// field, or touching a shard key after creation.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl ModelError {
    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}
