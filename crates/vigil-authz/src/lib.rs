//! The vigil authorization engine.
//!
//! # Purpose
//! Turns a verified claim set into a concrete permission map, and narrows
//! that map into token restriction parameters at issuance time.
//!
//! # How it fits
//! The REST layer authenticates a caller, collects its claims, and calls
//! [`Resolver::resolve`] for the "what can I do here" endpoints. The
//! token-issuance endpoint then runs [`restrictions::compose`] over the
//! resolved map before handing the result to the (external) token signer.
//! Storage is reached exclusively through the [`AuthorizationSource`]
//! collaborator trait.
//!
//! # Key invariants
//! - Resolution is a set union: record order never changes the result, and
//!   an empty result is a normal outcome, not an error.
//! - Restrictions only ever narrow an entitlement, never widen it.

pub mod config;
pub mod errors;
pub mod permissions;
pub mod resolver;
pub mod restrictions;
pub mod subject;

pub use config::TokenPolicy;
pub use errors::{AuthzResult, ResolveError};
pub use permissions::PermissionMap;
pub use resolver::{AuthorizationSource, ResolveOptions, Resolver};
pub use restrictions::{ComposedRestrictions, Restrictions, compose};
pub use subject::subject_matches;
