//! Deterministic shard-key assignment for persisted policy records.
//!
//! Every shardable record carries a `(zone, zhash)` pair that the storage
//! adapter uses to route reads and writes. The pair is computed exactly once,
//! when the record is first persisted, from the record's *natural key* — a
//! stable string derived from the fields that identify the record for
//! routing purposes. Recomputing a shard key after creation would silently
//! reroute the record, so a second assignment is a hard error.
//!
//! Records expose their natural key through the [`Shardable`] capability
//! trait; the assignor never branches on concrete record types, which keeps
//! new record kinds additive.

use std::io::Cursor;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mask clearing the top bit of a 64-bit hash so the value stays
/// non-negative in a signed 64-bit integer.
const ZHASH_MASK: u64 = 0x7FFF_FFFF_FFFF_FFFF;

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("shard key already assigned (zone {zone}, zhash {zhash})")]
    AlreadyAssigned { zone: i32, zhash: i64 },
    #[error("record is missing natural key field '{0}'")]
    MissingNaturalKey(&'static str),
}

pub type ShardResult<T> = Result<T, ShardError>;

/// Routing key attached to every shardable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardKey {
    pub zone: i32,
    pub zhash: i64,
}

/// Capability a record implements to participate in shard routing.
///
/// Sparse projections of a record must return the identical natural key as
/// the full record when their natural-key fields are set, and
/// [`ShardError::MissingNaturalKey`] when they are not.
pub trait Shardable {
    /// Identity name of the record, used for zone selection.
    fn identity_name(&self) -> &'static str;

    /// Stable string the routing hash is derived from.
    fn natural_key(&self) -> ShardResult<String>;

    /// The shard key currently attached to the record, if any.
    fn shard_key(&self) -> Option<ShardKey>;

    /// Attach a shard key to the record.
    fn set_shard_key(&mut self, key: ShardKey);
}

/// Zone for the given identity.
///
/// Single-zone deployment today. A multi-zone placement policy changes this
/// function only; call sites stay as they are.
pub fn zone_for(_identity: &str) -> i32 {
    0
}

/// 63-bit MurmurHash3 of the given natural key.
pub fn zhash(natural_key: &str) -> i64 {
    let digest = murmur3::murmur3_x64_128(&mut Cursor::new(natural_key.as_bytes()), 0)
        .expect("reading from an in-memory cursor");
    (digest as u64 & ZHASH_MASK) as i64
}

/// Compute and attach the shard key for a freshly created record.
///
/// Must be called exactly once, as part of the record's creation; a record
/// that already carries a shard key is rejected with
/// [`ShardError::AlreadyAssigned`].
pub fn assign(record: &mut dyn Shardable) -> ShardResult<ShardKey> {
    if let Some(existing) = record.shard_key() {
        return Err(ShardError::AlreadyAssigned {
            zone: existing.zone,
            zhash: existing.zhash,
        });
    }

    let key = ShardKey {
        zone: zone_for(record.identity_name()),
        zhash: zhash(&record.natural_key()?),
    };
    record.set_shard_key(key);

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe {
        name: String,
        key: Option<ShardKey>,
    }

    impl Shardable for Probe {
        fn identity_name(&self) -> &'static str {
            "probe"
        }

        fn natural_key(&self) -> ShardResult<String> {
            if self.name.is_empty() {
                return Err(ShardError::MissingNaturalKey("name"));
            }
            Ok(self.name.clone())
        }

        fn shard_key(&self) -> Option<ShardKey> {
            self.key
        }

        fn set_shard_key(&mut self, key: ShardKey) {
            self.key = Some(key);
        }
    }

    #[test]
    fn zhash_is_deterministic() {
        assert_eq!(zhash("/acme/prod"), zhash("/acme/prod"));
        assert_ne!(zhash("/acme/prod"), zhash("/acme/dev"));
    }

    #[test]
    fn zhash_is_non_negative() {
        for input in ["", "/", "/acme", "ns:name", "a-long-natural-key-value"] {
            assert!(zhash(input) >= 0, "zhash({input:?}) must be non-negative");
        }
    }

    #[test]
    fn assign_sets_zone_and_hash() {
        let mut probe = Probe {
            name: "/acme".to_string(),
            key: None,
        };
        let key = assign(&mut probe).expect("assign");
        assert_eq!(key.zone, 0);
        assert_eq!(key.zhash, zhash("/acme"));
        assert_eq!(probe.shard_key(), Some(key));
    }

    #[test]
    fn assign_twice_is_an_invariant_violation() {
        let mut probe = Probe {
            name: "/acme".to_string(),
            key: None,
        };
        assign(&mut probe).expect("first assign");
        let err = assign(&mut probe).expect_err("second assign");
        assert!(matches!(err, ShardError::AlreadyAssigned { .. }));
    }

    #[test]
    fn assign_requires_the_natural_key() {
        let mut probe = Probe {
            name: String::new(),
            key: None,
        };
        let err = assign(&mut probe).expect_err("missing key");
        assert!(matches!(err, ShardError::MissingNaturalKey("name")));
        assert!(probe.shard_key().is_none());
    }
}
