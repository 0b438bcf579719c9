//! The permission map and its set algebra.
//!
//! A permission map associates permission names with object scopes: the
//! wildcard scope `*` means "any object", a concrete scope is a single
//! object identifier. `*` is honored as a wildcard on both axes by the
//! algebra below, which is what lets a token restricted to `authorization`
//! still act on a map resolved for a specific object.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Wildcard permission name or object scope.
pub const WILDCARD: &str = "*";

/// `permission name → object scope → granted`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMap(HashMap<String, HashMap<String, bool>>);

impl PermissionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map out of bare permission names, as used for token
    /// restriction lists: every name is granted on the wildcard scope and,
    /// when a target object is in play, on that object too.
    pub fn from_names(names: &[String], target_id: Option<&str>) -> Self {
        let mut map = Self::new();
        for name in names {
            map.grant(name, WILDCARD);
            if let Some(target_id) = target_id {
                map.grant(name, target_id);
            }
        }
        map
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Record a grant of `permission` on `scope`.
    pub fn grant(&mut self, permission: &str, scope: &str) {
        self.0
            .entry(permission.to_string())
            .or_default()
            .insert(scope.to_string(), true);
    }

    /// Fold another map into this one. Union is commutative, so the order
    /// records are folded in never changes the result.
    pub fn union(&mut self, other: &PermissionMap) {
        for (permission, scopes) in &other.0 {
            let entry = self.0.entry(permission.clone()).or_default();
            for (scope, granted) in scopes {
                if *granted {
                    entry.insert(scope.clone(), true);
                }
            }
        }
    }

    /// True when the permission name is present, directly or through a
    /// wildcard entry.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.0.contains_key(permission) || self.0.contains_key(WILDCARD)
    }

    /// Point query: is `permission` granted on `scope`?
    pub fn is_allowed(&self, permission: &str, scope: &str) -> bool {
        let granted = |scopes: &HashMap<String, bool>| {
            scopes.get(WILDCARD).copied().unwrap_or(false)
                || scopes.get(scope).copied().unwrap_or(false)
        };

        if self.0.get(WILDCARD).is_some_and(granted) {
            return true;
        }
        self.0.get(permission).is_some_and(granted)
    }

    /// True when `other` is equal to or lesser than this map: every
    /// permission and scope of `other` must be covered here, directly or
    /// through wildcards.
    pub fn contains(&self, other: &PermissionMap) -> bool {
        if self.0.is_empty() {
            return false;
        }

        let star = self.0.get(WILDCARD);

        for (permission, scopes) in &other.0 {
            let own = self.0.get(permission);
            if own.is_none() && star.map_or(true, |scopes| scopes.is_empty()) {
                return false;
            }

            for scope in scopes.keys() {
                let covered = |source: Option<&HashMap<String, bool>>, key: &str| {
                    source
                        .and_then(|scopes| scopes.get(key))
                        .copied()
                        .unwrap_or(false)
                };

                if !covered(own, scope) && !covered(star, scope) {
                    if !covered(own, WILDCARD) && !covered(star, WILDCARD) {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Intersection with another map, honoring `*` wildcards on either side
    /// for both permission names and scopes. Used to narrow a resolved map
    /// to a token's restricted permissions.
    pub fn intersect(&self, other: &PermissionMap) -> PermissionMap {
        if self.0.is_empty() || other.0.is_empty() {
            return PermissionMap::new();
        }

        let mut candidate = self.0.clone();

        // A wildcard permission on the receiver side stands for anything the
        // other side names.
        if candidate.remove(WILDCARD).is_some() {
            for (permission, scopes) in &other.0 {
                candidate
                    .entry(permission.clone())
                    .or_insert_with(|| scopes.clone());
            }
        }

        let other_star = other.0.get(WILDCARD);

        let mut out = HashMap::new();
        for (permission, mut scopes) in candidate {
            let mut allowed = match other.0.get(&permission) {
                Some(scopes) => scopes.clone(),
                None => {
                    if other_star.is_none() {
                        continue;
                    }
                    HashMap::new()
                }
            };
            if let Some(star) = other_star {
                for (scope, granted) in star {
                    allowed.insert(scope.clone(), *granted);
                }
            }

            // A wildcard scope on the candidate side collapses to whatever
            // the other side allows.
            if scopes.get(WILDCARD).copied().unwrap_or(false) {
                out.insert(permission, allowed);
                continue;
            }

            scopes.retain(|scope, granted| {
                *granted
                    && (allowed.get(scope).copied().unwrap_or(false)
                        || allowed.get(WILDCARD).copied().unwrap_or(false))
            });
            if !scopes.is_empty() {
                out.insert(permission, scopes);
            }
        }

        PermissionMap(out)
    }

    /// The underlying map, for serialization by the caller.
    pub fn as_map(&self) -> &HashMap<String, HashMap<String, bool>> {
        &self.0
    }
}
