//! Entity/action permissions.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity whose actions are full method paths.
pub const URI_ENTITY: &str = "uri";

/// The only action kept in read-only permission sets.
pub const READ_ACTION: &str = "read";

/// A single (entity, action) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    /// Resource kind, e.g. `info` or `swap`
    pub entity: String,
    /// Operation on the resource, e.g. `read`
    pub action: String,
}

/// Ordered, de-duplicated set of permissions.
pub type PermissionSet = BTreeSet<Permission>;

impl Permission {
    /// Create a permission.
    pub fn new(entity: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            action: action.into(),
        }
    }

    /// Permission granting exactly one method.
    pub fn uri(full_method: &str) -> Self {
        Self::new(URI_ENTITY, full_method)
    }

    /// Whether this permission survives read-only filtering.
    pub fn is_read_only(&self) -> bool {
        self.action == READ_ACTION
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.action)
    }
}

/// First required permission not covered by `granted`.
///
/// A grant of the method's own URI permission covers everything.
pub fn missing_permission<'a>(
    granted: &PermissionSet,
    required: &'a [Permission],
    full_method: &str,
) -> Option<&'a Permission> {
    if granted.contains(&Permission::uri(full_method)) {
        return None;
    }
    required.iter().find(|p| !granted.contains(*p))
}
