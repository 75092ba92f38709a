use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Platform-tracked permission flags for one (permission, package, user).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionFlags(pub u32);

impl PermissionFlags {
    pub const NONE: PermissionFlags = PermissionFlags(0);
    pub const REVOKED_COMPAT: PermissionFlags = PermissionFlags(1 << 3);
    pub const USER_SENSITIVE_WHEN_GRANTED: PermissionFlags = PermissionFlags(1 << 8);
    pub const USER_SENSITIVE_WHEN_DENIED: PermissionFlags = PermissionFlags(1 << 9);

    pub fn contains(self, other: PermissionFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

impl BitOr for PermissionFlags {
    type Output = PermissionFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        PermissionFlags(self.0 | rhs.0)
    }
}

/// Per-package flags of a requested permission, as reported in package info.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestedPermissionFlags(pub u32);

impl RequestedPermissionFlags {
    pub const NONE: RequestedPermissionFlags = RequestedPermissionFlags(0);
    pub const GRANTED: RequestedPermissionFlags = RequestedPermissionFlags(1 << 1);

    pub fn is_granted(self) -> bool {
        self.0 & Self::GRANTED.0 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_requires_every_bit() {
        let flags = PermissionFlags::USER_SENSITIVE_WHEN_GRANTED | PermissionFlags::REVOKED_COMPAT;
        assert!(flags.contains(PermissionFlags::USER_SENSITIVE_WHEN_GRANTED));
        assert!(flags.contains(PermissionFlags::REVOKED_COMPAT));
        assert!(!flags.contains(PermissionFlags::USER_SENSITIVE_WHEN_DENIED));
        assert!(!flags.contains(PermissionFlags::NONE));
    }
}
