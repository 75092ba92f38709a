//! Decides whether a package's use of a permission group is shown by
//! default or only behind the "show system" toggle.

use crate::permissions::{group_of_platform_permission, PermissionFlags, PermissionGroup};
use crate::sources::{PackageRepository, PermissionRepository};

pub const TELECOM_PACKAGE: &str = "com.android.server.telecom";

pub async fn is_permission_group_user_sensitive(
    package_name: &str,
    group: PermissionGroup,
    user_id: u32,
    permission_repository: &dyn PermissionRepository,
    package_repository: &dyn PackageRepository,
) -> bool {
    // Telecom touches camera and microphone as part of every call.
    if is_telecom_package(package_name, group) {
        return false;
    }

    let Some(package_info) = package_repository.package_info(package_name, user_id).await else {
        return false;
    };

    if !package_info.is_system {
        return true;
    }

    for (index, permission) in package_info.requested_permissions.iter().enumerate() {
        if group_of_platform_permission(permission) != Some(group) {
            continue;
        }

        let permission_flags = permission_repository
            .permission_flags(permission, package_name, user_id)
            .await;
        let is_granted = package_info.requested_flags_at(index).is_granted()
            && !permission_flags.contains(PermissionFlags::REVOKED_COMPAT);

        if is_permission_user_sensitive(is_granted, permission_flags) {
            return true;
        }
    }

    false
}

fn is_permission_user_sensitive(is_granted: bool, flags: PermissionFlags) -> bool {
    if is_granted {
        flags.contains(PermissionFlags::USER_SENSITIVE_WHEN_GRANTED)
    } else {
        flags.contains(PermissionFlags::USER_SENSITIVE_WHEN_DENIED)
    }
}

fn is_telecom_package(package_name: &str, group: PermissionGroup) -> bool {
    package_name == TELECOM_PACKAGE
        && matches!(group, PermissionGroup::Camera | PermissionGroup::Microphone)
}
