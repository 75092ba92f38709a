use std::collections::HashSet;

use futures::future::join_all;

use crate::models::PackageAccessBatch;
use crate::permissions::{usage_group_of_permission, PermissionGroup};
use crate::sources::{PackageRepository, UserRepository};

/// Drop profiles in quiet mode unless they opt into being shown anyway.
pub async fn filter_users_to_show_in_quiet_mode(
    users: Vec<u32>,
    user_repository: &dyn UserRepository,
) -> Vec<u32> {
    let visibility = join_all(users.iter().map(|&user_id| async move {
        let quiet = user_repository.is_quiet_mode_enabled(user_id).await;
        let show_anyway = user_repository.should_show_in_quiet_mode(user_id).await;
        !quiet || show_anyway
    }))
    .await;

    users
        .into_iter()
        .zip(visibility)
        .filter_map(|(user_id, visible)| visible.then_some(user_id))
        .collect()
}

/// Keep batches of shown profiles whose package is not role-exempted.
pub fn retain_visible_packages(
    batches: Vec<PackageAccessBatch>,
    current_users: &HashSet<u32>,
    exempted_packages: &HashSet<String>,
) -> Vec<PackageAccessBatch> {
    batches
        .into_iter()
        .filter(|batch| {
            current_users.contains(&batch.user_id)
                && !exempted_packages.contains(&batch.package_name)
        })
        .collect()
}

/// Drop packages that no longer request any permission of `group`, or are gone.
pub async fn filter_packages_not_requesting_permission(
    batches: Vec<PackageAccessBatch>,
    group: PermissionGroup,
    package_repository: &dyn PackageRepository,
) -> Vec<PackageAccessBatch> {
    let requesting = join_all(batches.iter().map(|batch| async move {
        package_repository
            .package_info(&batch.package_name, batch.user_id)
            .await
            .map(|info| {
                info.requested_permissions
                    .iter()
                    .any(|permission| usage_group_of_permission(permission) == Some(group))
            })
            .unwrap_or(false)
    }))
    .await;

    batches
        .into_iter()
        .zip(requesting)
        .filter_map(|(batch, keep)| keep.then_some(batch))
        .collect()
}
