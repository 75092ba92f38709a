use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;

use crate::models::{PackageOpUsage, PermissionGroupUsage, PermissionGroupUsageState};
use crate::permissions::{group_of_op, privacy_dashboard_op_names, usage_group_of_permission, PermissionGroup};
use crate::sensitivity::is_permission_group_user_sensitive;
use crate::settings::FeatureFlags;
use crate::sources::{load_last_access_usages, Collaborators};
use crate::timeline::filters::filter_users_to_show_in_quiet_mode;
use crate::watch::Recompute;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Latest use of each dashboard permission group by each visible package.
#[derive(Clone)]
pub struct GetPermissionGroupUsage {
    op_names: Vec<&'static str>,
    deps: Collaborators,
}

impl GetPermissionGroupUsage {
    pub fn new(features: &FeatureFlags, deps: Collaborators) -> Self {
        Self {
            op_names: privacy_dashboard_op_names(features),
            deps,
        }
    }

    pub fn op_names(&self) -> &[&'static str] {
        &self.op_names
    }

    pub async fn load_and_compute(&self) -> Result<Vec<PermissionGroupUsage>> {
        let usages = load_last_access_usages(self.deps.access_records.as_ref(), &self.op_names).await?;
        Ok(self.compute(usages).await)
    }

    pub async fn compute(&self, usages: Vec<PackageOpUsage>) -> Vec<PermissionGroupUsage> {
        let profiles = self.deps.users.user_profiles_including_current().await;
        let current_users: HashSet<u32> =
            filter_users_to_show_in_quiet_mode(profiles, self.deps.users.as_ref())
                .await
                .into_iter()
                .collect();
        let exempted_packages = self.deps.roles.exempted_packages().await;

        let candidates: Vec<PermissionGroupUsage> = usages
            .iter()
            .filter(|usage| {
                current_users.contains(&usage.user_id)
                    && !exempted_packages.contains(&usage.package_name)
            })
            .flat_map(|usage| self.latest_per_group(usage))
            .collect();

        let checks = join_all(candidates.iter().map(|usage| async move {
            let requesting = self.still_requests_group(usage).await;
            let sensitive = is_permission_group_user_sensitive(
                &usage.package_name,
                usage.permission_group,
                usage.user_id,
                self.deps.permissions.as_ref(),
                self.deps.packages.as_ref(),
            )
            .await;
            (requesting, sensitive)
        }))
        .await;

        let result: Vec<PermissionGroupUsage> = candidates
            .into_iter()
            .zip(checks)
            .filter_map(|(mut usage, (requesting, sensitive))| {
                usage.is_user_sensitive = sensitive;
                requesting.then_some(usage)
            })
            .collect();

        log_debug!(
            "{} packages with op usage -> {} permission group usages",
            usages.len(),
            result.len()
        );
        result
    }

    fn latest_per_group(&self, usage: &PackageOpUsage) -> Vec<PermissionGroupUsage> {
        let mut latest: BTreeMap<PermissionGroup, i64> = BTreeMap::new();
        for op_usage in &usage.op_usages {
            if !self.op_names.contains(&op_usage.op_name.as_str()) {
                continue;
            }
            let Some(group) = group_of_op(&op_usage.op_name) else {
                continue;
            };
            let entry = latest.entry(group).or_insert(op_usage.last_access_millis);
            *entry = (*entry).max(op_usage.last_access_millis);
        }

        latest
            .into_iter()
            .map(|(permission_group, last_access_millis)| PermissionGroupUsage {
                package_name: usage.package_name.clone(),
                user_id: usage.user_id,
                permission_group,
                last_access_millis,
                is_user_sensitive: false,
            })
            .collect()
    }

    async fn still_requests_group(&self, usage: &PermissionGroupUsage) -> bool {
        self.deps
            .packages
            .package_info(&usage.package_name, usage.user_id)
            .await
            .is_some_and(|info| {
                info.requested_permissions
                    .iter()
                    .any(|permission| usage_group_of_permission(permission) == Some(usage.permission_group))
            })
    }
}

#[async_trait]
impl Recompute for GetPermissionGroupUsage {
    type State = PermissionGroupUsageState;

    fn name(&self) -> String {
        "privacy dashboard".to_string()
    }

    fn loading_state(&self) -> PermissionGroupUsageState {
        PermissionGroupUsageState::Loading
    }

    fn watched_ops(&self) -> Vec<String> {
        self.op_names.iter().map(|op| op.to_string()).collect()
    }

    async fn recompute(&self, _now_millis: i64) -> Result<PermissionGroupUsageState> {
        self.load_and_compute()
            .await
            .map(PermissionGroupUsageState::Success)
    }
}
