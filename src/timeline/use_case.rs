use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;

use crate::models::{PackageAccessBatch, TimelineEntry, TimelineState};
use crate::permissions::{op_names_for_group, PermissionGroup};
use crate::sensitivity::is_permission_group_user_sensitive;
use crate::settings::FeatureFlags;
use crate::sources::{history_window_millis, load_discrete_accesses, Collaborators};
use crate::watch::Recompute;

use super::aggregate::build_timeline_entries;
use super::attribution::group_by_attribution_label;
use super::cluster::create_access_clusters;
use super::config::ClusterConfig;
use super::filters::{
    filter_packages_not_requesting_permission, filter_users_to_show_in_quiet_mode,
    retain_visible_packages,
};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Reads discrete history for one permission group and turns it into the
/// timeline rows of the permission usage details page.
#[derive(Clone)]
pub struct PermissionGroupUsageDetails {
    group: PermissionGroup,
    op_names: Vec<&'static str>,
    features: FeatureFlags,
    cluster_config: ClusterConfig,
    deps: Collaborators,
}

impl PermissionGroupUsageDetails {
    pub fn new(group: PermissionGroup, features: FeatureFlags, deps: Collaborators) -> Result<Self> {
        let op_names = op_names_for_group(group, &features)?;
        Ok(Self {
            group,
            op_names,
            features,
            cluster_config: ClusterConfig::from_features(&features),
            deps,
        })
    }

    pub fn permission_group(&self) -> PermissionGroup {
        self.group
    }

    pub fn op_names(&self) -> &[&'static str] {
        &self.op_names
    }

    pub fn features(&self) -> &FeatureFlags {
        &self.features
    }

    pub async fn load_and_compute(&self, now_millis: i64) -> Result<Vec<TimelineEntry>> {
        let begin_millis = now_millis - history_window_millis(&self.features);
        let batches = load_discrete_accesses(
            self.deps.access_records.as_ref(),
            &self.op_names,
            begin_millis,
            now_millis,
        )
        .await?;
        Ok(self.compute(batches).await)
    }

    /// Filter, classify, group and cluster a snapshot of raw batches.
    pub async fn compute(&self, batches: Vec<PackageAccessBatch>) -> Vec<TimelineEntry> {
        let raw_count = batches.len();

        let profiles = self.deps.users.user_profiles_including_current().await;
        let current_users: HashSet<u32> =
            filter_users_to_show_in_quiet_mode(profiles, self.deps.users.as_ref())
                .await
                .into_iter()
                .collect();
        let exempted_packages = self.deps.roles.exempted_packages().await;

        let visible = retain_visible_packages(batches, &current_users, &exempted_packages);
        let requesting =
            filter_packages_not_requesting_permission(visible, self.group, self.deps.packages.as_ref())
                .await;
        let classified = self.attach_sensitivity(requesting).await;
        let attributed = self.group_by_attribution(classified).await;
        let clusters = create_access_clusters(&attributed, &self.cluster_config);
        let entries = build_timeline_entries(&clusters);

        log_debug!(
            "{}: {} raw batches -> {} attributed batches -> {} timeline entries",
            self.group,
            raw_count,
            attributed.len(),
            entries.len()
        );
        entries
    }

    async fn attach_sensitivity(&self, batches: Vec<PackageAccessBatch>) -> Vec<PackageAccessBatch> {
        let sensitivity = join_all(batches.iter().map(|batch| {
            is_permission_group_user_sensitive(
                &batch.package_name,
                self.group,
                batch.user_id,
                self.deps.permissions.as_ref(),
                self.deps.packages.as_ref(),
            )
        }))
        .await;

        batches
            .into_iter()
            .zip(sensitivity)
            .map(|(mut batch, is_user_sensitive)| {
                batch.is_user_sensitive = is_user_sensitive;
                batch
            })
            .collect()
    }

    async fn group_by_attribution(&self, batches: Vec<PackageAccessBatch>) -> Vec<PackageAccessBatch> {
        let infos = join_all(
            batches
                .iter()
                .map(|batch| self.deps.packages.attribution_info(&batch.package_name, batch.user_id)),
        )
        .await;

        batches
            .into_iter()
            .zip(infos)
            .flat_map(|(batch, info)| group_by_attribution_label(batch, info.as_ref()))
            .collect()
    }
}

#[async_trait]
impl Recompute for PermissionGroupUsageDetails {
    type State = TimelineState;

    fn name(&self) -> String {
        format!("timeline {}", self.group)
    }

    fn loading_state(&self) -> TimelineState {
        TimelineState::Loading
    }

    fn watched_ops(&self) -> Vec<String> {
        self.op_names.iter().map(|op| op.to_string()).collect()
    }

    async fn recompute(&self, now_millis: i64) -> Result<TimelineState> {
        self.load_and_compute(now_millis)
            .await
            .map(TimelineState::Success)
    }
}
