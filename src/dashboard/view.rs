use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::details::window_start_millis;
use crate::models::PermissionGroupUsageState;
use crate::permissions::PermissionGroup;
use crate::settings::{DetailsToggles, FeatureFlags};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DashboardUiState {
    Loading,
    #[serde(rename_all = "camelCase")]
    Success {
        contains_system_app_usage: bool,
        /// Number of packages that used each group inside the window.
        usage_counts: BTreeMap<PermissionGroup, usize>,
    },
}

pub fn build_dashboard_ui_state(
    state: &PermissionGroupUsageState,
    toggles: &DetailsToggles,
    now_millis: i64,
    features: &FeatureFlags,
) -> DashboardUiState {
    let PermissionGroupUsageState::Success(usages) = state else {
        return DashboardUiState::Loading;
    };

    let start_millis = window_start_millis(toggles.show_7_days, now_millis, features);
    let mut usage_counts: BTreeMap<PermissionGroup, usize> =
        PermissionGroup::DASHBOARD.into_iter().map(|group| (group, 0)).collect();

    let in_window: Vec<_> = usages
        .iter()
        .filter(|usage| usage.last_access_millis > start_millis)
        .collect();

    for usage in in_window
        .iter()
        .filter(|usage| toggles.show_system || usage.is_user_sensitive)
    {
        *usage_counts.entry(usage.permission_group).or_insert(0) += 1;
    }

    DashboardUiState::Success {
        contains_system_app_usage: in_window.iter().any(|usage| !usage.is_user_sensitive),
        usage_counts,
    }
}
