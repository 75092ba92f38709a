//! Rows of the permission usage details page, derived from a timeline state
//! and the page's display toggles.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{TimelineEntry, TimelineState};
use crate::permissions::{ops, PermissionGroup};
use crate::settings::{DetailsToggles, FeatureFlags};

pub const TIME_24_HOURS_MS: i64 = 24 * 60 * 60 * 1000;
pub const TIME_7_DAYS_MS: i64 = 7 * TIME_24_HOURS_MS;

/// Earliest end time still shown. Clamped at the epoch.
pub fn window_start_millis(show_7_days: bool, now_millis: i64, features: &FeatureFlags) -> i64 {
    let window = if features.seven_day_toggle_enabled && show_7_days {
        TIME_7_DAYS_MS
    } else {
        TIME_24_HOURS_MS
    };
    (now_millis - window).max(0)
}

/// One rendered access episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRow {
    pub user_id: u32,
    pub package_name: String,
    pub permission_group: PermissionGroup,
    pub access_start_millis: i64,
    pub access_end_millis: i64,
    pub duration_millis: Option<i64>,
    pub attribution_label: Option<String>,
    pub showing_attribution_label: bool,
    pub attribution_tags: BTreeSet<String>,
    /// Set only when both the proxy package and its user are known.
    pub proxy: Option<(String, u32)>,
    pub is_emergency_location_access: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum UsageDetailsUiState {
    Loading,
    #[serde(rename_all = "camelCase")]
    Success {
        rows: Vec<AccessRow>,
        /// Whether any entry, shown or not, belongs to a non-sensitive usage.
        contains_system_usages: bool,
    },
}

pub fn build_usage_details(
    state: &TimelineState,
    group: PermissionGroup,
    toggles: &DetailsToggles,
    now_millis: i64,
    features: &FeatureFlags,
) -> UsageDetailsUiState {
    let TimelineState::Success(entries) = state else {
        return UsageDetailsUiState::Loading;
    };

    let start_millis = window_start_millis(toggles.show_7_days, now_millis, features);
    let contains_system_usages = entries.iter().any(|entry| !entry.is_user_sensitive);

    let mut rows: Vec<AccessRow> = entries
        .iter()
        .filter(|entry| entry.access_end_millis > start_millis)
        .filter(|entry| toggles.show_system || entry.is_user_sensitive)
        .map(|entry| access_row(entry, group, features))
        .collect();
    rows.sort_by(|a, b| b.access_start_millis.cmp(&a.access_start_millis));

    UsageDetailsUiState::Success {
        rows,
        contains_system_usages,
    }
}

fn access_row(entry: &TimelineEntry, group: PermissionGroup, features: &FeatureFlags) -> AccessRow {
    let proxy = match (&entry.proxy_package_name, entry.proxy_user_id) {
        (Some(package_name), Some(user_id)) => Some((package_name.clone(), user_id)),
        _ => None,
    };

    AccessRow {
        user_id: entry.user_id,
        package_name: entry.package_name.clone(),
        permission_group: group,
        access_start_millis: entry.access_start_millis,
        access_end_millis: entry.access_end_millis,
        duration_millis: (entry.duration_millis > 0).then_some(entry.duration_millis),
        attribution_label: entry.attribution_label.clone(),
        showing_attribution_label: entry
            .attribution_label
            .as_deref()
            .is_some_and(|label| !label.is_empty()),
        attribution_tags: entry.attribution_tags.clone().unwrap_or_default(),
        proxy,
        is_emergency_location_access: features.location_bypass_enabled
            && entry.op_names.contains(ops::EMERGENCY_LOCATION),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ONE_MINUTE_MS;

    const NOW: i64 = 30 * TIME_24_HOURS_MS;
    const HOUR: i64 = 60 * ONE_MINUTE_MS;

    fn entry(package: &str, start: i64, end: i64, sensitive: bool) -> TimelineEntry {
        TimelineEntry {
            package_name: package.to_string(),
            user_id: 0,
            op_names: BTreeSet::from([ops::FINE_LOCATION.to_string()]),
            access_start_millis: start,
            access_end_millis: end,
            duration_millis: end - start + ONE_MINUTE_MS,
            is_user_sensitive: sensitive,
            attribution_label: None,
            attribution_tags: Some(BTreeSet::new()),
            proxy_package_name: None,
            proxy_user_id: None,
        }
    }

    fn rows(state: UsageDetailsUiState) -> (Vec<AccessRow>, bool) {
        match state {
            UsageDetailsUiState::Success {
                rows,
                contains_system_usages,
            } => (rows, contains_system_usages),
            UsageDetailsUiState::Loading => panic!("expected rows"),
        }
    }

    fn build(entries: Vec<TimelineEntry>, toggles: DetailsToggles, features: FeatureFlags) -> (Vec<AccessRow>, bool) {
        rows(build_usage_details(
            &TimelineState::Success(entries),
            PermissionGroup::Location,
            &toggles,
            NOW,
            &features,
        ))
    }

    #[test]
    fn loading_passes_through() {
        let state = build_usage_details(
            &TimelineState::Loading,
            PermissionGroup::Camera,
            &DetailsToggles::default(),
            NOW,
            &FeatureFlags::default(),
        );
        assert_eq!(state, UsageDetailsUiState::Loading);
    }

    #[test]
    fn window_depends_on_toggle_and_feature() {
        let features = FeatureFlags::default();
        assert_eq!(window_start_millis(false, NOW, &features), NOW - TIME_24_HOURS_MS);
        assert_eq!(window_start_millis(true, NOW, &features), NOW - TIME_7_DAYS_MS);

        let no_toggle = FeatureFlags {
            seven_day_toggle_enabled: false,
            ..FeatureFlags::default()
        };
        assert_eq!(window_start_millis(true, NOW, &no_toggle), NOW - TIME_24_HOURS_MS);
        assert_eq!(window_start_millis(true, HOUR, &features), 0);
    }

    #[test]
    fn entries_outside_window_are_dropped() {
        let entries = vec![
            entry("com.recent", NOW - 2 * HOUR, NOW - HOUR, true),
            entry("com.yesterday", NOW - 30 * HOUR, NOW - 26 * HOUR, true),
            // Ends exactly at the window start.
            entry("com.boundary", NOW - 25 * HOUR, NOW - 24 * HOUR, true),
        ];

        let (day, _) = build(entries.clone(), DetailsToggles::default(), FeatureFlags::default());
        let names: Vec<&str> = day.iter().map(|r| r.package_name.as_str()).collect();
        assert_eq!(names, vec!["com.recent"]);

        let week = DetailsToggles {
            show_7_days: true,
            ..DetailsToggles::default()
        };
        let (rows, _) = build(entries, week, FeatureFlags::default());
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn system_usages_hidden_unless_toggled_but_always_reported() {
        let entries = vec![
            entry("com.app", NOW - 2 * HOUR, NOW - HOUR, true),
            entry("com.android.system", NOW - 3 * HOUR, NOW - 2 * HOUR, false),
            // Outside the window still counts toward the system flag.
            entry("com.android.old", NOW - 50 * HOUR, NOW - 49 * HOUR, false),
        ];

        let (hidden, contains_system) = build(entries.clone(), DetailsToggles::default(), FeatureFlags::default());
        assert_eq!(hidden.len(), 1);
        assert!(contains_system);

        let show_system = DetailsToggles {
            show_system: true,
            ..DetailsToggles::default()
        };
        let (shown, _) = build(entries, show_system, FeatureFlags::default());
        assert_eq!(shown.len(), 2);
    }

    #[test]
    fn rows_are_newest_first() {
        let entries = vec![
            entry("com.first", NOW - 5 * HOUR, NOW - 5 * HOUR, true),
            entry("com.third", NOW - HOUR, NOW - HOUR, true),
            entry("com.second", NOW - 3 * HOUR, NOW - 3 * HOUR, true),
        ];
        let (rows, contains_system) = build(entries, DetailsToggles::default(), FeatureFlags::default());
        let names: Vec<&str> = rows.iter().map(|r| r.package_name.as_str()).collect();
        assert_eq!(names, vec!["com.third", "com.second", "com.first"]);
        assert!(!contains_system);
    }

    #[test]
    fn row_carries_label_tags_proxy_and_duration() {
        let mut labeled = entry("com.maps", NOW - HOUR, NOW - HOUR, true);
        labeled.attribution_label = Some("Navigation".into());
        labeled.attribution_tags = Some(BTreeSet::from(["nav".to_string()]));
        labeled.proxy_package_name = Some("com.assistant".into());
        labeled.proxy_user_id = Some(0);

        let mut unlabeled = entry("com.other", NOW - 2 * HOUR, NOW - 2 * HOUR, true);
        unlabeled.attribution_label = Some(String::new());
        unlabeled.attribution_tags = None;
        unlabeled.proxy_package_name = Some("com.assistant".into());
        unlabeled.duration_millis = 0;

        let (rows, _) = build(vec![labeled, unlabeled], DetailsToggles::default(), FeatureFlags::default());

        assert!(rows[0].showing_attribution_label);
        assert_eq!(rows[0].attribution_tags, BTreeSet::from(["nav".to_string()]));
        assert_eq!(rows[0].proxy, Some(("com.assistant".to_string(), 0)));
        assert_eq!(rows[0].duration_millis, Some(ONE_MINUTE_MS));

        assert!(!rows[1].showing_attribution_label);
        assert!(rows[1].attribution_tags.is_empty());
        assert_eq!(rows[1].proxy, None);
        assert_eq!(rows[1].duration_millis, None);
    }

    #[test]
    fn emergency_location_requires_bypass_feature() {
        let mut emergency = entry("com.android.phone", NOW - HOUR, NOW - HOUR, true);
        emergency.op_names = BTreeSet::from([ops::EMERGENCY_LOCATION.to_string()]);

        let (rows, _) = build(vec![emergency.clone()], DetailsToggles::default(), FeatureFlags::default());
        assert!(!rows[0].is_emergency_location_access);

        let bypass = FeatureFlags {
            location_bypass_enabled: true,
            ..FeatureFlags::default()
        };
        let (rows, _) = build(vec![emergency], DetailsToggles::default(), bypass);
        assert!(rows[0].is_emergency_location_access);
    }
}
