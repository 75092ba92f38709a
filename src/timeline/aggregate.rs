use std::collections::BTreeSet;

use crate::models::{PackageAccessBatch, TimelineEntry, ONE_MINUTE_MS};

pub fn build_timeline_entries(clusters: &[PackageAccessBatch]) -> Vec<TimelineEntry> {
    clusters.iter().filter_map(build_timeline_entry).collect()
}

/// Summarize one cluster as a timeline row. Returns `None` for an empty cluster.
pub fn build_timeline_entry(cluster: &PackageAccessBatch) -> Option<TimelineEntry> {
    let start_millis = cluster.accesses.iter().map(|a| a.access_time_millis).min()?;
    // Exclusive end: [1..5) when the data was last accessed during minute 4.
    let end_millis = cluster
        .accesses
        .iter()
        .map(|a| a.end_exclusive_millis())
        .max()?;

    let proxy = cluster
        .accesses
        .iter()
        .find(|access| access.proxy_package_name.is_some());

    Some(TimelineEntry {
        package_name: cluster.package_name.clone(),
        user_id: cluster.user_id,
        op_names: cluster.accesses.iter().map(|a| a.op_name.clone()).collect(),
        access_start_millis: start_millis,
        access_end_millis: end_millis - ONE_MINUTE_MS,
        duration_millis: end_millis - start_millis,
        is_user_sensitive: cluster.is_user_sensitive,
        attribution_label: cluster.attribution_label.clone(),
        attribution_tags: Some(
            cluster
                .accesses
                .iter()
                .filter_map(|a| a.attribution_tag.clone())
                .collect::<BTreeSet<_>>(),
        ),
        proxy_package_name: proxy.and_then(|p| p.proxy_package_name.clone()),
        proxy_user_id: proxy.and_then(|p| p.proxy_user_id),
    })
}
