use std::cmp::Ordering;

use crate::models::{DiscreteAccess, PackageAccessBatch, ONE_MINUTE_MS};
use crate::timeline::config::ClusterConfig;

/// Split every batch into clusters of temporally adjacent accesses.
pub fn create_access_clusters(
    batches: &[PackageAccessBatch],
    config: &ClusterConfig,
) -> Vec<PackageAccessBatch> {
    batches
        .iter()
        .flat_map(|batch| cluster_batch(batch, config))
        .collect()
}

/// Walk the batch's accesses in time order, closing the current cluster
/// whenever the next access cannot join it.
pub fn cluster_batch(batch: &PackageAccessBatch, config: &ClusterConfig) -> Vec<PackageAccessBatch> {
    let mut sorted = batch.accesses.clone();
    sorted.sort_by(access_order);

    let mut clusters = Vec::new();
    let mut current: Vec<DiscreteAccess> = Vec::new();

    for access in sorted {
        if !current.is_empty() && !can_join_cluster(&access, &current, config) {
            clusters.push(batch.with_accesses(std::mem::take(&mut current)));
        }
        current.push(access);
    }

    // Push final cluster
    if !current.is_empty() {
        clusters.push(batch.with_accesses(current));
    }

    clusters
}

/// Total order on accesses. Accesses in the same minute sort by op first so
/// the self-clustering check sees same-op runs regardless of input order.
fn access_order(a: &DiscreteAccess, b: &DiscreteAccess) -> Ordering {
    a.access_time_millis
        .cmp(&b.access_time_millis)
        .then_with(|| a.op_name.cmp(&b.op_name))
        .then_with(|| a.duration_millis.cmp(&b.duration_millis))
        .then_with(|| a.attribution_tag.cmp(&b.attribution_tag))
        .then_with(|| a.proxy_package_name.cmp(&b.proxy_package_name))
        .then_with(|| a.proxy_user_id.cmp(&b.proxy_user_id))
}

/// Whether `candidate` continues the episode formed by `cluster`.
///
/// The self-clustering check compares against the most recent access only.
/// Adjacency is measured from the last minute covered by any access in the
/// cluster, so a long continuous access can pull in later accesses.
pub fn can_join_cluster(
    candidate: &DiscreteAccess,
    cluster: &[DiscreteAccess],
    config: &ClusterConfig,
) -> bool {
    let Some(previous) = cluster.last() else {
        return true;
    };

    if (config.is_self_clustering(&candidate.op_name) || config.is_self_clustering(&previous.op_name))
        && candidate.op_name != previous.op_name
    {
        return false;
    }

    let candidate_minute = candidate.access_time_millis / ONE_MINUTE_MS;
    let cluster_end_millis = cluster
        .iter()
        .map(DiscreteAccess::last_covered_millis)
        .max()
        .unwrap_or(previous.access_time_millis);
    let cluster_end_minute = cluster_end_millis / ONE_MINUTE_MS;

    candidate_minute - cluster_end_minute <= config.spacing_minutes
}
