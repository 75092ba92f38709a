use crate::models::{DiscreteAccess, PackageAccessBatch};
use crate::sources::AttributionInfo;

/// Split a batch into one batch per resolved attribution label.
///
/// Runs before clustering so accesses under different labels never merge.
/// Labels keep the order of their first access; sensitivity is carried over
/// to every output batch.
pub fn group_by_attribution_label(
    batch: PackageAccessBatch,
    attribution_info: Option<&AttributionInfo>,
) -> Vec<PackageAccessBatch> {
    let Some(info) = attribution_info.filter(|info| info.groups_by_label()) else {
        return vec![batch];
    };

    let mut groups: Vec<(Option<String>, Vec<DiscreteAccess>)> = Vec::new();
    for access in &batch.accesses {
        let label = info.label_for(access.attribution_tag.as_deref());
        match groups.iter_mut().find(|(existing, _)| *existing == label) {
            Some((_, accesses)) => accesses.push(access.clone()),
            None => groups.push((label, vec![access.clone()])),
        }
    }

    groups
        .into_iter()
        .map(|(label, accesses)| PackageAccessBatch {
            package_name: batch.package_name.clone(),
            user_id: batch.user_id,
            accesses,
            attribution_label: label,
            is_user_sensitive: batch.is_user_sensitive,
        })
        .collect()
}
