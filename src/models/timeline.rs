use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One row on the permission timeline: a single clustered access episode.
///
/// `access_end_millis` is inclusive at minute granularity, so a single
/// instantaneous access has equal start and end and a one minute duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub package_name: String,
    pub user_id: u32,
    pub op_names: BTreeSet<String>,
    pub access_start_millis: i64,
    pub access_end_millis: i64,
    pub duration_millis: i64,
    pub is_user_sensitive: bool,
    pub attribution_label: Option<String>,
    pub attribution_tags: Option<BTreeSet<String>>,
    pub proxy_package_name: Option<String>,
    pub proxy_user_id: Option<u32>,
}

/// Value published to timeline subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "entries", rename_all = "camelCase")]
pub enum TimelineState {
    Loading,
    Success(Vec<TimelineEntry>),
}

impl TimelineState {
    pub fn entries(&self) -> Option<&[TimelineEntry]> {
        match self {
            TimelineState::Loading => None,
            TimelineState::Success(entries) => Some(entries),
        }
    }
}
