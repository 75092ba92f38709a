//! Aggregate (last-access) usage models feeding the dashboard summary.

use serde::{Deserialize, Serialize};

use crate::permissions::PermissionGroup;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpUsage {
    pub op_name: String,
    pub last_access_millis: i64,
}

/// Live last-access times of every tracked op for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOpUsage {
    pub package_name: String,
    pub user_id: u32,
    pub op_usages: Vec<OpUsage>,
}

/// Most recent use of one permission group by one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGroupUsage {
    pub package_name: String,
    pub user_id: u32,
    pub permission_group: PermissionGroup,
    pub last_access_millis: i64,
    pub is_user_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "usages", rename_all = "camelCase")]
pub enum PermissionGroupUsageState {
    Loading,
    Success(Vec<PermissionGroupUsage>),
}
