//! Platform services the pipeline reads from.
//!
//! Every service is an object-safe async trait so one instance of each can be
//! built at startup and shared as `Arc<dyn ...>` through [`Collaborators`].

mod loader;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{PackageAccessBatch, PackageOpUsage};
use crate::permissions::{PermissionFlags, RequestedPermissionFlags};

pub use loader::{history_window_millis, load_discrete_accesses, load_last_access_usages};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The platform does not know this op (older releases lack some ops).
    #[error("app op '{0}' is not recognized by the platform")]
    UnknownOp(String),
    #[error("access history unavailable: {0}")]
    Unavailable(String),
}

/// Installed package metadata relevant to permission usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    pub package_name: String,
    pub requested_permissions: Vec<String>,
    /// Parallel to `requested_permissions`.
    pub requested_permissions_flags: Vec<RequestedPermissionFlags>,
    pub is_system: bool,
}

impl PackageInfo {
    pub fn requested_flags_at(&self, index: usize) -> RequestedPermissionFlags {
        self.requested_permissions_flags
            .get(index)
            .copied()
            .unwrap_or_default()
    }
}

/// How a package's attribution tags map to user-facing labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionInfo {
    pub are_user_visible: bool,
    pub tag_resource_map: Option<HashMap<String, u32>>,
    pub resource_label_map: Option<HashMap<u32, String>>,
}

impl AttributionInfo {
    /// Label for an access's tag. Untagged accesses, unmapped tags and
    /// missing label resources all resolve to `None`.
    pub fn label_for(&self, attribution_tag: Option<&str>) -> Option<String> {
        let tag = attribution_tag?;
        let resource_id = self.tag_resource_map.as_ref()?.get(tag)?;
        self.resource_label_map.as_ref()?.get(resource_id).cloned()
    }

    pub fn groups_by_label(&self) -> bool {
        self.are_user_visible && self.tag_resource_map.is_some()
    }
}

#[async_trait]
pub trait AccessRecordSource: Send + Sync {
    /// Discrete accesses of one op in `[begin_millis, end_millis)`, one batch per package and user.
    async fn discrete_accesses(
        &self,
        op_name: &str,
        begin_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<PackageAccessBatch>, SourceError>;

    /// Latest access time of one op for every package that used it.
    async fn last_access_usages(&self, op_name: &str) -> Result<Vec<PackageOpUsage>, SourceError>;
}

#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn package_info(&self, package_name: &str, user_id: u32) -> Option<PackageInfo>;

    async fn attribution_info(&self, package_name: &str, user_id: u32) -> Option<AttributionInfo>;
}

#[async_trait]
pub trait PermissionRepository: Send + Sync {
    async fn permission_flags(
        &self,
        permission: &str,
        package_name: &str,
        user_id: u32,
    ) -> PermissionFlags;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn user_profiles_including_current(&self) -> Vec<u32>;

    async fn is_quiet_mode_enabled(&self, user_id: u32) -> bool;

    async fn should_show_in_quiet_mode(&self, user_id: u32) -> bool;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Packages whose role holders never appear in usage history.
    async fn exempted_packages(&self) -> HashSet<String>;
}

/// One shared instance of every platform service, built once at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub access_records: Arc<dyn AccessRecordSource>,
    pub packages: Arc<dyn PackageRepository>,
    pub permissions: Arc<dyn PermissionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub roles: Arc<dyn RoleRepository>,
}
