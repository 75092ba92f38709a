//! Turns discrete app-op history into the clustered rows of a permission
//! group's usage timeline.

pub mod aggregate;
pub mod attribution;
pub mod cluster;
pub mod config;
pub mod filters;
pub mod use_case;

pub use aggregate::{build_timeline_entries, build_timeline_entry};
pub use attribution::group_by_attribution_label;
pub use cluster::{can_join_cluster, create_access_clusters};
pub use config::{ClusterConfig, CLUSTER_SPACING_MINUTES};
pub use use_case::PermissionGroupUsageDetails;
