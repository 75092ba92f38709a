use crate::permissions::ops;
use crate::settings::FeatureFlags;

/// Accesses at most this many minutes apart belong to the same episode.
pub const CLUSTER_SPACING_MINUTES: i64 = 1;

/// Configuration for access clustering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Largest gap, in whole minutes, merged into one cluster.
    pub spacing_minutes: i64,

    /// Ops that only ever cluster with accesses of the same op.
    pub self_clustering_ops: Vec<String>,
}

impl ClusterConfig {
    pub fn from_features(features: &FeatureFlags) -> Self {
        let mut config = Self::default();
        if features.location_bypass_enabled {
            config.self_clustering_ops.push(ops::EMERGENCY_LOCATION.to_string());
        }
        config
    }

    pub fn is_self_clustering(&self, op_name: &str) -> bool {
        self.self_clustering_ops.iter().any(|op| op == op_name)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            spacing_minutes: CLUSTER_SPACING_MINUTES,
            self_clustering_ops: Vec::new(),
        }
    }
}
