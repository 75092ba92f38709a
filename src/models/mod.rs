pub mod access;
pub mod timeline;
pub mod usage;

pub use access::{DiscreteAccess, PackageAccessBatch, ONE_MINUTE_MS};
pub use timeline::{TimelineEntry, TimelineState};
pub use usage::{OpUsage, PackageOpUsage, PermissionGroupUsage, PermissionGroupUsageState};
