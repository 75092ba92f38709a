pub mod flags;
pub mod mapping;

pub use flags::{PermissionFlags, RequestedPermissionFlags};
pub use mapping::{
    group_of_op, group_of_platform_permission, op_names_for_group, ops, permission_names,
    privacy_dashboard_op_names, usage_group_of_permission, PermissionGroup,
};
