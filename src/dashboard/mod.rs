//! Privacy dashboard summary: which packages used camera, location and
//! microphone recently.

pub mod use_case;
pub mod view;

pub use use_case::GetPermissionGroupUsage;
pub use view::{build_dashboard_ui_state, DashboardUiState};
