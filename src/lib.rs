pub mod dashboard;
pub mod db;
pub mod details;
pub mod links;
pub mod models;
pub mod permissions;
pub mod sensitivity;
pub mod settings;
pub mod sources;
pub mod timeline;
pub mod utils;
pub mod watch;

#[cfg(test)]
mod testing;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use dashboard::{build_dashboard_ui_state, DashboardUiState, GetPermissionGroupUsage};
use db::Database;
use details::{build_usage_details, UsageDetailsUiState};
use models::{PermissionGroupUsageState, TimelineState};
use permissions::{privacy_dashboard_op_names, PermissionGroup};
use settings::{FeatureFlags, SettingsStore};
use sources::Collaborators;
use timeline::PermissionGroupUsageDetails;
use watch::{ChangeEvent, ChangeListenerRegistry, Subscription};

pub use links::ExtraPermissionLink;
pub use utils::init_logging;

const SETTINGS_FILE: &str = "settings.json";
const HISTORY_DB_FILE: &str = "access_history.sqlite3";

/// Shared services of the permission usage screens.
pub struct AppState {
    pub settings: SettingsStore,
    pub collaborators: Collaborators,
    pub listeners: Arc<ChangeListenerRegistry>,
}

impl AppState {
    /// Load settings from `data_dir`, start logging and wire the platform services.
    pub fn new(data_dir: &Path, collaborators: Collaborators) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
        init_logging(&settings.logging());
        log::info!("privacy timeline starting with features {:?}", settings.features());

        Ok(Self {
            settings,
            collaborators,
            listeners: Arc::new(ChangeListenerRegistry::new()),
        })
    }

    pub fn features(&self) -> FeatureFlags {
        self.settings.features()
    }

    /// Live timeline of one permission group.
    pub fn permission_timeline(&self, group: PermissionGroup) -> Result<Subscription<PermissionGroupUsageDetails>> {
        let use_case = PermissionGroupUsageDetails::new(group, self.features(), self.collaborators.clone())?;
        Ok(Subscription::start(Arc::new(use_case), Arc::clone(&self.listeners)))
    }

    /// Live per-group usage feeding the privacy dashboard.
    pub fn dashboard(&self) -> Subscription<GetPermissionGroupUsage> {
        let use_case = GetPermissionGroupUsage::new(&self.features(), self.collaborators.clone());
        Subscription::start(Arc::new(use_case), Arc::clone(&self.listeners))
    }

    pub fn usage_details(&self, group: PermissionGroup, state: &TimelineState, now_millis: i64) -> UsageDetailsUiState {
        build_usage_details(state, group, &self.settings.toggles(), now_millis, &self.features())
    }

    pub fn dashboard_ui_state(&self, state: &PermissionGroupUsageState, now_millis: i64) -> DashboardUiState {
        build_dashboard_ui_state(state, &self.settings.toggles(), now_millis, &self.features())
    }

    /// Forward a platform change to every live subscription.
    pub fn notify(&self, event: &ChangeEvent) -> usize {
        self.listeners.notify(event)
    }
}

/// Open the on-disk access history under `data_dir` and track every op the
/// dashboard can show.
pub async fn open_access_history(data_dir: &Path, features: &FeatureFlags) -> Result<Database> {
    let database = Database::new(data_dir.join(HISTORY_DB_FILE))?;
    database
        .register_ops(&privacy_dashboard_op_names(features))
        .await
        .context("failed to register tracked ops")?;
    Ok(database)
}
