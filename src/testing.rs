//! In-memory platform used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::models::{DiscreteAccess, OpUsage, PackageAccessBatch, PackageOpUsage};
use crate::permissions::{PermissionFlags, RequestedPermissionFlags};
use crate::sources::{
    AccessRecordSource, AttributionInfo, Collaborators, PackageInfo, PackageRepository,
    PermissionRepository, RoleRepository, SourceError, UserRepository,
};

#[derive(Default)]
struct FakeState {
    accesses: Vec<(String, u32, DiscreteAccess)>,
    unknown_ops: HashSet<String>,
    failure: Option<SourceError>,
    packages: HashMap<(String, u32), PackageInfo>,
    attributions: HashMap<(String, u32), AttributionInfo>,
    permission_flags: HashMap<(String, String, u32), PermissionFlags>,
    users: Vec<u32>,
    quiet_mode: HashSet<u32>,
    show_in_quiet_mode: HashSet<u32>,
    exempted: HashSet<String>,
    fetch_delay: Option<Duration>,
    fetch_count: usize,
}

pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                users: vec![0],
                ..FakeState::default()
            }),
        }
    }

    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators {
            access_records: self.clone(),
            packages: self.clone(),
            permissions: self.clone(),
            users: self.clone(),
            roles: self.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_accesses(&self, package_name: &str, user_id: u32, accesses: Vec<DiscreteAccess>) {
        let mut state = self.lock();
        for access in accesses {
            state.accesses.push((package_name.to_string(), user_id, access));
        }
    }

    pub fn clear_accesses(&self) {
        self.lock().accesses.clear();
    }

    /// Install a package requesting `permissions`, all granted.
    pub fn install(&self, package_name: &str, user_id: u32, permissions: &[&str], is_system: bool) {
        let info = PackageInfo {
            package_name: package_name.to_string(),
            requested_permissions: permissions.iter().map(|p| p.to_string()).collect(),
            requested_permissions_flags: vec![RequestedPermissionFlags::GRANTED; permissions.len()],
            is_system,
        };
        self.install_info(user_id, info);
    }

    pub fn install_info(&self, user_id: u32, info: PackageInfo) {
        self.lock()
            .packages
            .insert((info.package_name.clone(), user_id), info);
    }

    pub fn uninstall(&self, package_name: &str, user_id: u32) {
        self.lock()
            .packages
            .remove(&(package_name.to_string(), user_id));
    }

    pub fn set_attribution(&self, package_name: &str, user_id: u32, info: AttributionInfo) {
        self.lock()
            .attributions
            .insert((package_name.to_string(), user_id), info);
    }

    pub fn set_permission_flags(
        &self,
        permission: &str,
        package_name: &str,
        user_id: u32,
        flags: PermissionFlags,
    ) {
        self.lock().permission_flags.insert(
            (permission.to_string(), package_name.to_string(), user_id),
            flags,
        );
    }

    pub fn set_users(&self, users: Vec<u32>) {
        self.lock().users = users;
    }

    pub fn set_quiet_mode(&self, user_id: u32, quiet: bool, show_in_quiet_mode: bool) {
        let mut state = self.lock();
        if quiet {
            state.quiet_mode.insert(user_id);
        } else {
            state.quiet_mode.remove(&user_id);
        }
        if show_in_quiet_mode {
            state.show_in_quiet_mode.insert(user_id);
        } else {
            state.show_in_quiet_mode.remove(&user_id);
        }
    }

    pub fn exempt(&self, package_name: &str) {
        self.lock().exempted.insert(package_name.to_string());
    }

    pub fn mark_unknown_op(&self, op_name: &str) {
        self.lock().unknown_ops.insert(op_name.to_string());
    }

    pub fn fail_with(&self, error: SourceError) {
        self.lock().failure = Some(error);
    }

    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.lock().fetch_delay = delay;
    }

    /// Number of discrete history reads started so far.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetch_count
    }

    fn check_op(&self, op_name: &str) -> Result<(), SourceError> {
        let state = self.lock();
        if let Some(failure) = &state.failure {
            return Err(failure.clone());
        }
        if state.unknown_ops.contains(op_name) {
            return Err(SourceError::UnknownOp(op_name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AccessRecordSource for FakePlatform {
    async fn discrete_accesses(
        &self,
        op_name: &str,
        begin_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<PackageAccessBatch>, SourceError> {
        let delay = {
            let mut state = self.lock();
            state.fetch_count += 1;
            state.fetch_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_op(op_name)?;

        let state = self.lock();
        let mut batches: Vec<PackageAccessBatch> = Vec::new();
        for (package_name, user_id, access) in &state.accesses {
            if access.op_name != op_name
                || access.access_time_millis < begin_millis
                || access.access_time_millis >= end_millis
            {
                continue;
            }
            match batches
                .iter_mut()
                .find(|b| &b.package_name == package_name && b.user_id == *user_id)
            {
                Some(batch) => batch.accesses.push(access.clone()),
                None => batches.push(PackageAccessBatch::new(
                    package_name.clone(),
                    *user_id,
                    vec![access.clone()],
                )),
            }
        }
        Ok(batches)
    }

    async fn last_access_usages(&self, op_name: &str) -> Result<Vec<PackageOpUsage>, SourceError> {
        self.check_op(op_name)?;

        let state = self.lock();
        let mut usages: Vec<PackageOpUsage> = Vec::new();
        for (package_name, user_id, access) in &state.accesses {
            if access.op_name != op_name {
                continue;
            }
            match usages
                .iter_mut()
                .find(|u| &u.package_name == package_name && u.user_id == *user_id)
            {
                Some(usage) => {
                    let latest = &mut usage.op_usages[0].last_access_millis;
                    *latest = (*latest).max(access.access_time_millis);
                }
                None => usages.push(PackageOpUsage {
                    package_name: package_name.clone(),
                    user_id: *user_id,
                    op_usages: vec![OpUsage {
                        op_name: op_name.to_string(),
                        last_access_millis: access.access_time_millis,
                    }],
                }),
            }
        }
        Ok(usages)
    }
}

#[async_trait]
impl PackageRepository for FakePlatform {
    async fn package_info(&self, package_name: &str, user_id: u32) -> Option<PackageInfo> {
        self.lock()
            .packages
            .get(&(package_name.to_string(), user_id))
            .cloned()
    }

    async fn attribution_info(&self, package_name: &str, user_id: u32) -> Option<AttributionInfo> {
        self.lock()
            .attributions
            .get(&(package_name.to_string(), user_id))
            .cloned()
    }
}

#[async_trait]
impl PermissionRepository for FakePlatform {
    async fn permission_flags(
        &self,
        permission: &str,
        package_name: &str,
        user_id: u32,
    ) -> PermissionFlags {
        self.lock()
            .permission_flags
            .get(&(permission.to_string(), package_name.to_string(), user_id))
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl UserRepository for FakePlatform {
    async fn user_profiles_including_current(&self) -> Vec<u32> {
        self.lock().users.clone()
    }

    async fn is_quiet_mode_enabled(&self, user_id: u32) -> bool {
        self.lock().quiet_mode.contains(&user_id)
    }

    async fn should_show_in_quiet_mode(&self, user_id: u32) -> bool {
        self.lock().show_in_quiet_mode.contains(&user_id)
    }
}

#[async_trait]
impl RoleRepository for FakePlatform {
    async fn exempted_packages(&self) -> HashSet<String> {
        self.lock().exempted.clone()
    }
}
