use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ENABLE_LOGS: bool = true;

use crate::log_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    OpChanged,
    OpNoted,
    OpActiveChanged,
    PackageChanged,
    PermissionsChanged,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 5] = [
        ChangeKind::OpChanged,
        ChangeKind::OpNoted,
        ChangeKind::OpActiveChanged,
        ChangeKind::PackageChanged,
        ChangeKind::PermissionsChanged,
    ];
}

/// A platform notification that may invalidate computed usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeEvent {
    #[serde(rename_all = "camelCase")]
    OpChanged {
        op_name: String,
        package_name: String,
        user_id: u32,
    },
    #[serde(rename_all = "camelCase")]
    OpNoted {
        op_name: String,
        package_name: String,
        user_id: u32,
    },
    #[serde(rename_all = "camelCase")]
    OpActiveChanged {
        op_name: String,
        package_name: String,
        user_id: u32,
        active: bool,
    },
    /// A package was installed, updated or removed.
    #[serde(rename_all = "camelCase")]
    PackageChanged { package_name: String, user_id: u32 },
    #[serde(rename_all = "camelCase")]
    PermissionsChanged { package_name: String, user_id: u32 },
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::OpChanged { .. } => ChangeKind::OpChanged,
            ChangeEvent::OpNoted { .. } => ChangeKind::OpNoted,
            ChangeEvent::OpActiveChanged { .. } => ChangeKind::OpActiveChanged,
            ChangeEvent::PackageChanged { .. } => ChangeKind::PackageChanged,
            ChangeEvent::PermissionsChanged { .. } => ChangeKind::PermissionsChanged,
        }
    }

    pub fn op_name(&self) -> Option<&str> {
        match self {
            ChangeEvent::OpChanged { op_name, .. }
            | ChangeEvent::OpNoted { op_name, .. }
            | ChangeEvent::OpActiveChanged { op_name, .. } => Some(op_name),
            ChangeEvent::PackageChanged { .. } | ChangeEvent::PermissionsChanged { .. } => None,
        }
    }
}

/// Which events a listener receives. Op events are further narrowed to
/// `op_names` when set; package and permission events always pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerFilter {
    pub kinds: HashSet<ChangeKind>,
    pub op_names: Option<HashSet<String>>,
}

impl ListenerFilter {
    pub fn all_kinds() -> Self {
        Self {
            kinds: ChangeKind::ALL.into_iter().collect(),
            op_names: None,
        }
    }

    /// Every kind of event, with op events limited to `op_names`.
    pub fn watching_ops<I, S>(op_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: ChangeKind::ALL.into_iter().collect(),
            op_names: Some(op_names.into_iter().map(Into::into).collect()),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if !self.kinds.contains(&event.kind()) {
            return false;
        }
        match (event.op_name(), &self.op_names) {
            (Some(op_name), Some(op_names)) => op_names.contains(op_name),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Callback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

struct Registration {
    filter: ListenerFilter,
    callback: Callback,
}

/// Explicit registry of change listeners, shared by every subscription.
#[derive(Default)]
pub struct ChangeListenerRegistry {
    listeners: Mutex<HashMap<ListenerId, Registration>>,
}

impl ChangeListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, filter: ListenerFilter, callback: F) -> ListenerId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(Uuid::new_v4());
        self.lock().insert(
            id,
            Registration {
                filter,
                callback: Arc::new(callback),
            },
        );
        log_debug!("registered change listener {id}");
        id
    }

    /// Returns whether the listener was still registered.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            log_debug!("unregistered change listener {id}");
        }
        removed
    }

    /// Deliver `event` to every matching listener. Returns how many were called.
    pub fn notify(&self, event: &ChangeEvent) -> usize {
        // Callbacks run outside the lock so they may register or unregister.
        let callbacks: Vec<Callback> = self
            .lock()
            .values()
            .filter(|registration| registration.filter.matches(event))
            .map(|registration| Arc::clone(&registration.callback))
            .collect();

        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ListenerId, Registration>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::permissions::ops;

    fn op_changed(op_name: &str) -> ChangeEvent {
        ChangeEvent::OpChanged {
            op_name: op_name.to_string(),
            package_name: "com.maps".into(),
            user_id: 0,
        }
    }

    fn counter(registry: &ChangeListenerRegistry, filter: ListenerFilter) -> (ListenerId, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let id = registry.register(filter, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (id, count)
    }

    #[test]
    fn op_events_are_filtered_by_op_name() {
        let registry = ChangeListenerRegistry::new();
        let (_, location) = counter(&registry, ListenerFilter::watching_ops([ops::FINE_LOCATION]));
        let (_, everything) = counter(&registry, ListenerFilter::all_kinds());

        assert_eq!(registry.notify(&op_changed(ops::FINE_LOCATION)), 2);
        assert_eq!(registry.notify(&op_changed(ops::CAMERA)), 1);

        assert_eq!(location.load(Ordering::SeqCst), 1);
        assert_eq!(everything.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn package_and_permission_events_reach_op_listeners() {
        let registry = ChangeListenerRegistry::new();
        let (_, count) = counter(&registry, ListenerFilter::watching_ops([ops::CAMERA]));

        registry.notify(&ChangeEvent::PackageChanged {
            package_name: "com.maps".into(),
            user_id: 0,
        });
        registry.notify(&ChangeEvent::PermissionsChanged {
            package_name: "com.maps".into(),
            user_id: 0,
        });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn kinds_outside_filter_are_ignored() {
        let registry = ChangeListenerRegistry::new();
        let filter = ListenerFilter {
            kinds: HashSet::from([ChangeKind::OpActiveChanged]),
            op_names: None,
        };
        let (_, count) = counter(&registry, filter);

        registry.notify(&op_changed(ops::CAMERA));
        registry.notify(&ChangeEvent::OpActiveChanged {
            op_name: ops::CAMERA.into(),
            package_name: "com.maps".into(),
            user_id: 0,
            active: true,
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregistered_listener_stops_receiving() {
        let registry = ChangeListenerRegistry::new();
        let (id, count) = counter(&registry, ListenerFilter::all_kinds());

        registry.notify(&op_changed(ops::CAMERA));
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        registry.notify(&op_changed(ops::CAMERA));

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }
}
