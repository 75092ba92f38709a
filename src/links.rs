//! Extra scoped-access links shown next to a permission group's settings.

use serde::{Deserialize, Serialize};

use crate::permissions::PermissionGroup;

const BUNDLED_CONTACTS_PACKAGE: &str = "com.android.contacts";
// Reads contacts through a provider that enforces READ_CONTACTS directly.
const GOOGLE_CONTACTS_PACKAGE: &str = "com.google.android.contacts";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtraPermissionLink {
    StorageScopes,
    ContactScopes,
}

impl ExtraPermissionLink {
    /// Lookup order of [`ExtraPermissionLink::find`].
    pub const ALL: [ExtraPermissionLink; 2] =
        [ExtraPermissionLink::StorageScopes, ExtraPermissionLink::ContactScopes];

    /// First link visible for this group and package.
    pub fn find(group: PermissionGroup, package_name: &str) -> Option<ExtraPermissionLink> {
        Self::ALL
            .into_iter()
            .find(|link| link.is_visible(group, package_name))
    }

    pub fn is_visible(&self, group: PermissionGroup, package_name: &str) -> bool {
        match self {
            ExtraPermissionLink::StorageScopes => matches!(
                group,
                PermissionGroup::Storage
                    | PermissionGroup::ReadMediaAural
                    | PermissionGroup::ReadMediaVisual
            ),
            ExtraPermissionLink::ContactScopes => {
                group == PermissionGroup::Contacts
                    && package_name != BUNDLED_CONTACTS_PACKAGE
                    && package_name != GOOGLE_CONTACTS_PACKAGE
            }
        }
    }

    pub fn settings_link_text(&self) -> &'static str {
        match self {
            ExtraPermissionLink::StorageScopes => "Storage Scopes",
            ExtraPermissionLink::ContactScopes => "Contact Scopes",
        }
    }

    pub fn dialog_button_text(&self) -> &'static str {
        match self {
            ExtraPermissionLink::StorageScopes => "Setup Storage Scopes",
            ExtraPermissionLink::ContactScopes => "Setup Contact Scopes",
        }
    }

    /// Appended to the "Don't allow" option while scopes are active.
    pub fn denied_suffix(&self, scopes_enabled: bool) -> Option<String> {
        scopes_enabled.then(|| format!(" (+ {})", self.settings_link_text()))
    }

    /// Granting the real permission is blocked while contact scopes are active.
    pub fn blocks_allow_button(&self, scopes_enabled: bool) -> bool {
        match self {
            ExtraPermissionLink::StorageScopes => false,
            ExtraPermissionLink::ContactScopes => scopes_enabled,
        }
    }

    /// Shown when a blocked "Allow" is tapped.
    pub fn allow_blocked_message(&self) -> Option<&'static str> {
        match self {
            ExtraPermissionLink::StorageScopes => None,
            ExtraPermissionLink::ContactScopes => {
                Some("Turn off Contact Scopes before allowing the Contacts permission.")
            }
        }
    }
}
