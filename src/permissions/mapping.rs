//! Platform permission, permission group and app-op name tables.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::settings::FeatureFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionGroup {
    #[serde(rename = "android.permission-group.ACTIVITY_RECOGNITION")]
    ActivityRecognition,
    #[serde(rename = "android.permission-group.CALENDAR")]
    Calendar,
    #[serde(rename = "android.permission-group.CALL_LOG")]
    CallLog,
    #[serde(rename = "android.permission-group.CAMERA")]
    Camera,
    #[serde(rename = "android.permission-group.CONTACTS")]
    Contacts,
    #[serde(rename = "android.permission-group.LOCATION")]
    Location,
    #[serde(rename = "android.permission-group.MICROPHONE")]
    Microphone,
    #[serde(rename = "android.permission-group.NEARBY_DEVICES")]
    NearbyDevices,
    #[serde(rename = "android.permission-group.NOTIFICATIONS")]
    Notifications,
    #[serde(rename = "android.permission-group.PHONE")]
    Phone,
    #[serde(rename = "android.permission-group.READ_MEDIA_AURAL")]
    ReadMediaAural,
    #[serde(rename = "android.permission-group.READ_MEDIA_VISUAL")]
    ReadMediaVisual,
    #[serde(rename = "android.permission-group.SENSORS")]
    Sensors,
    #[serde(rename = "android.permission-group.SMS")]
    Sms,
    #[serde(rename = "android.permission-group.STORAGE")]
    Storage,
}

impl PermissionGroup {
    pub const ALL: [PermissionGroup; 15] = [
        PermissionGroup::ActivityRecognition,
        PermissionGroup::Calendar,
        PermissionGroup::CallLog,
        PermissionGroup::Camera,
        PermissionGroup::Contacts,
        PermissionGroup::Location,
        PermissionGroup::Microphone,
        PermissionGroup::NearbyDevices,
        PermissionGroup::Notifications,
        PermissionGroup::Phone,
        PermissionGroup::ReadMediaAural,
        PermissionGroup::ReadMediaVisual,
        PermissionGroup::Sensors,
        PermissionGroup::Sms,
        PermissionGroup::Storage,
    ];

    /// Groups shown on the privacy dashboard and permission timeline.
    pub const DASHBOARD: [PermissionGroup; 3] = [
        PermissionGroup::Camera,
        PermissionGroup::Location,
        PermissionGroup::Microphone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionGroup::ActivityRecognition => "android.permission-group.ACTIVITY_RECOGNITION",
            PermissionGroup::Calendar => "android.permission-group.CALENDAR",
            PermissionGroup::CallLog => "android.permission-group.CALL_LOG",
            PermissionGroup::Camera => "android.permission-group.CAMERA",
            PermissionGroup::Contacts => "android.permission-group.CONTACTS",
            PermissionGroup::Location => "android.permission-group.LOCATION",
            PermissionGroup::Microphone => "android.permission-group.MICROPHONE",
            PermissionGroup::NearbyDevices => "android.permission-group.NEARBY_DEVICES",
            PermissionGroup::Notifications => "android.permission-group.NOTIFICATIONS",
            PermissionGroup::Phone => "android.permission-group.PHONE",
            PermissionGroup::ReadMediaAural => "android.permission-group.READ_MEDIA_AURAL",
            PermissionGroup::ReadMediaVisual => "android.permission-group.READ_MEDIA_VISUAL",
            PermissionGroup::Sensors => "android.permission-group.SENSORS",
            PermissionGroup::Sms => "android.permission-group.SMS",
            PermissionGroup::Storage => "android.permission-group.STORAGE",
        }
    }
}

impl fmt::Display for PermissionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionGroup {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        PermissionGroup::ALL
            .into_iter()
            .find(|group| group.as_str() == value)
            .ok_or_else(|| anyhow!("unknown permission group '{value}'"))
    }
}

pub mod ops {
    pub const CAMERA: &str = "android:camera";
    pub const PHONE_CALL_CAMERA: &str = "android:phone_call_camera";
    pub const RECORD_AUDIO: &str = "android:record_audio";
    pub const PHONE_CALL_MICROPHONE: &str = "android:phone_call_microphone";
    pub const RECEIVE_AMBIENT_TRIGGER_AUDIO: &str = "android:receive_ambient_trigger_audio";
    pub const COARSE_LOCATION: &str = "android:coarse_location";
    pub const FINE_LOCATION: &str = "android:fine_location";
    pub const EMERGENCY_LOCATION: &str = "android:emergency_location";
}

pub mod permission_names {
    pub const CAMERA: &str = "android.permission.CAMERA";
    pub const BACKGROUND_CAMERA: &str = "android.permission.BACKGROUND_CAMERA";
    pub const RECORD_AUDIO: &str = "android.permission.RECORD_AUDIO";
    pub const RECORD_BACKGROUND_AUDIO: &str = "android.permission.RECORD_BACKGROUND_AUDIO";
    pub const ACCESS_FINE_LOCATION: &str = "android.permission.ACCESS_FINE_LOCATION";
    pub const ACCESS_COARSE_LOCATION: &str = "android.permission.ACCESS_COARSE_LOCATION";
    pub const ACCESS_BACKGROUND_LOCATION: &str = "android.permission.ACCESS_BACKGROUND_LOCATION";
    pub const LOCATION_BYPASS: &str = "android.permission.LOCATION_BYPASS";
    pub const READ_CONTACTS: &str = "android.permission.READ_CONTACTS";
    pub const READ_EXTERNAL_STORAGE: &str = "android.permission.READ_EXTERNAL_STORAGE";
}

const PLATFORM_PERMISSIONS: &[(&str, PermissionGroup)] = &[
    ("android.permission.READ_CONTACTS", PermissionGroup::Contacts),
    ("android.permission.WRITE_CONTACTS", PermissionGroup::Contacts),
    ("android.permission.GET_ACCOUNTS", PermissionGroup::Contacts),
    ("android.permission.READ_CALENDAR", PermissionGroup::Calendar),
    ("android.permission.WRITE_CALENDAR", PermissionGroup::Calendar),
    ("android.permission.SEND_SMS", PermissionGroup::Sms),
    ("android.permission.RECEIVE_SMS", PermissionGroup::Sms),
    ("android.permission.READ_SMS", PermissionGroup::Sms),
    ("android.permission.RECEIVE_MMS", PermissionGroup::Sms),
    ("android.permission.RECEIVE_WAP_PUSH", PermissionGroup::Sms),
    ("android.permission.READ_CELL_BROADCASTS", PermissionGroup::Sms),
    ("android.permission.READ_EXTERNAL_STORAGE", PermissionGroup::Storage),
    ("android.permission.WRITE_EXTERNAL_STORAGE", PermissionGroup::Storage),
    ("android.permission.READ_MEDIA_AUDIO", PermissionGroup::ReadMediaAural),
    ("android.permission.READ_MEDIA_IMAGES", PermissionGroup::ReadMediaVisual),
    ("android.permission.READ_MEDIA_VIDEO", PermissionGroup::ReadMediaVisual),
    ("android.permission.ACCESS_MEDIA_LOCATION", PermissionGroup::ReadMediaVisual),
    ("android.permission.ACCESS_FINE_LOCATION", PermissionGroup::Location),
    ("android.permission.ACCESS_COARSE_LOCATION", PermissionGroup::Location),
    ("android.permission.ACCESS_BACKGROUND_LOCATION", PermissionGroup::Location),
    ("android.permission.BLUETOOTH_ADVERTISE", PermissionGroup::NearbyDevices),
    ("android.permission.BLUETOOTH_CONNECT", PermissionGroup::NearbyDevices),
    ("android.permission.BLUETOOTH_SCAN", PermissionGroup::NearbyDevices),
    ("android.permission.UWB_RANGING", PermissionGroup::NearbyDevices),
    ("android.permission.NEARBY_WIFI_DEVICES", PermissionGroup::NearbyDevices),
    ("android.permission.READ_CALL_LOG", PermissionGroup::CallLog),
    ("android.permission.WRITE_CALL_LOG", PermissionGroup::CallLog),
    ("android.permission.PROCESS_OUTGOING_CALLS", PermissionGroup::CallLog),
    ("android.permission.READ_PHONE_STATE", PermissionGroup::Phone),
    ("android.permission.READ_PHONE_NUMBERS", PermissionGroup::Phone),
    ("android.permission.CALL_PHONE", PermissionGroup::Phone),
    ("android.permission.ADD_VOICEMAIL", PermissionGroup::Phone),
    ("android.permission.USE_SIP", PermissionGroup::Phone),
    ("android.permission.ANSWER_PHONE_CALLS", PermissionGroup::Phone),
    ("android.permission.ACCEPT_HANDOVER", PermissionGroup::Phone),
    ("android.permission.RECORD_AUDIO", PermissionGroup::Microphone),
    ("android.permission.RECORD_BACKGROUND_AUDIO", PermissionGroup::Microphone),
    ("android.permission.ACTIVITY_RECOGNITION", PermissionGroup::ActivityRecognition),
    ("android.permission.CAMERA", PermissionGroup::Camera),
    ("android.permission.BACKGROUND_CAMERA", PermissionGroup::Camera),
    ("android.permission.BODY_SENSORS", PermissionGroup::Sensors),
    ("android.permission.BODY_SENSORS_BACKGROUND", PermissionGroup::Sensors),
    ("android.permission.POST_NOTIFICATIONS", PermissionGroup::Notifications),
];

pub fn group_of_platform_permission(permission: &str) -> Option<PermissionGroup> {
    PLATFORM_PERMISSIONS
        .iter()
        .find(|(name, _)| *name == permission)
        .map(|(_, group)| *group)
}

/// Like [`group_of_platform_permission`], additionally treating
/// `LOCATION_BYPASS` as a location permission for usage history purposes.
pub fn usage_group_of_permission(permission: &str) -> Option<PermissionGroup> {
    if permission == permission_names::LOCATION_BYPASS {
        return Some(PermissionGroup::Location);
    }
    group_of_platform_permission(permission)
}

pub fn platform_permissions_of_group(group: PermissionGroup) -> Vec<&'static str> {
    PLATFORM_PERMISSIONS
        .iter()
        .filter(|(_, g)| *g == group)
        .map(|(name, _)| *name)
        .collect()
}

/// Op that tracks usage of a runtime permission, if any.
pub fn permission_to_op(permission: &str) -> Option<&'static str> {
    match permission {
        permission_names::CAMERA => Some(ops::CAMERA),
        permission_names::RECORD_AUDIO => Some(ops::RECORD_AUDIO),
        permission_names::ACCESS_FINE_LOCATION => Some(ops::FINE_LOCATION),
        permission_names::ACCESS_COARSE_LOCATION => Some(ops::COARSE_LOCATION),
        _ => None,
    }
}

/// Ops whose discrete history is read for a permission group's timeline.
pub fn op_names_for_group(group: PermissionGroup, features: &FeatureFlags) -> Result<Vec<&'static str>> {
    if !PermissionGroup::DASHBOARD.contains(&group) {
        return Err(anyhow!("permission group {group} has no usage history"));
    }

    let mut op_names: Vec<&'static str> = platform_permissions_of_group(group)
        .into_iter()
        .filter_map(permission_to_op)
        .collect();

    match group {
        PermissionGroup::Microphone => {
            op_names.push(ops::PHONE_CALL_MICROPHONE);
            op_names.push(ops::RECEIVE_AMBIENT_TRIGGER_AUDIO);
        }
        PermissionGroup::Camera => op_names.push(ops::PHONE_CALL_CAMERA),
        PermissionGroup::Location if features.location_bypass_enabled => {
            op_names.push(ops::EMERGENCY_LOCATION)
        }
        _ => {}
    }

    Ok(op_names)
}

/// Group whose timeline shows the given op.
pub fn group_of_op(op_name: &str) -> Option<PermissionGroup> {
    match op_name {
        ops::CAMERA | ops::PHONE_CALL_CAMERA => Some(PermissionGroup::Camera),
        ops::RECORD_AUDIO | ops::PHONE_CALL_MICROPHONE | ops::RECEIVE_AMBIENT_TRIGGER_AUDIO => {
            Some(PermissionGroup::Microphone)
        }
        ops::COARSE_LOCATION | ops::FINE_LOCATION | ops::EMERGENCY_LOCATION => {
            Some(PermissionGroup::Location)
        }
        _ => None,
    }
}

/// Every op the privacy dashboard tracks.
pub fn privacy_dashboard_op_names(features: &FeatureFlags) -> Vec<&'static str> {
    PermissionGroup::DASHBOARD
        .into_iter()
        .filter_map(|group| op_names_for_group(group, features).ok())
        .flatten()
        .collect()
}
