//! Discrete app-op access records.
//!
//! Timestamps and durations are rounded to the minute by the platform before
//! they reach this crate.

use serde::{Deserialize, Serialize};

pub const ONE_MINUTE_MS: i64 = 60_000;

/// One recorded instance of an op being performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscreteAccess {
    pub op_name: String,
    pub access_time_millis: i64,
    /// `-1` for an instantaneous access, positive for a continuous one.
    pub duration_millis: i64,
    pub attribution_tag: Option<String>,
    pub proxy_package_name: Option<String>,
    pub proxy_user_id: Option<u32>,
}

impl DiscreteAccess {
    pub fn new(op_name: impl Into<String>, access_time_millis: i64, duration_millis: i64) -> Self {
        Self {
            op_name: op_name.into(),
            access_time_millis,
            duration_millis,
            attribution_tag: None,
            proxy_package_name: None,
            proxy_user_id: None,
        }
    }

    pub fn with_attribution_tag(mut self, tag: impl Into<String>) -> Self {
        self.attribution_tag = Some(tag.into());
        self
    }

    pub fn with_proxy(mut self, package_name: impl Into<String>, user_id: u32) -> Self {
        self.proxy_package_name = Some(package_name.into());
        self.proxy_user_id = Some(user_id);
        self
    }

    pub fn is_continuous(&self) -> bool {
        self.duration_millis > 0
    }

    /// Last millisecond-at-minute-granularity covered by this access.
    ///
    /// A 3 minute access starting at minute 45 covers minutes 45, 46 and 47.
    pub fn last_covered_millis(&self) -> i64 {
        if self.is_continuous() {
            self.access_time_millis + self.duration_millis - ONE_MINUTE_MS
        } else {
            self.access_time_millis
        }
    }

    /// Rounds the start down to its minute and the duration down to whole
    /// minutes. A continuous access shorter than a minute becomes instantaneous.
    pub fn truncated_to_minute(mut self) -> Self {
        self.access_time_millis -= self.access_time_millis.rem_euclid(ONE_MINUTE_MS);
        if self.is_continuous() {
            let whole = self.duration_millis - self.duration_millis % ONE_MINUTE_MS;
            self.duration_millis = if whole > 0 { whole } else { -1 };
        }
        self
    }

    /// Exclusive end of the access: `[start, end)`.
    pub fn end_exclusive_millis(&self) -> i64 {
        if self.is_continuous() {
            self.access_time_millis + self.duration_millis
        } else {
            self.access_time_millis + ONE_MINUTE_MS
        }
    }
}

/// Accesses of one package for one user, optionally narrowed to one
/// attribution label. After clustering each batch is one access episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageAccessBatch {
    pub package_name: String,
    pub user_id: u32,
    pub accesses: Vec<DiscreteAccess>,
    pub attribution_label: Option<String>,
    pub is_user_sensitive: bool,
}

impl PackageAccessBatch {
    pub fn new(package_name: impl Into<String>, user_id: u32, accesses: Vec<DiscreteAccess>) -> Self {
        Self {
            package_name: package_name.into(),
            user_id,
            accesses,
            attribution_label: None,
            is_user_sensitive: false,
        }
    }

    /// Same package, user, label and sensitivity with a different access list.
    pub fn with_accesses(&self, accesses: Vec<DiscreteAccess>) -> Self {
        Self {
            package_name: self.package_name.clone(),
            user_id: self.user_id,
            accesses,
            attribution_label: self.attribution_label.clone(),
            is_user_sensitive: self.is_user_sensitive,
        }
    }
}
