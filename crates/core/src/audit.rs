//! Login history records and user-agent classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Email, LoginRecordId};

/// Browser, operating system and device class guessed from a user agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub browser: String,
    pub os: String,
    pub device: String,
}

impl DeviceInfo {
    /// Classify a `User-Agent` header by substring markers.
    #[must_use]
    pub fn parse(user_agent: &str) -> Self {
        let has = |marker: &str| user_agent.contains(marker);

        let browser = if has("Chrome") && !has("Edg") {
            "Chrome"
        } else if has("Firefox") {
            "Firefox"
        } else if has("Safari") && !has("Chrome") {
            "Safari"
        } else if has("Edg") {
            "Edge"
        } else if has("Opera") || has("OPR") {
            "Opera"
        } else {
            "Unknown"
        };

        // Mobile markers first: Android agents also say Linux, iOS agents say Mac OS.
        let (os, device) = if has("Windows") {
            ("Windows", "Desktop")
        } else if has("Android") {
            ("Android", "Mobile")
        } else if has("iPhone") {
            ("iOS", "Mobile")
        } else if has("iPad") {
            ("iOS", "Tablet")
        } else if has("Mac OS") {
            ("MacOS", "Desktop")
        } else if has("Linux") {
            ("Linux", "Desktop")
        } else {
            ("Unknown", "Desktop")
        };

        Self {
            browser: browser.to_owned(),
            os: os.to_owned(),
            device: device.to_owned(),
        }
    }
}

/// A login that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoginRecord {
    pub email: Email,
    pub name: String,
    pub ip_address: String,
    pub user_agent: String,
    pub session_key: String,
    pub device: DeviceInfo,
}

/// A stored login, closed by a later logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub id: LoginRecordId,
    pub email: Email,
    pub name: String,
    pub ip_address: String,
    pub user_agent: String,
    pub session_key: String,
    #[serde(flatten)]
    pub device: DeviceInfo,
    pub login_time: DateTime<Utc>,
    /// `None` while the session is still active.
    pub logout_time: Option<DateTime<Utc>>,
}

impl LoginRecord {
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.logout_time.is_none()
    }

    /// Session length as `"{h}h {m}m"`, or `"still active"`.
    #[must_use]
    pub fn duration_label(&self) -> String {
        self.logout_time.map_or_else(
            || "still active".to_owned(),
            |logout| {
                let seconds = (logout - self.login_time).num_seconds().max(0);
                format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
            },
        )
    }
}

/// Pick the client address: first `X-Forwarded-For` entry, else the socket
/// peer, else loopback.
#[must_use]
pub fn client_ip(forwarded_for: Option<&str>, peer: Option<std::net::IpAddr>) -> String {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_owned)
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "127.0.0.1".to_owned())
}
