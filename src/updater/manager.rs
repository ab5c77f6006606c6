//! Update Manager Contract
//!
//! The data model for one update cycle and the trait an update backend has
//! to implement. The real platform SDK stays behind this seam; the demo and
//! the tests plug in the scripted manager from [`super::sim`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::Task;

/// Availability reported by the store for the installed app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateAvailability {
    Unknown,
    NotAvailable,
    Available,
    /// An earlier triggered update is still running.
    InProgress,
}

impl fmt::Display for UpdateAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::NotAvailable => write!(f, "not available"),
            Self::Available => write!(f, "available"),
            Self::InProgress => write!(f, "update in progress"),
        }
    }
}

/// UX mode an update flow runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Background download, install prompt later.
    Flexible,
    /// Blocking full-screen flow until the update is applied.
    Immediate,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flexible => write!(f, "flexible"),
            Self::Immediate => write!(f, "immediate"),
        }
    }
}

/// Immutable availability snapshot, produced once per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateInfo {
    pub availability: UpdateAvailability,
    /// Version code offered by the store, when one is available.
    pub available_version_code: Option<u64>,
    /// Days since the store first learned about the offered version.
    pub staleness_days: Option<u32>,
    pub checked_at: DateTime<Utc>,
}

impl UpdateInfo {
    pub fn is_update_available(&self) -> bool {
        self.availability == UpdateAvailability::Available
    }
}

/// Terminal result reported once a started update flow finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowResult {
    pub update_type: UpdateType,
    /// Version code the store is installing.
    pub version_code: Option<u64>,
}

/// The presentation surface hosting the update UI.
///
/// Passed explicitly into the coordinator instead of captured ambiently, so
/// an update cycle can run against a test double without any real UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostWindow {
    name: String,
    foreground: bool,
}

impl HostWindow {
    /// A surface currently active and able to host an update flow.
    pub fn foreground(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreground: true,
        }
    }

    /// A surface that is not currently presented. Stores refuse to start
    /// update flows on these.
    pub fn background(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            foreground: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground
    }
}

/// Backend capability set for one update cycle.
///
/// Both operations hand back a single-result [`Task`]; the caller awaits
/// them through the stream bridge.
pub trait UpdateManager {
    /// Queries the current update availability snapshot.
    fn update_info(&self) -> Task<UpdateInfo>;

    /// Starts the update flow for `update_type` on `host`, parameterized by
    /// the snapshot a preceding [`update_info`](Self::update_info) returned.
    fn start_update_flow(
        &self,
        info: &UpdateInfo,
        host: &HostWindow,
        update_type: UpdateType,
    ) -> Task<FlowResult>;
}
