//! Scripted Update Manager
//!
//! Stands in for the platform store in environments without one: the demo
//! binary and the tests. Behavior is driven by a [`Scenario`] script, either
//! built in code or loaded from JSON.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::manager::{
    FlowResult, HostWindow, UpdateAvailability, UpdateInfo, UpdateManager, UpdateType,
};
use super::task::{InstallErrorCode, InstallFailure, Task};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Scenario file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read scenario: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid scenario format: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// What the scripted store does when an update flow is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowScript {
    /// The user accepts and the flow finishes.
    Accept,
    /// The user dismisses the update UI.
    Cancel,
    /// The store rejects the flow with [`Scenario::flow_error`].
    Fail,
    /// The flow task completes with neither value nor error.
    Abandon,
}

/// Script for one run of the scripted store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default = "default_availability")]
    pub availability: UpdateAvailability,
    /// Version code the store offers when an update is available.
    #[serde(default)]
    pub version_code: Option<u64>,
    #[serde(default)]
    pub staleness_days: Option<u32>,
    /// Reject the availability query itself with this code.
    #[serde(default)]
    pub query_failure: Option<InstallErrorCode>,
    #[serde(default = "default_flow")]
    pub flow: FlowScript,
    /// Code used when `flow` is [`FlowScript::Fail`].
    #[serde(default)]
    pub flow_error: Option<InstallErrorCode>,
    /// Artificial settle delay applied to each store step.
    #[serde(default)]
    pub latency_ms: u64,
}

fn default_availability() -> UpdateAvailability {
    UpdateAvailability::NotAvailable
}

fn default_flow() -> FlowScript {
    FlowScript::Accept
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            availability: default_availability(),
            version_code: None,
            staleness_days: None,
            query_failure: None,
            flow: default_flow(),
            flow_error: None,
            latency_ms: 0,
        }
    }
}

impl Scenario {
    /// A store offering `version_code`, accepting the flow when started.
    pub fn available(version_code: u64) -> Self {
        Self {
            availability: UpdateAvailability::Available,
            version_code: Some(version_code),
            ..Self::default()
        }
    }

    pub fn with_flow(mut self, flow: FlowScript) -> Self {
        self.flow = flow;
        self
    }

    pub fn with_query_failure(mut self, code: InstallErrorCode) -> Self {
        self.query_failure = Some(code);
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        if !path.exists() {
            return Err(ScenarioError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let scenario: Scenario = serde_json::from_str(&content)?;
        Ok(scenario)
    }

    pub fn save(&self, path: &Path) -> Result<(), ScenarioError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// One recorded call against the scripted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerCall {
    UpdateInfo,
    StartUpdateFlow(UpdateType),
}

/// [`UpdateManager`] implementation that settles its tasks from spawned
/// runtime tasks, after the scripted latency. Records every call so tests
/// can assert call sequences.
pub struct SimUpdateManager {
    scenario: Scenario,
    calls: Arc<Mutex<Vec<ManagerCall>>>,
}

impl SimUpdateManager {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<ManagerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ManagerCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl UpdateManager for SimUpdateManager {
    fn update_info(&self) -> Task<UpdateInfo> {
        self.record(ManagerCall::UpdateInfo);
        let (completer, task) = Task::pending();
        let scenario = self.scenario.clone();
        let delay = Duration::from_millis(scenario.latency_ms);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(code) = scenario.query_failure {
                debug!(%code, "scripted store rejects the availability query");
                completer.reject(InstallFailure::new(
                    code,
                    "availability query rejected by store",
                ));
            } else {
                completer.resolve(UpdateInfo {
                    availability: scenario.availability,
                    available_version_code: scenario.version_code,
                    staleness_days: scenario.staleness_days,
                    checked_at: Utc::now(),
                });
            }
        });

        task
    }

    fn start_update_flow(
        &self,
        info: &UpdateInfo,
        host: &HostWindow,
        update_type: UpdateType,
    ) -> Task<FlowResult> {
        self.record(ManagerCall::StartUpdateFlow(update_type));

        if !host.is_foreground() {
            warn!(host = host.name(), "refusing update flow for background host");
            return Task::rejected(InstallFailure::new(
                InstallErrorCode::InstallNotAllowed,
                format!("host window '{}' is not in the foreground", host.name()),
            ));
        }

        let (completer, task) = Task::pending();
        let scenario = self.scenario.clone();
        let version_code = info.available_version_code;
        let delay = Duration::from_millis(scenario.latency_ms);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match scenario.flow {
                FlowScript::Accept => {
                    completer.resolve(FlowResult {
                        update_type,
                        version_code,
                    });
                }
                FlowScript::Cancel => {
                    completer.reject(InstallFailure::new(
                        InstallErrorCode::UserCanceled,
                        "user dismissed the update flow",
                    ));
                }
                FlowScript::Fail => {
                    let code = scenario.flow_error.unwrap_or(InstallErrorCode::Internal);
                    completer.reject(InstallFailure::new(code, "store failed to run the flow"));
                }
                FlowScript::Abandon => {
                    completer.cancel();
                }
            }
        });

        task
    }
}
