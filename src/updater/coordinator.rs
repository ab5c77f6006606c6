//! Update Coordinator
//!
//! Runs one update-check-and-apply cycle: query availability, bail out
//! successfully when there is nothing to install, otherwise start the
//! requested flow and wait for its terminal outcome.

use thiserror::Error;
use tracing::{debug, info};

use super::manager::{FlowResult, HostWindow, UpdateAvailability, UpdateManager, UpdateType};
use super::stream::TaskError;

/// A failed update cycle. Each variant surfaces the underlying task error
/// verbatim; there are no retries and nothing is swallowed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    #[error("update availability check failed: {0}")]
    Query(#[source] TaskError),
    #[error("update flow did not finish: {0}")]
    Flow(#[source] TaskError),
}

/// How a successful update cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The store reported nothing to install; the request was a no-op.
    NotAvailable(UpdateAvailability),
    /// The update flow ran to its terminal result.
    FlowFinished(FlowResult),
}

/// Orchestrates update cycles against a pluggable [`UpdateManager`].
pub struct UpdateCoordinator<M> {
    manager: M,
}

impl<M: UpdateManager> UpdateCoordinator<M> {
    pub fn new(manager: M) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }

    /// Runs one update cycle in `update_type` mode on `host`.
    ///
    /// Requesting an update while none is available is an idempotent no-op.
    /// Each invocation is independent and holds no state beyond its own call
    /// stack; abandoning the future mid-cycle detaches the pending task's
    /// listeners.
    pub async fn request_update(
        &self,
        update_type: UpdateType,
        host: &HostWindow,
    ) -> Result<UpdateOutcome, UpdateError> {
        debug!(%update_type, host = host.name(), "checking update availability");
        let info = self
            .manager
            .update_info()
            .into_stream()
            .first()
            .await
            .map_err(UpdateError::Query)?;

        if !info.is_update_available() {
            debug!(availability = ?info.availability, "no update to apply");
            return Ok(UpdateOutcome::NotAvailable(info.availability));
        }

        info!(
            %update_type,
            version_code = ?info.available_version_code,
            "starting update flow"
        );
        let result = self
            .manager
            .start_update_flow(&info, host, update_type)
            .into_stream()
            .first()
            .await
            .map_err(UpdateError::Flow)?;

        info!(%update_type, "update flow finished");
        Ok(UpdateOutcome::FlowFinished(result))
    }
}
