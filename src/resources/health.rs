//! Node health: `/v1/health/status`

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::executor::{Executor, Operation};
use crate::transport::Transport;
use crate::validate::require_ids;

/// Largest accepted `last_contact_threshold`: 7 days, in seconds.
pub const MAX_CONTACT_THRESHOLD_SECS: u64 = 7 * 24 * 60 * 60;

/// Check which nodes have reported within a time window.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatusRequest {
    pub nodes: Vec<String>,
    /// A node counts as online if its last heartbeat is newer than this
    /// many seconds.
    pub last_contact_threshold: u64,
}

impl HealthStatusRequest {
    pub fn new<I, S>(nodes: I, last_contact_threshold: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            last_contact_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthStatus {
    pub online: bool,
    /// Unix time of the last heartbeat
    pub last_heartbeat: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct HealthStatusPayload {
    #[serde(default)]
    data: HashMap<String, HealthStatus>,
}

impl Operation for HealthStatusRequest {
    const PATH: &'static str = "/v1/health/status";
    const NAME: &'static str = "get health status";
    type Payload = HealthStatusPayload;
    type Output = HashMap<String, HealthStatus>;

    fn validate(&self) -> Result<()> {
        require_ids(&self.nodes, "nodes")?;
        if self.last_contact_threshold == 0 {
            return Err(Error::validation(
                "lastContactThreshold must be greater than zero",
            ));
        }
        if self.last_contact_threshold > MAX_CONTACT_THRESHOLD_SECS {
            return Err(Error::new(
                ErrorKind::ResourceLimitExceeded,
                "lastContactThreshold cannot exceed 7 days",
            ));
        }
        Ok(())
    }

    fn into_output(self, payload: HealthStatusPayload) -> Result<Self::Output> {
        Ok(payload.data)
    }
}

/// Heartbeat status of nodes.
#[derive(Debug, Clone)]
pub struct HealthManager {
    executor: Executor,
}

impl HealthManager {
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        Self::from_executor(Executor::new(transport, base_url))
    }

    pub(crate) fn from_executor(executor: Executor) -> Self {
        Self { executor }
    }

    /// Status per node id.
    pub async fn get_health_status(
        &self,
        ctx: &Context,
        req: HealthStatusRequest,
    ) -> Result<HashMap<String, HealthStatus>> {
        self.executor.execute(ctx, req).await
    }
}
