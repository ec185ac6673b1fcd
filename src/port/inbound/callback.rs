//! Result callbacks reported by downstream agents.

use async_trait::async_trait;

use crate::domain::command::AgentMessage;
use crate::domain::id::ClusterId;
use crate::error::Result;

/// Consumes deploy and undeploy results arriving from a cluster.
#[async_trait]
pub trait ResultHandler: Send + Sync {
    async fn handle(&self, cluster_id: &ClusterId, message: AgentMessage) -> Result<()>;
}
