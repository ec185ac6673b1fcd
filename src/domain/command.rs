//! Wire messages exchanged with downstream cluster agents.
//!
//! Outbound [`AgentCommand`]s are addressed to exactly one session; inbound
//! [`AgentMessage`]s carry deploy and undeploy results back.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::id::AppId;

/// Whether a deploy command installs or removes manifests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployAction {
    #[default]
    Deploy,
    Undeploy,
}

/// Payload of a deploy (or undeploy) command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployCommand {
    pub app_id: AppId,
    pub app_slug: String,
    pub action: DeployAction,
    pub sequence: u64,
    pub kubectl_version: String,
    pub additional_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,
    /// Base64-encoded manifests.
    pub manifests: String,
    /// Base64-encoded manifests of the previously dispatched sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_manifests: Option<String>,
    pub result_callback_path: String,
    pub wait: bool,
    pub clear_namespaces: Vec<String>,
    #[serde(rename = "clearPVCs")]
    pub clear_pvcs: bool,
}

/// Commands sent from the control plane to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum AgentCommand {
    Deploy(Box<DeployCommand>),
    #[serde(rename_all = "camelCase")]
    AppInformers { app_id: AppId, informers: Vec<String> },
    #[serde(rename_all = "camelCase")]
    Preflight {
        app_id: AppId,
        app_slug: String,
        sequence: u64,
        uri: String,
    },
}

impl AgentCommand {
    /// Short name for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deploy(cmd) if cmd.action == DeployAction::Undeploy => "undeploy",
            Self::Deploy(_) => "deploy",
            Self::AppInformers { .. } => "app_informers",
            Self::Preflight { .. } => "preflight",
        }
    }
}

/// Messages an agent sends back over its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum AgentMessage {
    #[serde(rename_all = "camelCase")]
    DeployResult {
        app_id: AppId,
        sequence: u64,
        success: bool,
        #[serde(default)]
        output: String,
    },
    #[serde(rename_all = "camelCase")]
    UndeployResult {
        app_id: AppId,
        success: bool,
        #[serde(default)]
        output: String,
    },
}

/// Base64-encode manifest bytes for the wire.
#[must_use]
pub fn encode_manifests(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
