//! Agent gateway listener configuration.

use serde::Deserialize;

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the agent gateway binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Externally reachable base URL, used in preflight URIs.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8800".into()
}

fn default_public_url() -> String {
    "http://localhost:8800".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_url: default_public_url(),
        }
    }
}
