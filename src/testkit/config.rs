//! Canonical configuration documents.
//!
//! Single source of truth for the TOML used across config and CLI tests.

/// Smallest valid configuration.
pub const MINIMAL_TOML: &str = r#"
[logging]
level = "info"
format = "pretty"
"#;

/// A configuration exercising every section.
pub const FULL_TOML: &str = r#"
[logging]
level = "debug"
format = "json"

[server]
listen_addr = "127.0.0.1:8800"
public_url = "https://cp.example.com"

[dispatch]
interval_ms = 500
deploy_result_path = "/api/v1/deploy/result"
undeploy_result_path = "/api/v1/undeploy/result"

[restore]
interval_ms = 2000

[scanner]
stale_running_after_secs = 600

[upstream]
endpoint = "https://upstream.example.com/api"
retry_max_attempts = 2

[[clusters]]
id = "edge-1"
token = "edge-1-token"

[[clusters]]
id = "edge-2"
token = "edge-2-token"

[[apps]]
id = "billing"
slug = "billing"
channel = "stable"
update_check_schedule = "@default"
auto_deploy = "minor-patch"
clusters = ["edge-1", "edge-2"]
deployed_sequence = 1

[[apps.releases]]
sequence = 0
cursor = "10"
label = "1.0.0"
status = "deployed"

[[apps.releases]]
sequence = 1
cursor = "11"
label = "1.0.1"
status = "deployed"

[[apps]]
id = "reports"
update_check_schedule = "@never"
is_airgap = true
clusters = ["edge-1"]
"#;
