use std::io::Write;

use harbormaster::adapter::outbound::memory::MemoryStore;
use harbormaster::domain::{AppId, AutoDeploy, ClusterId, ReleaseStatus};
use harbormaster::error::{ConfigError, Error};
use harbormaster::infrastructure::bootstrap::seed_store;
use harbormaster::infrastructure::config::Config;
use harbormaster::testkit::config::{FULL_TOML, MINIMAL_TOML};

fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("harbormaster-config-test-")
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn full_config_loads_every_section() {
    let file = write_temp_config(FULL_TOML);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.logging.format, "json");
    assert_eq!(config.server.listen_addr, "127.0.0.1:8800");
    assert_eq!(config.dispatch.interval_ms, 500);
    assert_eq!(config.restore.interval_ms, 2000);
    assert_eq!(config.scanner.stale_running_after_secs, 600);
    assert_eq!(config.upstream.retry_max_attempts, 2);
    assert_eq!(config.clusters.len(), 2);
    assert_eq!(config.apps.len(), 2);

    let billing = &config.apps[0];
    assert_eq!(billing.auto_deploy, AutoDeploy::MinorPatch);
    assert_eq!(billing.releases.len(), 2);
    assert_eq!(billing.deployed_sequence, Some(1));

    let reports = config.apps[1].to_app();
    assert_eq!(reports.slug, "reports");
    assert_eq!(reports.channel_id, "stable");
    assert!(reports.is_airgap);
}

#[test]
fn durations_convert_to_service_settings() {
    let config = Config::parse_toml(FULL_TOML).unwrap();

    let dispatch = config.dispatch.settings(&config.server.public_url);
    assert_eq!(dispatch.interval.as_millis(), 500);
    assert_eq!(dispatch.public_url, "https://cp.example.com");
    assert_eq!(config.restore.settings().interval.as_secs(), 2);
    assert_eq!(
        config.scanner.settings().stale_running_after.as_secs(),
        600
    );
    assert_eq!(config.upstream.settings().retry_max_attempts, 2);
}

#[test]
fn seeded_store_reflects_app_sections() {
    let config = Config::parse_toml(FULL_TOML).unwrap();
    let store = MemoryStore::new();
    seed_store(&config, &store);

    let billing = AppId::new("billing");
    for cluster in ["edge-1", "edge-2"] {
        assert_eq!(store.desired(&billing, &ClusterId::new(cluster)), Some(1));
    }
    assert_eq!(
        store.release_status(&billing, &ClusterId::new("edge-1"), 0),
        Some((ReleaseStatus::Deployed, None))
    );

    let reports = AppId::new("reports");
    assert!(store.app(&reports).is_some());
    assert_eq!(store.desired(&reports, &ClusterId::new("edge-1")), None);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.toml")).unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))));
}

#[test]
fn deployed_sequence_must_exist() {
    let toml = format!(
        r#"{MINIMAL_TOML}
[[apps]]
id = "web"
deployed_sequence = 3

[[apps.releases]]
sequence = 1
cursor = "1"
label = "1.0.0"
"#
    );
    let err = Config::parse_toml(&toml).unwrap_err();

    assert!(matches!(
        err,
        Error::Config(ConfigError::InvalidValue {
            field: "apps.deployed_sequence",
            ..
        })
    ));
}

#[test]
fn unknown_auto_deploy_tier_is_a_parse_error() {
    let toml = format!("{MINIMAL_TOML}\n[[apps]]\nid = \"web\"\nauto_deploy = \"weekly\"\n");
    let err = Config::parse_toml(&toml).unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::Parse(_))));
}

#[test]
fn invalid_log_format_is_rejected() {
    let toml = MINIMAL_TOML.replace("pretty", "xml");
    let err = Config::parse_toml(&toml).unwrap_err();

    assert!(err.to_string().contains("logging.format"));
}
