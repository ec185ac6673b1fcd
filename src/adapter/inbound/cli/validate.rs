//! Handler for the `validate-config` command.

use serde::Serialize;

use crate::adapter::inbound::cli::command::ValidateArgs;
use crate::adapter::inbound::cli::output;
use crate::application::scanner::schedule::UpdateSchedule;
use crate::domain::id::AppId;
use crate::error::Result;
use crate::infrastructure::config::settings::Config;

/// Summary of a validated configuration.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub valid: bool,
    pub listen_addr: String,
    pub public_url: String,
    pub upstream_endpoint: String,
    pub upstream_token_loaded: bool,
    pub clusters: Vec<String>,
    pub apps: Vec<AppSummary>,
}

#[derive(Debug, Serialize)]
pub struct AppSummary {
    pub id: String,
    pub schedule: String,
    pub scheduled: bool,
    pub auto_deploy: String,
    pub clusters: Vec<String>,
}

/// Build the summary of a loaded configuration.
pub fn summarize(config: &Config) -> Result<ConfigSummary> {
    let mut apps = Vec::with_capacity(config.apps.len());
    for seed in &config.apps {
        let schedule = UpdateSchedule::parse(&seed.update_check_schedule, &AppId::new(seed.id.as_str()))?;
        apps.push(AppSummary {
            id: seed.id.clone(),
            schedule: seed.update_check_schedule.clone(),
            scheduled: !schedule.is_never() && !seed.is_airgap,
            auto_deploy: seed.auto_deploy.to_string(),
            clusters: seed.clusters.clone(),
        });
    }

    Ok(ConfigSummary {
        valid: true,
        listen_addr: config.server.listen_addr.clone(),
        public_url: config.server.public_url.clone(),
        upstream_endpoint: config.upstream.endpoint.clone(),
        upstream_token_loaded: config.upstream.token.is_some(),
        clusters: config.clusters.iter().map(|c| c.id.clone()).collect(),
        apps,
    })
}

/// Execute `validate-config`.
pub fn execute(args: &ValidateArgs) -> Result<()> {
    let config = Config::load(&args.config)?;
    let summary = summarize(&config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    output::success(&format!("{} is valid", args.config.display()));
    output::section("Server");
    output::field("Listen", &summary.listen_addr);
    output::field("Public URL", &summary.public_url);
    output::section("Upstream");
    output::field("Endpoint", &summary.upstream_endpoint);
    output::field(
        "Token",
        if summary.upstream_token_loaded { "loaded" } else { "not set" },
    );
    output::section("Clusters");
    if summary.clusters.is_empty() {
        output::note("(none)");
    }
    for cluster in &summary.clusters {
        output::note(&format!("- {cluster}"));
    }
    output::section("Apps");
    if summary.apps.is_empty() {
        output::note("(none)");
    }
    for app in &summary.apps {
        let schedule = if app.scheduled {
            app.schedule.as_str()
        } else {
            "disabled"
        };
        output::note(&format!(
            "- {} (schedule: {schedule}, auto-deploy: {}, clusters: {})",
            app.id,
            app.auto_deploy,
            app.clusters.join(", ")
        ));
    }
    Ok(())
}
