//! # Slack Events Responder
//!
//! Runs the example bot: loads configuration, sets up logging and serves the
//! Slack events endpoint.

use logfire::config::{MetricsOptions, SendToLogfire};
use ntex::web;
use slackevent_responder::{SlackEventApp, client::SlackClient, config, demo, routes};
use std::sync::Arc;

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    // Initialize configuration
    let app_config = config::init_config()?;

    // Initialize logging and metrics
    let logfire = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()));
    let logfire = match &app_config.logfire_token {
        Some(token) => logfire
            .send_to_logfire(SendToLogfire::Yes)
            .with_token(token),
        None => logfire.send_to_logfire(SendToLogfire::No),
    };
    let shutdown_handler = logfire.finish()?;

    let events = SlackEventApp::new(app_config.slack_signing_secret.clone())
        .with_event_path(app_config.slack_event_path.clone());
    demo::register(&events, Arc::new(SlackClient::from_config(app_config)));

    logfire::info!(
        "Serving Slack events on {host}:{port}{path}",
        host = app_config.web_server_host.clone(),
        port = app_config.web_server_port.to_string(),
        path = events.event_path().to_string()
    );

    run_server(events, app_config).await?;

    shutdown_handler.shutdown()?;

    Ok(())
}

/// Binds the events endpoint and serves until shutdown.
async fn run_server(events: SlackEventApp, app_config: &config::AppConfig) -> anyhow::Result<()> {
    let path = events.event_path().to_string();

    web::server(move || {
        let path = path.clone();
        web::App::new()
            .wrap(web::middleware::Logger::default())
            .state(events.clone())
            .configure(move |cfg| routes::slack_events(cfg, &path))
    })
    .bind(app_config.server_addr())?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
