//! CLI for the MQTT-Kafka bridge
//!
//! Loads `.env`, the config file and `BRIDGE__*` environment overrides, then
//! runs the bridge until SIGINT/SIGTERM or a fatal error.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mqtt_kafka_bridge::bridge;
use mqtt_kafka_bridge::config::{DEFAULT_CONFIG_PATH, Settings, load_config_from};
use mqtt_kafka_bridge::shutdown::{exit_code, listen_for_signals};
use mqtt_kafka_bridge::utils::{BridgeError, logging};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "mqtt-kafka-bridge", about = "Relay MQTT telemetry into Kafka")]
struct Cli {
    /// Config file path, extension optional (toml, yaml or json)
    #[arg(long, env = "BRIDGE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level, overrides `runtime.log_level`
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match load_settings(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init(cli.log_level.as_deref().unwrap_or("info"));
            let err = BridgeError::Config(format!("{e:#}"));
            error!("{err}");
            return ExitCode::from(err.exit_code());
        }
    };
    logging::init(
        cli.log_level
            .as_deref()
            .unwrap_or(&settings.runtime.log_level),
    );

    let token = CancellationToken::new();
    let signals = settings
        .runtime
        .handle_signals
        .then(|| listen_for_signals(token.clone()));

    let outcome = bridge::run(settings, token.clone()).await;
    token.cancel();
    if let Some(signals) = signals {
        let _ = signals.await;
    }

    match &outcome {
        Ok(()) => info!("Shutdown complete"),
        Err(e) => error!("Bridge failed: {e}"),
    }
    ExitCode::from(exit_code(&outcome))
}

fn load_settings(path: &str) -> anyhow::Result<Settings> {
    let settings =
        load_config_from(path).with_context(|| format!("failed to load config from '{path}'"))?;
    settings.validate().context("invalid configuration")?;
    Ok(settings)
}
