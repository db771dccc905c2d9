// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod logger;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::{env, time::Duration};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use sg_forwarder::{
    bus::{Application, BusPublisher, EventBus},
    dispatch::AdapterStats,
    config::{self, log_level::LogLevel, Config},
    elasticsearch, loki,
    logs::LogHandler,
    transport::LogListener,
};

/// Time given to background tasks to wind down after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
pub async fn main() -> ExitCode {
    let config_directory = env::var("SG_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));

    let config = config::get_config(&config_directory);
    let log_level = config
        .as_ref()
        .map_or(LogLevel::default(), |config| config.log_level);
    if let Err(e) = init_logging(log_level) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    debug!("Logging subsystem enabled");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_level: LogLevel) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = format!(
        "h2=off,hyper=off,rustls=off,reqwest=off,{}",
        log_level.as_level_filter()
    );

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(env_filter)?)
        .with_level(true)
        .with_target(false)
        .with_ansi(false)
        .without_time()
        .event_format(logger::Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn report_stats(
    plugin: &'static str,
    stats: Arc<AdapterStats>,
    publisher: BusPublisher,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move { stats.run(plugin, &publisher, cancel).await })
}

async fn run(config: Config) -> Result<(), String> {
    let cancel = CancellationToken::new();
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut applications: Vec<Arc<dyn Application>> = Vec::new();
    let (bus, publisher) = EventBus::new();

    if let Some(es_config) = &config.elasticsearch {
        match elasticsearch::start(es_config).await {
            Ok((app, worker)) => {
                tasks.push(tokio::spawn(worker.run(cancel.clone())));
                tasks.push(report_stats(
                    elasticsearch::APP_NAME,
                    Arc::clone(app.stats()),
                    publisher.clone(),
                    cancel.clone(),
                ));
                applications.push(Arc::new(app));
            }
            Err(e) => error!(plugin = elasticsearch::APP_NAME, "adapter disabled: {e}"),
        }
    }

    if let Some(loki_config) = &config.loki {
        match loki::start(loki_config).await {
            Ok((app, worker)) => {
                tasks.push(tokio::spawn(worker.run(cancel.clone())));
                tasks.push(report_stats(
                    loki::APP_NAME,
                    Arc::clone(app.stats()),
                    publisher.clone(),
                    cancel.clone(),
                ));
                applications.push(Arc::new(app));
            }
            Err(e) => error!(plugin = loki::APP_NAME, "adapter disabled: {e}"),
        }
    }

    if applications.is_empty() {
        return Err("no output adapter could be started, exiting".to_string());
    }
    info!(
        applications = ?applications.iter().map(|app| app.name()).collect::<Vec<_>>(),
        "output adapters running"
    );

    let handler = Arc::new(LogHandler::new(config.logs.clone()));

    let listener = LogListener::bind(
        &config.transport,
        Arc::clone(&handler),
        Arc::new(publisher.clone()),
        cancel.clone(),
    )
    .await
    .map_err(|e| format!("failed to bind {}: {e}", config.transport.address))?;
    info!(address = %config.transport.address, "listening for logs");

    tasks.push(tokio::spawn(listener.spin()));
    tasks.push(tokio::spawn({
        let cancel = cancel.clone();
        async move { handler.run(&publisher, cancel).await }
    }));
    tasks.push(tokio::spawn(bus.run(applications, cancel.clone())));

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {e}");
    }
    info!("shutting down");
    cancel.cancel();

    for task in tasks {
        match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("task ended abnormally: {e}"),
            Err(_) => warn!("task did not stop within {:?}", SHUTDOWN_GRACE),
        }
    }
    Ok(())
}
