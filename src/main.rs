// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tgdrop::config::{parse_bool_flag, Args, Config, ConfigError};
use tgdrop::credentials::CredentialError;
use tgdrop::error::OperatorHint;
use tgdrop::shutdown;
use tgdrop::transport::{Transport, TransportError};
use tgdrop::Agent;

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// Success - clean shutdown
    pub const SUCCESS: i32 = 0;
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Service unavailable - could not connect or log in
    pub const SERVICE_UNAVAILABLE: i32 = 69;
    /// Internal software error - runtime could not start
    pub const SOFTWARE: i32 = 70;
    /// Temporary failure - login secret not supplied in time
    pub const TEMP_FAIL: i32 = 75;
    /// Configuration error - invalid or missing config
    pub const CONFIG: i32 = 78;
}

use exit_codes::*;

/// Save documents sent to a Telegram account by one allowed user.
#[derive(Parser)]
#[command(name = "tgdrop", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    args: Args,
}

fn init_logging(debug: bool) {
    let default_directive = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(feature = "mtproto")]
async fn build_transport(config: &Config) -> anyhow::Result<Arc<dyn Transport>> {
    use tgdrop::transport::mtproto::MtprotoTransport;

    let transport = MtprotoTransport::connect(&config.api, &config.session_file)
        .await
        .context("Failed to connect to Telegram")?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "mtproto"))]
async fn build_transport(_config: &Config) -> anyhow::Result<Arc<dyn Transport>> {
    Err(TransportError::Connect(
        "this build has no Telegram backend (rebuild with --features mtproto)".to_string(),
    ))
    .context("Failed to connect to Telegram")
}

/// Map a fatal error onto an exit code by looking through its cause chain.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CredentialError>() {
            return match e {
                CredentialError::Timeout { .. } => TEMP_FAIL,
                CredentialError::Cancelled { .. } => SUCCESS,
                _ => ERROR,
            };
        }
    }
    for cause in err.chain() {
        if cause.downcast_ref::<TransportError>().is_some() {
            return SERVICE_UNAVAILABLE;
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return CONFIG;
        }
    }
    ERROR
}

fn report_fatal(err: &anyhow::Error, config: &Config) {
    let timeout = err
        .chain()
        .find_map(|cause| match cause.downcast_ref::<CredentialError>() {
            Some(CredentialError::Timeout { path, waited }) => Some((path.clone(), *waited)),
            _ => None,
        });

    match timeout {
        Some((path, waited)) => OperatorHint::new(format!(
            "No login secret arrived within {}s",
            waited.as_secs()
        ))
        .cause(format!("{} was never created or stayed empty", path.display()))
        .fix(format!("Write the code from your Telegram app into {}", config.code_file.display()))
        .fix(format!(
            "If 2FA is enabled, write the password into {}",
            config.password_file.display()
        ))
        .fix("Restart the agent to request a new code")
        .log_error(),
        None => tracing::error!("{:#}", err),
    }
}

async fn run(config: Config) -> i32 {
    let (trigger, shutdown) = shutdown::channel();
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::info!("Shutting down...");
        trigger.trigger();
    });

    let transport = match build_transport(&config).await {
        Ok(transport) => transport,
        Err(e) => {
            report_fatal(&e, &config);
            return exit_code_for(&e);
        }
    };

    let agent = Agent::new(config, transport);
    match agent.run(shutdown).await {
        Ok(_) => SUCCESS,
        Err(e) => {
            report_fatal(&e, agent.config());
            exit_code_for(&e)
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let debug = cli
        .args
        .debug
        .as_deref()
        .and_then(parse_bool_flag)
        .unwrap_or(false);
    init_logging(debug);

    let config = match Config::from_args(&cli.args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(CONFIG);
        }
    };
    if let Err(e) = config.ensure_download_dir() {
        tracing::error!("{}", e);
        std::process::exit(CONFIG);
    }

    tracing::info!("Starting tgdrop v{}", env!("CARGO_PKG_VERSION"));
    config.log_summary();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create Tokio runtime: {}", e);
            std::process::exit(SOFTWARE);
        }
    };

    let code = runtime.block_on(run(config));
    // Don't wait on the signal listener or a blocked transport call.
    runtime.shutdown_background();
    std::process::exit(code);
}
