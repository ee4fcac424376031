//! gatecheck CLI
//!
//! Diagnoses the path to a gateway: SSH tunnel, TCP reachability, transport
//! and the signed connect handshake.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gatecheck::commands;
use gatecheck::output::print_error;
use gatecheck::report::DEFAULT_REPORT_FILE;
use gc_core::config::{self, GatecheckConfig, TOKEN_ENV_VAR};
use gc_core::Endpoint;

#[derive(Parser)]
#[command(name = "gatecheck")]
#[command(author, version, about = "Gateway connectivity and handshake diagnostics")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every diagnostic stage and write a report
    Check {
        #[command(flatten)]
        target: TargetArgs,
        /// Extra handshake attempts on transient failures
        #[arg(long, default_value_t = 0)]
        retries: u32,
        /// Where to write the JSON report
        #[arg(long, default_value = DEFAULT_REPORT_FILE)]
        report: PathBuf,
        /// Do not write the JSON report
        #[arg(long, conflicts_with = "report")]
        no_report: bool,
    },

    /// Run the connect handshake once and print the outcome
    Handshake {
        #[command(flatten)]
        target: TargetArgs,
        /// Extra attempts on transient failures
        #[arg(long, default_value_t = 0)]
        retries: u32,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for the gateway and handshake settings in the config file
#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// Gateway host
    #[arg(long)]
    host: Option<String>,
    /// Gateway port
    #[arg(short, long)]
    port: Option<u16>,
    /// Gateway token
    #[arg(long, env = TOKEN_ENV_VAR, hide_env_values = true)]
    token: Option<String>,
    /// Expect an SSH local forward to the gateway on 127.0.0.1
    #[arg(long)]
    tunnel: bool,
    /// SSH host the tunnel goes through
    #[arg(long)]
    ssh_host: Option<String>,
    /// SSH user for the tunnel
    #[arg(long)]
    ssh_user: Option<String>,
    /// Handshake timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Connect with the token only, without a device assertion
    #[arg(long)]
    no_device: bool,
}

impl TargetArgs {
    fn apply(self, config: &mut GatecheckConfig) {
        if let Some(host) = self.host {
            config.gateway.host = host;
        }
        if let Some(port) = self.port {
            config.gateway.port = port;
        }
        if let Some(token) = self.token {
            config.gateway.token = Some(token);
        }
        if self.tunnel {
            config.tunnel.enabled = true;
        }
        if let Some(ssh_host) = self.ssh_host {
            config.tunnel.ssh_host = Some(ssh_host);
        }
        if let Some(ssh_user) = self.ssh_user {
            config.tunnel.ssh_user = ssh_user;
        }
        if let Some(secs) = self.timeout {
            config.handshake.timeout = Duration::from_secs(secs);
        }
        if self.no_device {
            config.handshake.device_auth = false;
        }
        // Through a tunnel the gateway is the local end of the forward
        if config.tunnel.enabled {
            let remote = Endpoint::new(
                std::mem::replace(&mut config.gateway.host, "127.0.0.1".to_string()),
                config.gateway.port,
            );
            if config.tunnel.ssh_host.is_none() && !remote.is_loopback() {
                config.tunnel.ssh_host = Some(remote.host);
            }
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

/// Dispatch the command; `Ok(false)` means the diagnosis found a problem
async fn run(cli: Cli) -> Result<bool> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Check {
            target,
            retries,
            report,
            no_report,
        } => {
            let config = effective_config(config_path, target)?;
            let report_path = (!no_report).then_some(report);
            with_cancel(|cancel| async move {
                commands::check_command(&config, retries, report_path.as_deref(), &cancel).await
            })
            .await
        }

        Commands::Handshake { target, retries } => {
            let config = effective_config(config_path, target)?;
            with_cancel(|cancel| async move {
                commands::handshake_command(&config, retries, &cancel).await
            })
            .await
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Show => commands::config_show(config_path)?,
                ConfigAction::Path => commands::config_path(config_path)?,
                ConfigAction::Init { force } => commands::config_init(config_path, force)?,
            }
            Ok(true)
        }
    }
}

/// Config file (or defaults) with command-line overrides applied
fn effective_config(config_path: Option<&Path>, target: TargetArgs) -> Result<GatecheckConfig> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path);

    let mut config = match config_path {
        // An explicitly named file must exist
        Some(_) => config::load_config(&path),
        None => config::load_or_default(&path),
    }
    .with_context(|| format!("Failed to load config from {:?}", path))?;

    target.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    tracing::debug!("Effective gateway: {}", config.gateway.endpoint());
    Ok(config)
}

/// Run `task` with a token that is cancelled on Ctrl+C
async fn with_cancel<F, Fut>(task: F) -> Result<bool>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            trigger.cancel();
        }
    });

    task(cancel).await
}
