//! nvmemon - NVMe SMART health monitor
//!
//! # Usage
//!
//! ```bash
//! # Interactive dashboard over the default log
//! nvmemon
//!
//! # Headless alert loop with an explicit config
//! nvmemon --headless --config /etc/nvmemon.toml
//! ```
//!
//! # Environment Variables
//!
//! - `NVMEMON_CONFIG`: path to the TOML config (overridden by `--config`)
//! - `SMTP_SERVER` / `SMTP_PORT` / `EMAIL_ADDRESS` / `EMAIL_PASSWORD` /
//!   `RECIPIENT`: SMTP delivery; alerts go to the process log when unset
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use nvmemon::alert::{AlertTransport, LogTransport, SmtpAlertTransport, SmtpConfig};
use nvmemon::config::MonitorConfig;
use nvmemon::input::CrosstermInput;
use nvmemon::render::PlainRenderer;
use nvmemon::Monitor;

#[derive(Parser, Debug)]
#[command(name = "nvmemon")]
#[command(about = "NVMe SMART health monitor")]
#[command(version)]
struct CliArgs {
    /// Run the alert-evaluation loop only, without the dashboard
    #[arg(long)]
    headless: bool,

    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the health log location from the config
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Logs go to stderr so the dashboard owns stdout.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let mut config =
        MonitorConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(log_file) = args.log_file {
        config.monitor.log_file = log_file;
    }

    let transport: Box<dyn AlertTransport> = match SmtpConfig::from_env() {
        Some(smtp) => Box::new(SmtpAlertTransport::new(smtp)),
        None => {
            if config.alert_settings.alerts_enabled {
                warn!("SMTP not configured - alerts will only be logged");
            }
            Box::new(LogTransport)
        }
    };

    let monitor = Monitor::new(config)?;

    if args.headless {
        monitor.run_headless(&*transport)
    } else {
        let mut input = CrosstermInput::new().context("entering raw terminal mode")?;
        let mut renderer = PlainRenderer::stdout();
        monitor.run_interactive(&mut input, &mut renderer, &*transport)
    }
}
