//! nextgamf AMF
//!
//! Main binary: parses the command line, loads the configuration, provisions
//! the subscriber store and serves NGAP until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! nextgamf-amf -c config/amf.yaml
//! ```

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use nextgamf_amf::{AmfApp, SubscriberDb};
use nextgamf_common::{init_logging, AmfConfig, LogLevel};

/// nextgamf - 5G Access and Mobility Management Function
#[derive(Parser, Debug)]
#[command(name = "nextgamf-amf")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the AMF configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(short = 'l', long = "log-level", default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

/// Loads the configuration and builds the subscriber store from it.
async fn load(path: &Path) -> Result<(AmfConfig, Arc<SubscriberDb>)> {
    let config = AmfConfig::from_yaml_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    let db = Arc::new(SubscriberDb::new(config.primary_plmn()));
    for profile in &config.subscribers {
        db.provision(profile)
            .await
            .with_context(|| format!("Failed to provision subscriber {}", profile.supi))?;
    }
    Ok((config, db))
}

async fn run_amf(args: Args) -> Result<()> {
    info!("Loading configuration from: {}", args.config_file);
    let (config, db) = load(Path::new(&args.config_file)).await?;
    info!(
        "Configuration loaded: AMF {}, PLMN {}, {} TAI(s), {} subscriber(s)",
        config.amf_name,
        config.primary_plmn(),
        config.tai_list.len(),
        config.subscribers.len()
    );

    let app = AmfApp::start(config, db)
        .await
        .context("Failed to start AMF")?;

    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, initiating shutdown...");

    app.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    println!("nextgamf AMF - 5G Access and Mobility Management Function");
    println!("==========================================================");

    match run_amf(args).await {
        Ok(()) => {
            info!("AMF exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("AMF failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
