//! guardantd — run the GuardAnt monitoring core as one process, or issue
//! a single command against a fresh in-process instance.

use clap::{Parser, Subcommand};
use guardant_config::{ConfigStore, GuardantConfig};
use guardantd::commands::handle_command;
use guardantd::System;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "guardantd")]
#[command(about = "GuardAnt monitoring core — composition-root daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon: load config, wire every component, start the
    /// background loops, and block until interrupted.
    Run {
        /// Path to the GuardAnt config file.
        #[arg(short, long, default_value = "/etc/guardantd/config.json")]
        config: PathBuf,

        /// Directory backing the JSON tenant data store.
        #[arg(short, long, default_value = "/var/lib/guardantd/data")]
        data_dir: PathBuf,
    },

    /// Write a config file populated with spec-documented defaults.
    InitConfig {
        #[arg(short, long, default_value = "/etc/guardantd/config.json")]
        output: PathBuf,
    },

    /// Execute a single command against a freshly built, unstarted system
    /// (for scripting and smoke tests; background loops are not started).
    ///
    /// Examples:
    ///   guardantd exec service.register --params '{"nestId":"n1","type":"web","target":"https://example.com","interval":60}'
    ///   guardantd exec service.check --params '{"nestId":"n1","serviceId":"svc_..."}'
    ///   guardantd exec sla.compute --params '{"nestId":"n1","slaTargetId":"sla_...","start":"2026-01-01T00:00:00Z","end":"2026-02-01T00:00:00Z"}'
    Exec {
        command: String,

        #[arg(long, default_value = "{}")]
        params: String,

        #[arg(short, long, default_value = "/etc/guardantd/config.json")]
        config: PathBuf,

        #[arg(short, long, default_value = "/var/lib/guardantd/data")]
        data_dir: PathBuf,
    },
}

fn init_tracing(quiet: bool) {
    if quiet {
        return;
    }
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, data_dir } => {
            init_tracing(false);
            let config_store = ConfigStore::load(&config)?;
            let cfg = config_store.snapshot();
            let system = System::build(&data_dir, &cfg, None).await?;
            system.start().await;
            info!(?config, ?data_dir, "guardantd running, press ctrl-c to stop");
            tokio::signal::ctrl_c().await?;
            system.shutdown().await;
        }

        Commands::InitConfig { output } => {
            init_tracing(false);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output, serde_json::to_string_pretty(&GuardantConfig::default())?)?;
            println!("wrote default config to {}", output.display());
        }

        Commands::Exec { command, params, config, data_dir } => {
            init_tracing(true);
            let config_store = ConfigStore::load(&config)?;
            let cfg = config_store.snapshot();
            let system = System::build(&data_dir, &cfg, None).await?;
            let params: serde_json::Value = serde_json::from_str(&params)?;
            let result = handle_command(&system, &command, params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
