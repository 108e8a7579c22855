//! Weaver command line
//!
//! ```bash
//! # Validate a blueprint, checking the live catalog as well
//! weaver validate scenario.json --live
//!
//! # Heal a YAML blueprint and print the result
//! weaver heal scenario.yaml
//!
//! # Find a substitute for a step id
//! weaver resolve airtable:ActionCreateRecord --live
//!
//! # Deploy with at most three submissions
//! weaver deploy scenario.json --max-attempts 3
//! ```

mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use weaver_blueprint::parser;
use weaver_deploy::{CancellationToken, DeploymentEngine, WeaverConfig};

#[derive(Parser)]
#[command(name = "weaver")]
#[command(version)]
#[command(about = "Validate, heal and deploy scenario blueprints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a blueprint file (JSON or YAML)
    Validate {
        file: PathBuf,

        /// Also check step availability against the live catalog
        #[arg(long)]
        live: bool,
    },

    /// Apply the deterministic repairs and print the healed blueprint
    Heal { file: PathBuf },

    /// Check a step id and propose a substitute when it is unavailable
    Resolve {
        step_id: String,

        /// Resolve against the live catalog instead of the static catalog
        #[arg(long)]
        live: bool,
    },

    /// Search the static step catalog
    Search {
        /// Keywords, `*` for everything, or `namespace:*`
        query: String,

        /// Restrict results to one app
        #[arg(long)]
        app: Option<String>,
    },

    /// Validate, heal and deploy a blueprint
    Deploy {
        file: PathBuf,

        /// Upper bound on submissions, overriding WEAVER_MAX_DEPLOY_ATTEMPTS
        #[arg(long)]
        max_attempts: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = WeaverConfig::load().context("Failed to load configuration")?;
    logging::init_logging(&config)?;

    if let Commands::Deploy {
        max_attempts: Some(max_attempts),
        ..
    } = &cli.command
    {
        config.max_deploy_attempts = *max_attempts;
    }

    let engine = DeploymentEngine::from_config(&config).context("Failed to initialize the engine")?;

    match cli.command {
        Commands::Validate { file, live } => {
            let blueprint = read_document(&file)?;
            let report = engine.validate(&blueprint, live).await;
            print_json(&report)?;
            Ok(if report.valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Commands::Heal { file } => {
            let document = read_document(&file)?;
            let blueprint = parser::parse_blueprint(&document)
                .with_context(|| format!("Failed to parse blueprint {}", file.display()))?;
            let (healed, report) = engine.heal(&blueprint);
            print_json(&json!({
                "blueprint": healed,
                "scheduling": healed.scheduling,
                "report": report,
            }))?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve { step_id, live } => {
            let resolution = engine.resolve(&step_id, live).await;
            print_json(&resolution)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Search { query, app } => {
            let steps = engine.catalog().search_steps(&query, app.as_deref());
            info!(query = %query, results = steps.len(), "Catalog search");
            print_json(&steps)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Deploy { file, .. } => {
            let blueprint = read_document(&file)?;
            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            let result = engine
                .deploy(&blueprint, &cancel)
                .await
                .context("Deployment failed")?;
            print_json(&result)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Cancel the deployment on Ctrl-C; takes effect between attempts
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current attempt");
            cancel.cancel();
        }
    });
}

fn read_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parser::parse_document(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
