use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use aggo_config::{AggoConfig, HumanDuration};
use aggo_runtime::lifecycle::{Reactor, load_rules, wait_for_signal};
use aggo_runtime::tracing_init::init_tracing;

#[derive(Parser)]
#[command(name = "aggo", about = "Rule-driven event aggregation service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the aggregation service
    Run {
        /// Path to aggo.toml config file
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate the config and rule files, then print the rule set
    Check {
        /// Path to aggo.toml config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Canonical config path plus the directory relative paths resolve against.
fn locate(config: &Path) -> Result<(PathBuf, PathBuf)> {
    let path = config
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
    let base_dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("config path '{}' has no parent directory", path.display()))?
        .to_path_buf();
    Ok((path, base_dir))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let (config_path, base_dir) = locate(&config)?;
            let aggo_config = AggoConfig::load(&config_path)?;

            let _guard = init_tracing(&aggo_config.logging, &base_dir)?;

            let reactor = Reactor::start(aggo_config, &base_dir)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            tracing::info!(domain = "sys", listen = %reactor.listen_addr(), "aggo started");

            wait_for_signal(reactor.cancel_token()).await;
            reactor.shutdown();
            reactor.wait().await.map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        Commands::Check { config } => {
            let (config_path, base_dir) = locate(&config)?;
            let aggo_config = AggoConfig::load(&config_path)?;
            let mut rules =
                load_rules(&aggo_config, &base_dir).map_err(|e| anyhow::anyhow!("{e}"))?;
            rules.sort_by(|a, b| a.id.cmp(&b.id));

            println!("{}: ok, {} rule(s)", config_path.display(), rules.len());
            let default = aggo_config.runtime.default_destination.as_deref().unwrap_or("");
            for rule in &rules {
                let destination = if rule.destination.is_empty() {
                    default
                } else {
                    &rule.destination
                };
                let types: Vec<&str> = rule.event_types.iter().map(String::as_str).collect();
                println!(
                    "  {:<24} wait={:<8} -> {}  [{}]",
                    rule.id,
                    HumanDuration::from(rule.wait_window()).to_string(),
                    destination,
                    types.join(", ")
                );
            }
        }
    }

    Ok(())
}
