mod operator;

use anyhow::Context;
use canvass_engine::config::{CanvassConfig, ConfigLoader};
use canvass_engine::driver::ScriptedDriver;
use canvass_engine::knowledge::{FileStore, KnowledgeStore};
use canvass_engine::learner::KnowledgeLearner;
use canvass_engine::ledger::{JsonlLedger, LedgerSummary, read_entries};
use canvass_engine::strategy::StrategyRegistry;
use canvass_engine::SessionEngine;
use clap::{Parser, Subcommand};
use operator::ConsoleOperator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "canvass", version, about = "Confidence-gated survey automation")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (defaults to ./canvass.yaml, then ~/.canvass/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a session against a recorded page script
    Replay {
        /// JSON script of survey pages
        #[arg(long)]
        script: PathBuf,
        #[arg(long)]
        session_id: Option<String>,
        /// Stop after this many questions
        #[arg(long)]
        max: Option<usize>,
        /// Ask on the terminal before each operator hand-off
        #[arg(long)]
        interactive: bool,
    },
    /// Inspect the outcome ledger
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },
    /// Inspect or rebuild learned knowledge
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },
    /// Validate configuration and list the active strategies
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum LedgerAction {
    /// Aggregate automation statistics
    Summary {
        /// Ledger file (defaults to storage.ledger_path)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Print the knowledge base
    Show,
    /// Replay stored interventions into the knowledge base
    Rebuild,
}

#[derive(Subcommand)]
enum ConfigAction {
    Check,
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<CanvassConfig> {
    let config = match path {
        Some(path) => ConfigLoader::load_from(path)
            .await
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigLoader::load_default().await?,
    };
    Ok(config)
}

fn registry_for(config: &CanvassConfig) -> StrategyRegistry {
    let mut registry = StrategyRegistry::with_builtins();
    for definition in &config.strategies {
        registry.register(definition.clone());
    }
    registry
}

/// Seconds since the epoch plus a random suffix, so two runs started in the
/// same second do not share intervention ids.
fn default_session_id() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let nonce = Uuid::new_v4().simple().to_string();
    format!("session-{}-{}", secs, &nonce[..8])
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn replay(
    config: CanvassConfig,
    script: &Path,
    session_id: Option<String>,
    max: Option<usize>,
    interactive: bool,
) -> anyhow::Result<()> {
    let mut driver = ScriptedDriver::from_file(script)
        .await
        .with_context(|| format!("loading script {}", script.display()))?;
    let store = Arc::new(FileStore::new(&config.storage.knowledge_dir));
    let ledger = JsonlLedger::open(&config.storage.ledger_path).await?;
    let session_id = session_id.unwrap_or_else(default_session_id);
    info!(session = %session_id, script = %script.display(), "Starting replay");

    let mut engine = SessionEngine::new(session_id, config, store, Box::new(ledger));
    let report = if interactive {
        let mut operator = ConsoleOperator::new(driver.operator());
        engine.run(&mut driver, &mut operator, max).await?
    } else {
        let mut operator = driver.operator();
        engine.run(&mut driver, &mut operator, max).await?
    };
    print_json(&report)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries JSON reports.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref()).await?;

    match args.command {
        Command::Replay {
            script,
            session_id,
            max,
            interactive,
        } => replay(config, &script, session_id, max, interactive).await?,
        Command::Ledger {
            action: LedgerAction::Summary { path },
        } => {
            let path = path.unwrap_or_else(|| config.storage.ledger_path.clone());
            let entries = if path.exists() {
                read_entries(&path).await?
            } else {
                Vec::new()
            };
            print_json(&LedgerSummary::from_entries(&entries))?;
        }
        Command::Knowledge { action } => {
            let store = FileStore::new(&config.storage.knowledge_dir);
            match action {
                KnowledgeAction::Show => print_json(&store.load().await?)?,
                KnowledgeAction::Rebuild => {
                    let registry = registry_for(&config);
                    let learner = KnowledgeLearner::new(config.learning.clone(), &registry);
                    let report = learner.rebuild(&store).await?;
                    println!(
                        "Replayed {} interventions, {} suggestions, {} changes",
                        report.records, report.suggestions, report.changed
                    );
                }
            }
        }
        Command::Config {
            action: ConfigAction::Check,
        } => {
            let registry = registry_for(&config);
            println!("Configuration OK");
            for strategy in registry.list() {
                println!(
                    "  {:<24} family={:<20} threshold={:.2}",
                    strategy.name, strategy.family, strategy.criteria.threshold
                );
            }
        }
    }
    Ok(())
}
