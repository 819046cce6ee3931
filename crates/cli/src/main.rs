use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use db::RunFilter;
use factory_core::{validate_project_slug, ProvisionRun, ProvisionState};
use orchestrator::WaitMode;
use server::config::{FactoryConfig, DEFAULT_CONFIG_FILE};
use server::startup;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "platform-factory")]
#[command(about = "Provision tenant application stacks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Show a run's state and metadata
    Status { slug: String },
    /// Drive a run forward, restarting a failed one at the state it failed in
    Resume { slug: String },
    /// Soft-delete a run so the slug can be provisioned again
    Delete { slug: String },
    /// List runs, newest first
    List {
        #[arg(long)]
        state: Option<String>,
    },
    /// Remove soft-deleted runs older than the cutoff
    Purge {
        #[arg(long)]
        older_than_days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = FactoryConfig::load(&cli.config).await;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            startup::serve(config).await
        }
        Commands::Status { slug } => status(&config, &slug).await,
        Commands::Resume { slug } => resume(&config, &slug).await,
        Commands::Delete { slug } => delete(&config, &slug).await,
        Commands::List { state } => list(&config, state.as_deref()).await,
        Commands::Purge { older_than_days } => purge(&config, older_than_days).await,
    }
}

async fn status(config: &FactoryConfig, slug: &str) -> Result<()> {
    validate_project_slug(slug)?;
    let store = startup::open_store(&config.server.database_url).await?;

    match store.find_by_slug(slug).await? {
        Some(run) => {
            println!("{}", serde_json::to_string_pretty(&run)?);
            Ok(())
        }
        None => bail!("No provision run for {}", slug),
    }
}

async fn resume(config: &FactoryConfig, slug: &str) -> Result<()> {
    let store = startup::open_store(&config.server.database_url).await?;
    let orchestrator = startup::build_orchestrator(config, store).await?;

    let report = orchestrator
        .resume(slug, WaitMode::Poll)
        .await
        .with_context(|| format!("Failed to resume {}", slug))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn delete(config: &FactoryConfig, slug: &str) -> Result<()> {
    validate_project_slug(slug)?;
    let store = startup::open_store(&config.server.database_url).await?;

    if !store.delete(slug).await? {
        bail!("No provision run for {}", slug);
    }
    println!("Deleted {}", slug);
    Ok(())
}

async fn list(config: &FactoryConfig, state: Option<&str>) -> Result<()> {
    let state = match state {
        Some(name) => Some(
            ProvisionState::parse(name)
                .with_context(|| format!("Unknown provision state: {}", name))?,
        ),
        None => None,
    };
    let store = startup::open_store(&config.server.database_url).await?;
    let runs = store.list(&RunFilter { state }).await?;

    if runs.is_empty() {
        println!("No provision runs.");
        return Ok(());
    }
    for run in &runs {
        println!("{}", summary_line(run));
    }
    Ok(())
}

async fn purge(config: &FactoryConfig, older_than_days: u32) -> Result<()> {
    let store = startup::open_store(&config.server.database_url).await?;
    let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));

    let purged = store.purge_deleted(cutoff).await?;
    println!("Purged {} deleted run(s)", purged);
    Ok(())
}

fn summary_line(run: &ProvisionRun) -> String {
    let mut line = format!(
        "{:<32} {:<30} {}",
        run.project_slug,
        run.state.as_str(),
        run.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(error) = &run.error {
        line.push_str("  ");
        line.push_str(error);
    }
    line
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "platform_factory=info,server=info,orchestrator=info,tower_http=info".into()
            }),
        )
        .init();
}
