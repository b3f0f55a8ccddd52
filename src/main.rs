use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use deal_versions::db::memory::MemoryBackend;
use deal_versions::db::Database;
use deal_versions::versions::{
    AutoConfirm, CreateSession, OperatorPrompt, RefreshBus, VersionBrowser,
};
use deal_versions::{Config, Settings};

#[derive(Parser, Debug)]
#[command(name = "deal-versions")]
#[command(about = "Inspect and manage deal versions stored in a JSON fixture")]
struct Cli {
    /// Fixture file holding parents, versions, and line items
    #[arg(long, env = "DEAL_VERSIONS_FIXTURE", default_value = "fixture.json")]
    fixture: PathBuf,

    /// Optional TOML settings file
    #[arg(long, env = "DEAL_VERSIONS_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the versions of a parent with the actions each allows
    List { parent_id: String },
    /// Show the name and type the next version of a parent would get
    NextName { parent_id: String },
    /// Show the line items of a version
    LineItems { version_id: String },
    /// Approve a draft, making it the syncing version
    Approve {
        parent_id: String,
        version_id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Delete a version and its line items
    Delete {
        parent_id: String,
        version_id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// Asks on the terminal; anything but "y" or "yes" declines.
struct StdinPrompt;

#[async_trait]
impl OperatorPrompt for StdinPrompt {
    async fn confirm(&self, message: &str) -> bool {
        let mut stdout = tokio::io::stdout();
        if stdout
            .write_all(format!("{message} [y/N] ").as_bytes())
            .await
            .is_err()
        {
            return false;
        }
        let _ = stdout.flush().await;

        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if stdin.read_line(&mut answer).await.is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

fn prompt_for(yes: bool) -> Arc<dyn OperatorPrompt> {
    if yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(StdinPrompt)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    let config = Config::resolve(&settings)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let backend = Arc::new(
        MemoryBackend::load(&cli.fixture)
            .await
            .with_context(|| format!("failed to load fixture {}", cli.fixture.display()))?,
    );
    let db: Arc<dyn Database> = backend.clone();
    let bus = RefreshBus::new();

    match cli.command {
        Command::List { parent_id } => {
            let browser = VersionBrowser::open(
                db,
                bus,
                config.versions,
                prompt_for(true),
                &parent_id,
            )
            .await?;
            for warning in browser.warnings() {
                eprintln!("warning: {warning}");
            }
            for version in browser.versions() {
                let actions: Vec<&str> = browser
                    .row_actions(&version.id)
                    .into_iter()
                    .map(|a| a.as_str())
                    .collect();
                println!(
                    "{}{}\t{}\t{}\t{}\tprice={} hours={} cost={}\t[{}]",
                    if version.syncing { "* " } else { "  " },
                    version.id,
                    version.name,
                    version.version_type.as_str(),
                    version.status.as_str(),
                    version.total_price,
                    version.total_hours,
                    version.total_cost,
                    actions.join(", "),
                );
            }
        }
        Command::NextName { parent_id } => {
            let session = CreateSession::open(db, bus, &config.versions, &parent_id).await?;
            for warning in session.warnings() {
                eprintln!("warning: {warning}");
            }
            println!("{}\t{}", session.name(), session.version_type().as_str());
            if let Some(source) = session.source_version_id() {
                println!(
                    "seeded with {} line item(s) from {source}",
                    session.line_items().len()
                );
            }
        }
        Command::LineItems { version_id } => {
            let items = db.list_line_items(&version_id).await?;
            for item in items {
                println!(
                    "{}\t{}\thours={} price={} cost={}{}",
                    item.id,
                    item.product_label.as_deref().unwrap_or("-"),
                    item.hours.unwrap_or_default(),
                    item.price.unwrap_or_default(),
                    item.cost.unwrap_or_default(),
                    if item.pricing_complete { "\tcomplete" } else { "" },
                );
            }
        }
        Command::Approve {
            parent_id,
            version_id,
            yes,
        } => {
            let mut browser =
                VersionBrowser::open(db, bus, config.versions, prompt_for(yes), &parent_id).await?;
            browser.approve(&version_id).await?;
            backend.save(&cli.fixture).await?;
            for warning in browser.warnings() {
                eprintln!("warning: {warning}");
            }
            println!("approved {version_id}");
        }
        Command::Delete {
            parent_id,
            version_id,
            yes,
        } => {
            let mut browser =
                VersionBrowser::open(db, bus, config.versions, prompt_for(yes), &parent_id).await?;
            browser.delete(&version_id).await?;
            backend.save(&cli.fixture).await?;
            for warning in browser.warnings() {
                eprintln!("warning: {warning}");
            }
            println!("deleted {version_id}");
        }
    }

    Ok(())
}
