//! Headless Seline driver
//!
//! Configures a tracker from the environment and sends one event per
//! invocation. Opt-out and the visitor cookie persist under the state
//! directory, so repeated runs behave like repeated page loads.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use seline::{FileStorage, HttpTransport, Location, MemoryHost, Tracker};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "seline")]
#[command(about = "Send analytics events to Seline")]
#[command(version)]
struct Cli {
    /// Pathname of the page the event happens on
    #[arg(long, global = true)]
    path: Option<String>,

    /// Query string, including the leading '?'
    #[arg(long, global = true, default_value = "")]
    search: String,

    /// Hostname of the page, used for the cookie domain and referrer checks
    #[arg(long, global = true)]
    hostname: Option<String>,

    /// Referrer of the page
    #[arg(long, global = true)]
    referrer: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a custom event
    Track {
        name: String,

        /// Event data as a JSON value
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Report a page view for PATH, or for --path
    Page { path: Option<String> },

    /// Merge user fields (a JSON object) and send them
    Identify { fields: String },

    /// Opt this machine out of tracking
    OptOut,

    /// Print the persisted visitor id, if any
    Visitor,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,seline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::debug!(state_dir = %config.state_dir.display(), "Configuration loaded");

    let host = build_host(&cli, &config)?;
    let transport = HttpTransport::new().context("Failed to build HTTP client")?;

    let tracker = Tracker::new(host, Arc::new(transport));
    tracker.init(config.options());

    match cli.command {
        Commands::Track { name, data } => {
            let data = data
                .map(|raw| parse_json(&raw, "--data"))
                .transpose()?;
            tracker.track(&name, data);
        }
        Commands::Page { path } => tracker.page(path.as_deref()),
        Commands::Identify { fields } => {
            let fields = parse_json(&fields, "user fields")?;
            if !fields.is_object() {
                anyhow::bail!("user fields must be a JSON object");
            }
            tracker.set_user(fields);
        }
        Commands::OptOut => tracker.do_not_track(),
        Commands::Visitor => {
            match tracker.visitor_id() {
                Some(id) => println!("{}", id),
                None => println!("(anonymous)"),
            }
            return Ok(());
        }
    }

    tracker.flush().await;

    if let Some(id) = tracker.visitor_id() {
        tracing::info!(visitor_id = %id, "Done");
    }

    Ok(())
}

fn build_host(cli: &Cli, config: &Config) -> Result<Arc<MemoryHost>> {
    let local = FileStorage::open(config.local_storage_path())
        .context("Failed to open local storage")?;
    let cookies = FileStorage::open(config.cookies_path()).context("Failed to open cookies")?;

    let mut host = MemoryHost::new()
        .with_local_storage(Arc::new(local))
        .with_cookie_jar(Arc::new(cookies));

    if let Some(path) = &cli.path {
        let mut location = Location::new(path.as_str()).with_search(cli.search.as_str());
        if let Some(hostname) = &cli.hostname {
            location = location.with_hostname(hostname.as_str());
        }
        host = host.with_location(location);
    }

    if let Some(referrer) = &cli.referrer {
        host = host.with_referrer(referrer.as_str());
    }

    Ok(Arc::new(host))
}

fn parse_json(raw: &str, what: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", what))
}
