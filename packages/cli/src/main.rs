#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for road reports.
//!
//! Without a subcommand it fetches the current reports and opens an
//! interactive menu. Subcommands run one action and exit; settings are
//! written back after every mutating action either way.
//!
//! Uses `indicatif-log-bridge` (via [`road_reports_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod host;
mod interactive;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use dialoguer::Confirm;
use road_reports_cli_utils::{IndicatifProgress, MultiProgress};
use road_reports_report_models::ReportCategory;
use road_reports_session::Session;
use road_reports_session::registry::VisibilitySummary;
use road_reports_settings::store::{FileStore, KeyValueStore, MemoryStore};
use road_reports_source::config::FeedConfig;
use road_reports_source::coordinator::FetchCoordinator;
use road_reports_source::http::HttpFeed;

use crate::host::ConsoleHost;

/// Version stamped into saved settings.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Release notes shown once after an upgrade.
const WHATS_NEW: &[&str] = &[
    "All reports are displayed.",
    "Failed feeds no longer block the report list.",
];

#[derive(Parser)]
#[command(name = "road_reports", about = "Road condition reports with a persistent archive")]
struct Cli {
    /// Feed configuration TOML (defaults to the built-in Virginia feed)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Keep settings in memory only; nothing is written to disk
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and list the current reports
    List {
        /// Include reports hidden by the archive filter
        #[arg(long)]
        all: bool,
        /// Comma-separated sort keys, `-` prefix for descending
        /// (e.g. "`archived,-properties.location_description`")
        #[arg(long, value_delimiter = ',')]
        sort: Vec<String>,
    },
    /// Show the details of one report
    Show {
        /// Report id
        id: String,
    },
    /// Archive one report
    Archive {
        /// Report id
        id: String,
    },
    /// Un-archive one report
    Unarchive {
        /// Report id
        id: String,
    },
    /// Archive every current report
    ArchiveAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Un-archive every current report
    UnarchiveAll {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Hide (true) or show (false) archived reports
    HideArchived {
        #[arg(action = ArgAction::Set)]
        hide: bool,
    },
    /// Show (true) or hide (false) the report layer
    Layer {
        #[arg(action = ArgAction::Set)]
        visible: bool,
    },
    /// List the report categories of the feed
    Categories,
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = road_reports_cli_utils::init_logger();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => FeedConfig::from_path(path)?,
        None => FeedConfig::embedded(),
    };
    let store: Arc<dyn KeyValueStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        let store = FileStore::in_data_dir();
        log::debug!("Settings directory: {}", store.dir().display());
        Arc::new(store)
    };

    let mut session = Session::open(
        ConsoleHost::new(config.clone()),
        store,
        config.settings_key.clone(),
        VERSION,
    );
    if session.is_new_version() {
        print_whats_new(&config);
    }
    if session.settings().state.is_none() {
        session.set_region(config.region.clone());
    }

    let feed = Arc::new(HttpFeed::new(config.clone())?);
    let coordinator = FetchCoordinator::from_config(feed, &config);

    let Some(command) = cli.command else {
        interactive::run(&mut session, &coordinator, &config, &multi).await?;
        session.shutdown();
        return Ok(());
    };

    match command {
        Commands::List { all, sort } => {
            if !sort.is_empty() {
                session.set_sort_keys(&sort)?;
            }
            load(&mut session, &coordinator, &multi).await;
            print_table(&session, all);
        }
        Commands::Show { id } => {
            load(&mut session, &coordinator, &multi).await;
            session.toggle_selection(&id)?;
        }
        Commands::Archive { id } => {
            load(&mut session, &coordinator, &multi).await;
            session.set_archived(&id, true)?;
            println!("Archived {id} ({})", session.summary());
        }
        Commands::Unarchive { id } => {
            load(&mut session, &coordinator, &multi).await;
            session.set_archived(&id, false)?;
            println!("Un-archived {id} ({})", session.summary());
        }
        Commands::ArchiveAll { yes } => {
            load(&mut session, &coordinator, &multi).await;
            if yes || confirm_bulk(&session, &config, "archive")? {
                let changed = session.archive_all();
                println!("Archived {changed} reports ({})", session.summary());
            }
        }
        Commands::UnarchiveAll { yes } => {
            load(&mut session, &coordinator, &multi).await;
            if yes || confirm_bulk(&session, &config, "un-archive")? {
                let changed = session.unarchive_all();
                println!("Un-archived {changed} reports ({})", session.summary());
            }
        }
        Commands::HideArchived { hide } => {
            session.set_hide_archived(hide);
            println!(
                "Archived reports will be {}",
                if hide { "hidden" } else { "shown" }
            );
        }
        Commands::Layer { visible } => {
            session.set_layer_visible(visible);
            println!(
                "Report layer {}",
                if visible { "shown" } else { "hidden" }
            );
        }
        Commands::Categories => {
            println!("{:<22} {:<24} ICON", "ID", "TITLE");
            println!("{}", "-".repeat(60));
            for &category in &config.categories {
                println!(
                    "{:<22} {:<24} {}",
                    category.to_string(),
                    category.title(),
                    config
                        .icon_url(category)
                        .unwrap_or_else(|| category.icon_name().to_string())
                );
            }
            let unused: Vec<String> = ReportCategory::ALL
                .iter()
                .filter(|c| !config.categories.contains(c))
                .map(ToString::to_string)
                .collect();
            if !unused.is_empty() {
                println!();
                println!("Not requested by this feed: {}", unused.join(", "));
            }
        }
    }

    session.shutdown();
    Ok(())
}

/// Runs one fetch cycle behind a progress bar.
#[allow(clippy::future_not_send)]
async fn load(
    session: &mut Session<ConsoleHost>,
    coordinator: &FetchCoordinator,
    multi: &MultiProgress,
) -> VisibilitySummary {
    let progress = IndicatifProgress::fetch_bar(multi, "Fetching reports");
    session.load(coordinator, progress).await
}

/// Prints the report table and the visible-of-total count.
fn print_table(session: &Session<ConsoleHost>, include_hidden: bool) {
    for line in session.host().table(include_hidden) {
        println!("{line}");
    }
    println!("{}", session.summary());
}

/// Asks before a bulk archive action, naming the region it covers.
///
/// # Errors
///
/// Returns an error if the prompt cannot be shown.
fn confirm_bulk(
    session: &Session<ConsoleHost>,
    config: &FeedConfig,
    verb: &str,
) -> Result<bool, dialoguer::Error> {
    let region = session
        .settings()
        .state
        .as_deref()
        .unwrap_or(&config.region);
    Confirm::new()
        .with_prompt(format!(
            "Are you sure you want to {verb} all {} reports for {region}?",
            session.registry().len()
        ))
        .default(false)
        .interact()
}

fn print_whats_new(config: &FeedConfig) {
    println!("{}", config.name);
    println!("v{VERSION}");
    println!();
    println!("What's New");
    println!("{}", "-".repeat(30));
    for note in WHATS_NEW {
        println!("- {note}");
    }
    println!();
}
