//! Parking Desk CLI
//!
//! `watch` runs the realtime desk with its dashboard; every other subcommand
//! performs a single operator action against the backend and prints the result.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parking_desk::actions::{parse_id, FixedAnswer, StdinConfirm};
use parking_desk::messages;
use parking_desk::state::Notice;
use parking_desk::table::Table;
use parking_desk::view::{RECORD_COLUMNS, SPACE_COLUMNS};
use parking_desk::{load_config, Config, DeskBuilder};
use tracing::Level;

#[derive(Parser)]
#[command(name = "parking-desk")]
#[command(about = "Operator desk for a parking-lot backend")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides config file)
    #[arg(long)]
    backend_url: Option<String>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep tables in sync, poll recognition and serve the dashboard
    Watch,

    /// Print the parking records
    Records,

    /// Print the parking spaces
    Spaces,

    /// Register a vehicle entry
    Entry {
        plate: String,

        /// Park in a specific space
        #[arg(long)]
        space: Option<u64>,
    },

    /// Register a vehicle exit
    Exit { id: String },

    /// Delete a parking record
    Delete {
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Estimate the current fee for a parked vehicle
    Fee { plate: String },

    /// Look up the active record id for a plate
    Find { plate: String },

    /// Toggle charging on a space
    ToggleCharging { space: String },

    /// Mark a space occupied (with a plate) or free
    ToggleOccupied {
        space: String,

        /// Plate parked in the space
        #[arg(long)]
        plate: Option<String>,

        /// Mark the space free instead of occupied
        #[arg(long)]
        free: bool,
    },
}

fn print_table(table: &Table, columns: &[&str], empty: &str) {
    if table.is_empty() {
        println!("{}", empty);
        return;
    }
    println!("ID\t{}", columns.join("\t"));
    for row in table.rows() {
        let cells: Vec<String> = row.cells.iter().map(|c| c.plain()).collect();
        println!("{}\t{}", row.key, cells.join("\t"));
    }
}

fn report(notice: &Notice) {
    if notice.is_info() {
        println!("{}", notice);
    } else {
        eprintln!("{}", notice);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, backend_url={:?}, dashboard_port={:?}, log_level={:?}",
        args.config,
        args.backend_url,
        args.dashboard_port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(backend_url) = args.backend_url {
        config.backend.base_url = backend_url;
    }
    if let Some(dashboard_port) = args.dashboard_port {
        config.dashboard.port = dashboard_port;
    }
    config.validate()?;

    if matches!(args.command, Commands::Watch) {
        tracing::info!("Starting parking desk against {}", config.backend.base());
        let desk = DeskBuilder::new(config).build()?;

        let cancel = desk.cancel_token();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                return;
            }
            tracing::info!("Shutdown signal received");
            cancel.cancel();
        });

        desk.start().await?;
        return Ok(());
    }

    // one-shot actions need neither the push channel nor the poller
    config.sync.enabled = false;
    config.recognition.enabled = false;
    config.dashboard.enabled = false;
    let desk = DeskBuilder::new(config).build()?;
    let dispatcher = desk.dispatcher();

    match args.command {
        Commands::Watch => {}
        Commands::Records => {
            report(&dispatcher.reload_records().await);
            let state = desk.state().read().await;
            print_table(&state.records, &RECORD_COLUMNS, messages::NO_RECORDS);
        }
        Commands::Spaces => {
            report(&dispatcher.reload_spaces().await);
            let state = desk.state().read().await;
            print_table(&state.spaces, &SPACE_COLUMNS, messages::NO_SPACES);
        }
        Commands::Entry { plate, space } => {
            let notice = match space {
                Some(space) => dispatcher.entry_at_space(space, &plate).await,
                None => dispatcher.entry(&plate).await,
            };
            report(&notice);
        }
        Commands::Exit { id } => {
            let id = parse_id(&id).unwrap_or(0);
            report(&dispatcher.exit(id).await);
        }
        Commands::Delete { id, yes } => {
            let id = parse_id(&id).unwrap_or(0);
            let notice = if yes {
                dispatcher.delete(id, &FixedAnswer(true)).await
            } else {
                dispatcher.delete(id, &StdinConfirm).await
            };
            report(&notice);
        }
        Commands::Fee { plate } => report(&dispatcher.calculate_fee(&plate).await),
        Commands::Find { plate } => report(&dispatcher.find_record(&plate).await),
        Commands::ToggleCharging { space } => {
            let space = parse_id(&space).unwrap_or(0);
            report(&dispatcher.toggle_charging(space).await);
        }
        Commands::ToggleOccupied { space, plate, free } => {
            let space = parse_id(&space).unwrap_or(0);
            report(
                &dispatcher
                    .toggle_occupied(space, plate.as_deref(), !free)
                    .await,
            );
        }
    }

    Ok(())
}
