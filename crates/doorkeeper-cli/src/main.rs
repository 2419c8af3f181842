//! `doorkeeper` binary.
//!
//! `run` drives the controller from the terminal: each stdin line is a key
//! sequence (`1234#`) or a tag (`scan AABBCCDD`), and the LCD is mirrored to
//! stdout. `cards` edits the same SQLite store offline.

mod console;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::EnvFilter;

use doorkeeper_controller::{AccessController, ControllerDevices};
use doorkeeper_core::{ControllerConfig, Credential};
use doorkeeper_hardware::devices::{AnyKeypadDevice, AnyRfidDevice};
use doorkeeper_hardware::mock::{MockBuzzer, MockDoor, MockKeypad, MockRfid, VirtualDisplay};
use doorkeeper_hardware::{PeripheralConfig, PeripheralManager};
use doorkeeper_network::{
    ConnectivityMonitor, DispatchTiming, HttpTransport, LinkStatus, NotificationDispatcher,
    TcpProbe,
};
use doorkeeper_storage::{AnyKvStore, CredentialStore, Database, DatabaseConfig, SqliteKvStore};

/// Keypad and RFID door controller.
#[derive(Parser, Debug)]
#[command(name = "doorkeeper", version, about, long_about = None)]
struct Cli {
    /// Path to a JSON config file. Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller, reading keys and scans from stdin
    Run,

    /// Administer authorised cards without running the controller
    Cards {
        #[command(subcommand)]
        action: CardAction,
    },
}

#[derive(Subcommand, Debug)]
enum CardAction {
    /// List authorised cards
    List,

    /// Authorise a card
    Add {
        /// Card UID as hex, e.g. AABBCCDD
        uid: String,
    },

    /// Revoke a card
    Remove {
        /// Card UID as hex
        uid: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new(
            "doorkeeper_cli=debug,doorkeeper_controller=debug,doorkeeper_network=debug,doorkeeper_hardware=debug",
        )
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ControllerConfig> {
    let config = match path {
        Some(p) => ControllerConfig::from_file(p)
            .with_context(|| format!("loading config from {}", p.display()))?,
        None => ControllerConfig::default(),
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn open_store(config: &ControllerConfig) -> Result<(Database, AnyKvStore)> {
    let db = Database::new(DatabaseConfig::from(&config.storage))
        .await
        .with_context(|| format!("opening database {}", config.storage.database_path))?;
    let kv = SqliteKvStore::new(db.pool().clone(), config.storage.namespace.clone());
    Ok((db, AnyKvStore::Sqlite(kv)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::Run => cmd_run(config).await,
        Commands::Cards { action } => cmd_cards(config, action).await,
    }
}

async fn cmd_run(config: ControllerConfig) -> Result<()> {
    info!(version = doorkeeper_core::VERSION, peer = %config.network.peer_url, "Starting doorkeeper");
    let (db, kv) = open_store(&config).await?;

    let link = LinkStatus::new();
    let monitor = ConnectivityMonitor::new(
        TcpProbe::from_config(&config.network),
        link.clone(),
        config.network.reconnect_interval(),
    )
    .spawn();
    let notifier = NotificationDispatcher::new(
        HttpTransport::from_config(&config.network).context("building HTTP client")?,
        link.clone(),
        DispatchTiming::from(&config.network),
    );

    let (keypad, keys) = MockKeypad::new();
    let (reader, tags) = MockRfid::new();
    let mut manager = PeripheralManager::new(PeripheralConfig::default());
    manager.register_keypad(AnyKeypadDevice::Mock(keypad));
    manager.register_rfid(AnyRfidDevice::Mock(reader));
    manager.check_reader().await;

    let (display, screen) = VirtualDisplay::lcd2004();
    let (door, _door) = MockDoor::new();
    let (buzzer, _buzzer) = MockBuzzer::new();

    let controller = AccessController::new(
        config,
        kv,
        ControllerDevices {
            display,
            door,
            buzzer,
        },
        notifier.clone(),
        link,
        manager.start(),
    )?;

    let mirror = tokio::spawn(console::mirror_screen(screen));
    let feeder = tokio::spawn(console::feed(
        BufReader::new(tokio::io::stdin()),
        keys,
        tags,
    ));

    tokio::select! {
        _ = controller.run() => info!("Input closed"),
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for Ctrl-C")?;
            info!("Interrupted");
        }
    }

    feeder.abort();
    mirror.abort();
    monitor.abort();

    let stats = notifier.stats();
    info!(
        in_flight = stats.in_flight,
        delivered = stats.delivered,
        failed = stats.failed,
        "Notifications"
    );
    db.close().await;
    Ok(())
}

async fn cmd_cards(config: ControllerConfig, action: CardAction) -> Result<()> {
    let (db, kv) = open_store(&config).await?;
    let store = CredentialStore::from_config(kv, &config)?;

    match action {
        CardAction::List => {
            let cards = store.cards().await?;
            for card in &cards {
                println!("{card}");
            }
            println!("{} of {} slots used", cards.len(), store.max_cards());
        }
        CardAction::Add { uid } => {
            let card = Credential::new(&uid)?;
            if store.add_card(&card).await? {
                println!("Added {card}");
            } else {
                println!("{card} not added: already present or store full");
            }
        }
        CardAction::Remove { uid } => {
            let card = Credential::new(&uid)?;
            if store.remove_card(&card).await? {
                println!("Removed {card}");
            } else {
                println!("{card} not found");
            }
        }
    }

    db.close().await;
    Ok(())
}
