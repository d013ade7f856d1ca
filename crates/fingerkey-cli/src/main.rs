use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use fingerkey_cli::commands::{self, Host};
use fingerkey_cli::{AppConfig, SensorBackend, logger};
use fingerkey_core::SlotId;
use fingerkey_storage::DEFAULT_LOG_LIMIT;

#[derive(Debug, Parser)]
#[command(name = "fingerkey", version, about = "Fingerprint sensor controller and host registry")]
struct Cli {
    /// Path to the TOML configuration file (default: ./fingerkey.toml if present)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Registry database path
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Drive the sensor and accept commands from a host
    Serve(ServeArgs),
    /// Enroll a finger into a slot and register its owner
    Enroll {
        #[command(flatten)]
        connect: ConnectArgs,
        /// Slot to store the template in (1-127)
        slot: SlotId,
        /// Owner's name
        name: String,
    },
    /// Identify the finger on the sensor
    Verify {
        #[command(flatten)]
        connect: ConnectArgs,
    },
    /// Delete the template in a slot
    Delete {
        #[command(flatten)]
        connect: ConnectArgs,
        /// Slot to clear (1-127)
        slot: SlotId,
    },
    /// Number of templates stored on the sensor
    Count {
        #[command(flatten)]
        connect: ConnectArgs,
    },
    /// Registered identities
    List,
    /// Recent access log entries, newest first
    Logs {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_LIMIT)]
        limit: i64,
    },
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Use the mock sensor instead of the serial module
    #[arg(long)]
    mock: bool,

    /// Serial device of the sensor module
    #[arg(long, value_name = "DEVICE")]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Address to accept hosts on
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Stop after this many host sessions
    #[arg(long)]
    sessions: Option<usize>,

    /// Speak the protocol on stdin/stdout instead of TCP
    #[arg(long, conflicts_with_all = ["bind", "sessions"])]
    stdio: bool,

    /// Give up waiting for a finger after this many polls
    #[arg(long)]
    poll_limit: Option<u32>,

    /// Suppress progress lines between responses
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Args)]
struct ConnectArgs {
    /// Controller address
    #[arg(long, value_name = "ADDR")]
    server: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database.database_path = database;
    }
    debug!("Configuration: {:?}", config);

    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::Enroll {
            connect,
            slot,
            name,
        } => {
            let mut host = connect_host(&mut config, connect).await?;
            println!("Place finger on sensor, then remove and place it again when asked...");
            let (response, stored) = host.enroll(slot, &name).await?;
            match stored {
                Some(fingerprint) => {
                    println!("Enrolled '{}' in slot {}", fingerprint.name, fingerprint.id)
                }
                None => println!("Enrollment failed: {}", response.message()),
            }
            host.close().await
        }
        Command::Verify { connect } => {
            let mut host = connect_host(&mut config, connect).await?;
            println!("Place finger on sensor...");
            let (response, identity) = host.verify().await?;
            match identity {
                Some(identity) => println!(
                    "Access granted: {} (slot {}, confidence {})",
                    identity.name, identity.id, identity.confidence
                ),
                None => println!("Access denied: {}", response.message()),
            }
            host.close().await
        }
        Command::Delete { connect, slot } => {
            let mut host = connect_host(&mut config, connect).await?;
            let response = host.delete(slot).await?;
            println!("{}", response.message());
            host.close().await
        }
        Command::Count { connect } => {
            let mut host = connect_host(&mut config, connect).await?;
            println!("Templates stored: {}", host.count().await?);
            host.close().await
        }
        Command::List => {
            let registry = commands::open_registry(config.database).await?;
            let fingerprints = registry.list_fingerprints().await?;
            if fingerprints.is_empty() {
                println!("No fingerprints registered");
            }
            for fingerprint in fingerprints {
                let last_access = fingerprint
                    .last_access
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>3}  {:<24}  registered {}  last access {}",
                    fingerprint.id,
                    fingerprint.name,
                    fingerprint.registration_date.format("%Y-%m-%d %H:%M:%S"),
                    last_access
                );
            }
            registry.database().close().await;
            Ok(())
        }
        Command::Logs { limit } => {
            let registry = commands::open_registry(config.database).await?;
            for entry in registry.recent_logs(limit).await? {
                let slot = entry
                    .fingerprint_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  {:<14}  slot {:>3}  {:<24}  confidence {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.status,
                    slot,
                    entry.display_name(),
                    entry.confidence
                );
            }
            registry.database().close().await;
            Ok(())
        }
    }
}

async fn serve(mut config: AppConfig, args: ServeArgs) -> Result<()> {
    if args.mock {
        config.sensor.backend = SensorBackend::Mock;
    }
    if let Some(port) = args.port {
        config.sensor.serial.path = port;
    }
    if let Some(baud) = args.baud {
        config.sensor.serial.baud_rate = baud;
    }
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if args.sessions.is_some() {
        config.server.max_sessions = args.sessions;
    }
    if args.poll_limit.is_some() {
        config.controller.capture_poll_limit = args.poll_limit;
    }
    if args.quiet {
        config.controller.progress_messages = false;
    }

    let sensor = commands::open_sensor(config.sensor.backend, &config.sensor.serial).await?;
    if args.stdio {
        commands::serve_stdio(sensor, config.controller).await
    } else {
        commands::serve_tcp(sensor, config.server_config(), config.controller).await
    }
}

async fn connect_host(config: &mut AppConfig, connect: ConnectArgs) -> Result<Host> {
    if let Some(server) = connect.server {
        config.client.server_addr = server;
    }
    let registry = commands::open_registry(config.database.clone()).await?;
    Host::connect(config.client_config(), registry).await
}
