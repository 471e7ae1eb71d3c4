//! sysmon - watch and query live systemd unit state
//!
//! `watch` runs the sync engine against the system bus and the live
//! journal and prints every applied update. The other subcommands are
//! one-shot queries and pass-through control calls.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use sysmon::engine::{SyncEngine, UnitUpdate};
use sysmon::journal::JournalctlTailer;
use sysmon::snapshot::{PropertyValue, UnitSnapshot};
use sysmon::{ManagerClient, StartMode, SystemdClient};

#[derive(Parser)]
#[command(name = "sysmon")]
#[command(about = "Live mirror of systemd unit state")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the journal and print unit state changes as they happen
    Watch,

    /// List all units known to the manager
    List,

    /// Show the current properties of one unit
    Status {
        /// Unit name (e.g. "nginx.service")
        name: String,
    },

    /// Start a unit
    Start {
        /// Unit name
        name: String,
        /// Job mode: replace, fail or isolate
        #[arg(long, default_value = "replace")]
        mode: String,
    },

    /// Stop a unit
    Stop {
        /// Unit name
        name: String,
        /// Job mode: replace, fail or isolate
        #[arg(long, default_value = "replace")]
        mode: String,
    },

    /// Restart a unit
    Restart {
        /// Unit name
        name: String,
        /// Job mode: replace, fail or isolate
        #[arg(long, default_value = "replace")]
        mode: String,
    },

    /// Reload a unit's configuration
    Reload {
        /// Unit name
        name: String,
        /// Job mode: replace, fail or isolate
        #[arg(long, default_value = "replace")]
        mode: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match args.command {
        Command::Watch => watch().await?,
        Command::List => list().await?,
        Command::Status { name } => status(&name).await?,
        Command::Start { name, mode } => {
            let job = client().await?.start_unit(&name, parse_mode(&mode)?).await?;
            println!("start queued for {}: {}", name, job);
        }
        Command::Stop { name, mode } => {
            let job = client().await?.stop_unit(&name, parse_mode(&mode)?).await?;
            println!("stop queued for {}: {}", name, job);
        }
        Command::Restart { name, mode } => {
            let job = client()
                .await?
                .restart_unit(&name, parse_mode(&mode)?)
                .await?;
            println!("restart queued for {}: {}", name, job);
        }
        Command::Reload { name, mode } => {
            let job = client().await?.reload_unit(&name, parse_mode(&mode)?).await?;
            println!("reload queued for {}: {}", name, job);
        }
    }

    Ok(())
}

async fn client() -> Result<SystemdClient, Box<dyn std::error::Error>> {
    Ok(SystemdClient::system().await?)
}

fn parse_mode(mode: &str) -> Result<StartMode, String> {
    StartMode::parse(mode)
        .ok_or_else(|| format!("invalid mode '{}' (expected replace, fail or isolate)", mode))
}

async fn watch() -> Result<(), Box<dyn std::error::Error>> {
    let manager = Arc::new(client().await?);
    let tailer = Arc::new(JournalctlTailer::new());
    let engine = Arc::new(SyncEngine::new(manager, tailer));

    let mut updates = engine.subscribe();
    let mut worker = engine.start();

    println!("watching unit state changes (Ctrl-C to stop)");
    loop {
        tokio::select! {
            result = &mut worker => {
                match result {
                    Ok(Ok(())) => break,
                    Ok(Err(e)) => return Err(e.into()),
                    Err(e) => return Err(e.into()),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                engine.stop();
                // The worker may be parked in a journal read; dropping it
                // also tears down the journalctl child.
                worker.abort();
                break;
            }
            update = updates.recv() => {
                match update {
                    Ok(update) => print_update(&update),
                    Err(RecvError::Lagged(n)) => log::warn!("display fell behind, {} updates dropped", n),
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    let view = engine.view();
    println!();
    println!(
        "{} units tracked, last sync {}",
        view.units.len(),
        view.last_sync.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if !engine.is_healthy() {
        println!("journal stream was unhealthy at shutdown");
    }

    Ok(())
}

fn print_update(update: &UnitUpdate) {
    let snapshot = &update.snapshot;
    println!(
        "{:<40} {:<10} {:<12} {}",
        update.unit,
        snapshot.get_str("ActiveState"),
        snapshot.get_str("SubState"),
        snapshot.get_str("Description"),
    );
}

async fn list() -> Result<(), Box<dyn std::error::Error>> {
    let manager = client().await?;
    let mut units = manager.list_units().await?;
    units.sort_by(|a, b| a.name.cmp(&b.name));

    println!(
        "{:<44} {:<10} {:<10} {:<10} DESCRIPTION",
        "UNIT", "LOAD", "ACTIVE", "SUB"
    );
    let count = units.len();
    for unit in units {
        let description: String = unit.description.chars().take(48).collect();
        println!(
            "{:<44} {:<10} {:<10} {:<10} {}",
            unit.name, unit.load_state, unit.active_state, unit.sub_state, description
        );
    }
    println!();
    println!("{} units listed", count);

    Ok(())
}

async fn status(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let manager = client().await?;
    let snapshot = manager.fetch_unit(name).await?;

    let status_symbol = match snapshot.get_str("ActiveState") {
        "active" => "●",
        "inactive" => "○",
        "failed" => "×",
        _ => "◐",
    };

    println!(
        "{} {} - {}",
        status_symbol,
        name,
        describe(&snapshot)
    );
    println!("     Loaded: {}", snapshot.get_str("LoadState"));
    println!(
        "     Active: {} ({})",
        snapshot.get_str("ActiveState"),
        snapshot.get_str("SubState")
    );
    println!("       Path: {}", snapshot.object_path());

    if let PropertyValue::U64(pid) = snapshot.get("MainPID") {
        if pid != 0 {
            println!("   Main PID: {}", pid);
        }
    }

    Ok(())
}

fn describe(snapshot: &UnitSnapshot) -> String {
    let description = snapshot.get_str("Description");
    if description.is_empty() {
        "(no description)".to_string()
    } else {
        description.to_string()
    }
}
