//! Activity Monitor CLI
//!
//! Sliding-window presence tracking for activity keys.

use activity_monitor::{
    config::Config,
    core::{ActiveUser, ActivityMonitor},
    store::{MemoryStore, TimeSeriesStore},
    VERSION,
};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "activity-monitor")]
#[command(version = VERSION)]
#[command(about = "Track which users were recently active on a key", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a short beacon scenario against an in-memory store
    Demo,

    /// Show configuration
    Config,

    /// Serve beacons and queries over HTTP (requires server feature)
    Serve {
        /// Port to bind to (defaults to the configured port)
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: Could not load configuration: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Demo => {
            cmd_demo(&config);
        }
        Commands::Config => {
            cmd_config(&config);
        }
        Commands::Serve { port } => {
            cmd_serve(config, port);
        }
    }
}

fn cmd_demo(config: &Config) {
    let monitor = match ActivityMonitor::from_config(MemoryStore::new(), config) {
        Ok(monitor) => monitor,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let time = Utc
        .with_ymd_and_hms(2013, 11, 11, 10, 30, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let beacons = [
        // Normal activity.
        ("documents:1", time - TimeDelta::seconds(15), 1, "John"),
        ("documents:1", time, 2, "Sue"),
        ("documents:1", time + TimeDelta::seconds(5), 3, "Mary"),
        // Duplicates.
        ("documents:2", time, 1, "John"),
        ("documents:2", time + TimeDelta::seconds(5), 1, "John"),
    ];

    for (key, at, id, name) in beacons {
        if let Err(e) = monitor.beacon(key, at, id, name) {
            eprintln!("Error: Beacon failed for {key}: {e}");
            std::process::exit(1);
        }
    }

    print_all(&monitor, "documents:1", time + TimeDelta::seconds(23));
    print_all(&monitor, "documents:2", time + TimeDelta::seconds(7));
}

fn print_all<S: TimeSeriesStore>(monitor: &ActivityMonitor<S>, key: &str, time: DateTime<Utc>) {
    println!("Users for {key} at {time}");

    match monitor.get_all(key, time) {
        Ok(users) => {
            let mut users: Vec<ActiveUser> = users.into_iter().collect();
            users.sort_by_key(|u| u.id());
            for user in users {
                println!("* {}-{}", user.id(), user.name());
            }
        }
        Err(e) => eprintln!("Error: Query failed for {key}: {e}"),
    }

    println!();
}

fn cmd_config(config: &Config) {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(feature = "server")]
fn cmd_serve(config: Config, port: Option<u16>) {
    use activity_monitor::server::{run, ServerConfig};
    use std::sync::Arc;

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: Could not start runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(async move {
        let store = Arc::new(MemoryStore::new());
        let port = port.unwrap_or(config.server_port);
        let server_config = ServerConfig::new(port, config, store.clone());

        let (addr, shutdown_tx) = match run(server_config).await {
            Ok(started) => started,
            Err(e) => {
                eprintln!("Error: Could not start server: {e}");
                std::process::exit(1);
            }
        };

        println!("Activity Monitor v{VERSION} listening on http://{addr}");
        println!("Press Ctrl+C to stop");

        // Drop expired buckets in the background; reads already ignore them.
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                store.purge_expired();
            }
        });

        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("Error: Could not listen for Ctrl+C: {e}");
        }

        sweeper.abort();
        let _ = shutdown_tx.send(());
        println!("Stopped.");
    });
}

#[cfg(not(feature = "server"))]
fn cmd_serve(_config: Config, _port: Option<u16>) {
    eprintln!("Error: serve requires the server feature (build with --features server)");
    std::process::exit(1);
}
