mod cli;

use wifidrop::{config, net, server::TransferServer, state, storage};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use std::time::Duration;

async fn start_server(host: String, port: u16, config_path: Option<&std::path::Path>) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting wifidrop");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    let hub = state::TransferHub::new();
    let store = Arc::new(storage::FileStore::new(&config.storage.documents_dir));
    tracing::info!("Imports will be saved to {:?}", store.root());

    // Mirror upload lifecycle into the log, standing in for a progress UI
    let log_handle = tokio::spawn(log_events(hub.subscribe()));

    let mut server = TransferServer::new(&config.server, Arc::clone(&hub), store);
    server.start(config.server.port).await;

    if server.wait_until_running(Duration::from_secs(5)).await {
        println!("Open {} in a browser on this network", server.local_url());
    } else {
        tracing::error!("Server failed to start; check that the port is free");
    }

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    server.stop();
    log_handle.abort();
    tracing::info!(
        "Imported {} file(s) this session",
        hub.imported_count()
    );

    Ok(())
}

async fn log_events(mut rx: tokio::sync::broadcast::Receiver<state::TransferEvent>) {
    use wifidrop::state::TransferEvent;

    while let Ok(event) = rx.recv().await {
        match event {
            TransferEvent::TransferStarted { transfer } => {
                tracing::info!(
                    name = %transfer.display_name,
                    total_bytes = transfer.total_bytes,
                    "Upload started"
                );
            }
            TransferEvent::TransferFinished { transfer } => {
                tracing::info!(
                    name = %transfer.display_name,
                    path = ?transfer.saved_path,
                    "Upload saved"
                );
            }
            TransferEvent::ImportedCountChanged { imported_count } => {
                tracing::debug!(imported_count, "Import tally updated");
            }
            TransferEvent::TransferProgress { .. } | TransferEvent::TransferRemoved { .. } => {}
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "wifidrop=trace".to_string()
        } else {
            "wifidrop=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Url => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            match net::primary_ipv4() {
                Some(ip) => println!("http://{}:{}", ip, config.server.port),
                None => println!(
                    "No LAN address found; the server would listen on port {}",
                    config.server.port
                ),
            }
            Ok(())
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("wifidrop {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Idle timeout: {}s", config.server.idle_timeout_secs);
            println!("  Documents dir: {:?}", config.storage.documents_dir);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
