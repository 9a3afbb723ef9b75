//! Mini-P2P node
//!
//! Runs the transport layer with in-memory collaborators.

use clap::{Parser, Subcommand};
use mini_p2p::config::TransportConfig;
use mini_p2p::network::{JsonCodec, Transport};
use mini_p2p::node::{EventHandler, GenesisHeaders, LogProcessor, PeerBook};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "p2p-node")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Peer-to-peer transport for a blockchain node", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept peers and connect to the given ones
    Start {
        /// Address to listen on (host:port)
        #[arg(short, long)]
        address: Option<String>,

        /// Network magic bytes in hex
        #[arg(short, long)]
        network: Option<String>,

        /// Comma-separated peers to dial
        #[arg(short, long)]
        peers: Option<String>,
    },

    /// Show the network identity this node would use
    Identity,

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TransportConfig::load(path)?,
        None => TransportConfig::default(),
    };

    match cli.command {
        Commands::Start {
            address,
            network,
            peers,
        } => {
            if let Some(address) = address {
                config.listen_address = address;
            }
            if let Some(network) = network {
                config.network = network;
            }
            config.validate()?;

            let peers: Vec<String> = peers
                .map(|p| p.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();

            run_node(config, peers)?;
        }

        Commands::Identity => {
            let identity = config.identity()?;
            println!("Network: {}", hex::encode(identity.magic()));
            println!("Nonce:   {}", hex::encode(identity.nonce()));
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn run_node(
    config: TransportConfig,
    peers: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let identity = config.identity()?;
        let codec = Arc::new(JsonCodec::new(config.max_frame_size));
        let (transport, events) = Transport::start(&config, identity, codec).await?;
        let transport = Arc::new(transport);

        println!("Listening on {}", transport.local_addr());

        for peer in &peers {
            if let Err(e) = transport.connect(peer).await {
                log::warn!("Could not connect to {}: {}", peer, e);
            }
        }

        let handler = EventHandler::new(
            transport.clone(),
            Arc::new(GenesisHeaders::default()),
            Arc::new(PeerBook::new()),
            Arc::new(LogProcessor),
        );
        let handling = tokio::spawn(handler.run(events));

        tokio::signal::ctrl_c().await?;
        println!("\nShutting down node...");

        transport.stop();
        handling.await?;
        match Arc::try_unwrap(transport) {
            Ok(transport) => transport.shutdown().await,
            Err(_) => log::warn!("Transport still in use, not waiting for peer tasks"),
        }

        Ok::<(), Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}
