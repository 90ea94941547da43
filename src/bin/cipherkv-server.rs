//! cipherkv-server: encrypted key-value server
//!
//! Holds only the public key bundle and answers lookups homomorphically.

use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cipherkv::config::ServerConfig;
use cipherkv::keys::KeyPair;
use cipherkv::server::{Dispatcher, Server};

#[derive(Parser)]
#[command(name = "cipherkv-server")]
#[command(about = "Encrypted key-value server")]
#[command(version, disable_version_flag = true)]
struct Args {
    /// Bind address (default: 127.0.0.1)
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Port (default: 6774)
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Path to public key (default: cipherkv.pk)
    #[arg(short = 'P', long)]
    public_key: Option<PathBuf>,

    /// JSON file with server settings; flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log every request
    #[arg(long)]
    verbose: bool,

    /// Print version
    #[arg(short = 'v', visible_short_alias = 'V', long, action = clap::ArgAction::Version)]
    version: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => ServerConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(path) = args.public_key {
        config.public_key_path = path;
    }

    info!("cipherkv-server {}", cipherkv::server::VERSION);
    info!("Loading public key from {}", config.public_key_path.display());
    let keys = KeyPair::load_public(&config.public_key_path)
        .with_context(|| format!("Failed to load public key: {}", config.public_key_path.display()))?;
    info!(
        "Scheme: ring dimension {}, plaintext modulus {}, {} levels",
        keys.params().ring_dim,
        keys.params().plaintext_modulus,
        keys.params().level_count()
    );

    let dispatcher = Dispatcher::from_keys(&keys).with_context(|| "Failed to initialise store")?;
    let addr = config.addr();
    let server = Server::bind(config, dispatcher)
        .await
        .with_context(|| format!("Could not listen on {}", addr))?;

    server.run().await?;
    Ok(())
}
