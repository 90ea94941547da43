//! cipherkv-cli: command-line client for cipherkv-server
//!
//! Holds the secret key; encrypts arguments before sending and decrypts
//! replies before printing them.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cipherkv::client::{Client, Reply};
use cipherkv::config::{ClientConfig, DEFAULT_PORT};
use cipherkv::keys::{self, DEFAULT_PUBLIC_KEY_PATH, DEFAULT_SECRET_KEY_PATH};
use cipherkv::params::{SchemeParameters, DEFAULT_PLAINTEXT_MODULUS};

#[derive(Parser)]
#[command(name = "cipherkv-cli")]
#[command(about = "Client for the cipherkv encrypted key-value server")]
#[command(version, disable_version_flag = true)]
#[command(disable_help_flag = true, disable_help_subcommand = true)]
#[command(after_help = "Examples:\n  cipherkv-cli keygen\n  cipherkv-cli set hello world\n  cipherkv-cli get hello")]
struct Args {
    /// Server hostname
    #[arg(short = 'h', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Path to secret key
    #[arg(short = 'S', long, default_value = DEFAULT_SECRET_KEY_PATH)]
    secret_key: PathBuf,

    /// Show timing logs
    #[arg(long)]
    verbose: bool,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,

    /// Print version
    #[arg(short = 'v', visible_short_alias = 'V', long, action = clap::ArgAction::Version)]
    version: Option<bool>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a secret/public key pair
    Keygen {
        /// Where to write the secret key
        #[arg(long, default_value = DEFAULT_SECRET_KEY_PATH)]
        secret_key: PathBuf,

        /// Where to write the public key
        #[arg(long, default_value = DEFAULT_PUBLIC_KEY_PATH)]
        public_key: PathBuf,

        /// Ring dimension; also the longest key in bytes
        #[arg(long, default_value = "64")]
        ring_dim: usize,
    },

    /// Any server command, e.g. `set k v`, `get k`, `keys *`, `dbsize`
    #[command(external_subcommand)]
    Server(Vec<String>),
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Keygen {
            secret_key,
            public_key,
            ring_dim,
        } => {
            let params = SchemeParameters::new(ring_dim, DEFAULT_PLAINTEXT_MODULUS)
                .with_context(|| format!("Unsupported ring dimension {}", ring_dim))?;
            keys::generate(params, &secret_key, &public_key).with_context(|| "Key generation failed")?;
            eprintln!(
                "Generated {} (secret key) and {} (public key)",
                secret_key.display(),
                public_key.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Server(argv) => {
            let config = ClientConfig {
                host: args.host,
                port: args.port,
                secret_key_path: args.secret_key,
                ..ClientConfig::default()
            };
            let mut client = Client::connect(&config).with_context(|| {
                format!("Failed to load secret key: {}", config.secret_key_path.display())
            })?;

            let argv: Vec<Vec<u8>> = argv.into_iter().map(String::into_bytes).collect();
            let reply = client
                .execute(&argv)
                .await
                .with_context(|| format!("Request to {} failed", config.addr()))?;

            match &reply {
                Reply::Text(text) => print!("{}", String::from_utf8_lossy(text)),
                other => println!("{}", other),
            }
            Ok(if reply.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_flags() {
        for flag in ["-v", "-V", "--version"] {
            let err = Args::try_parse_from(["cipherkv-cli", flag]).err().unwrap();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        }
    }
}
