//! WebPush Relay CLI - generate VAPID keys and send encrypted push messages.
//!
//! This is the main binary entry point. See the `webpush_relay` library
//! for the core functionality.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mimalloc::MiMalloc;
use std::io::Read;
use webpush_relay::crypto::SystemRandom;
use webpush_relay::{Config, PushSender, SendRequest, VapidKeys};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Private key encoding for `keygen`.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum KeyFormat {
    /// Raw 32-byte scalar.
    #[default]
    Raw,
    /// PKCS#8 DER document.
    Pkcs8,
}

#[derive(Parser)]
#[command(name = "webpush-relay")]
#[command(version)]
#[command(about = "Encrypted Web Push delivery with VAPID authentication")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a VAPID application server key pair
    Keygen {
        /// Contact URI embedded in tokens (mailto: or https://)
        #[arg(long, default_value = "mailto:admin@example.com")]
        subject: String,
        /// Private key encoding
        #[arg(long, value_enum, default_value_t = KeyFormat::Raw)]
        format: KeyFormat,
    },
    /// Send one push message described by a JSON request envelope
    Send {
        /// Path to the request JSON, or `-` for stdin
        #[arg(long, default_value = "-")]
        request: String,
    },
    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries JSON output only
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { subject, format } => keygen(subject, format)?,
        Commands::Send { request } => {
            let delivered = tokio::runtime::Runtime::new()
                .context("Failed to start async runtime")?
                .block_on(send(&request))?;
            if !delivered {
                std::process::exit(1);
            }
        }
        Commands::Config { save } => {
            let config = Config::load()?;
            if save {
                let path = config.save()?;
                log::info!("[Config] Saved to {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn keygen(subject: String, format: KeyFormat) -> Result<()> {
    let keys = VapidKeys::generate(subject, &SystemRandom);
    let private_key = match format {
        KeyFormat::Raw => keys.private_key_base64url(),
        KeyFormat::Pkcs8 => keys.private_key_pkcs8_base64url()?,
    };

    let output = serde_json::json!({
        "subject": keys.subject(),
        "public_key": keys.public_key_base64url(),
        "private_key": private_key,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    log::info!("[WebPush] Generated VAPID key pair ({format:?} private key)");
    Ok(())
}

/// Returns whether the push service accepted the message.
async fn send(source: &str) -> Result<bool> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Failed to read {source}"))?
    };
    let request: SendRequest =
        serde_json::from_str(&raw).context("Request is not a valid JSON envelope")?;

    let sender = PushSender::new(Config::load()?)?;
    let response = sender.send(&request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(response.success)
}
