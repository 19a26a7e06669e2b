use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use teleport_cli::cli::{connect_bunker, init_logging, run_chat, CliConfig};
use teleport_core::nostr::{NostrTransport, SigningMode};
use teleport_core::{CoreConfig, CoreRuntime};

const BUNKER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "teleport")]
#[command(about = "Relay-synchronized group chat over Nostr")]
struct Cli {
    /// Path to JSON config file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Relay URL (repeatable, replaces the configured relays)
    #[arg(long = "relay", short = 'r')]
    relays: Vec<String>,

    /// Signing mode: auto, local or extension
    #[arg(long)]
    mode: Option<SigningMode>,

    /// nsec or hex secret for local mode
    #[arg(long)]
    secret: Option<String>,

    /// bunker:// URI of a remote signer for extension mode
    #[arg(long)]
    bunker: Option<String>,

    /// Display name attached to sent messages
    #[arg(long, short = 'n')]
    nick: Option<String>,

    /// Data directory for cache and keys
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Give up on a publish after this many seconds
    #[arg(long)]
    publish_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a channel and chat interactively
    Join {
        /// Channel name, with or without a leading '#'
        channel: Option<String>,
    },

    /// Send one message and exit
    Send {
        channel: String,
        message: String,
    },

    /// Print cached messages for a channel without connecting
    History {
        channel: String,

        /// Delete the cached messages instead of printing them
        #[arg(long)]
        clear: bool,
    },

    /// Print the public key of the active signing identity
    Whoami,

    /// Delete the persisted ephemeral key
    ForgetKey,
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    let config = build_config(&cli, &file_config);

    let bunker_uri = cli.bunker.as_ref().or(file_config.bunker_uri.as_ref());
    let external_signer = match bunker_uri {
        Some(uri) => Some(connect_bunker(uri, BUNKER_TIMEOUT)?),
        None => None,
    };

    let transport = Arc::new(NostrTransport::new());
    let runtime = CoreRuntime::new(config, transport.clone(), external_signer)
        .context("Failed to start teleport core")?;

    let result = match cli.command {
        Commands::Join { channel } => {
            let channel = channel
                .or(file_config.channel.clone())
                .context("No channel given and none configured")?;
            run_chat(&runtime, &channel).await
        }
        Commands::Send { channel, message } => send_once(&runtime, &channel, &message).await,
        Commands::History { channel, clear: true } => {
            let channel = runtime.clear_history(&channel)?;
            println!("Cleared cached messages of {}", channel.location_cue());
            Ok(())
        }
        Commands::History { channel, clear: false } => print_history(&runtime, &channel),
        Commands::Whoami => whoami(&runtime).await,
        Commands::ForgetKey => {
            runtime.key_manager().lock().clear_ephemeral();
            println!("Ephemeral key removed");
            Ok(())
        }
    };

    transport.shutdown().await;
    result
}

/// Defaults, then the config file, then command-line flags.
fn build_config(cli: &Cli, file_config: &CliConfig) -> CoreConfig {
    let mut config = CoreConfig::default();
    file_config.apply(&mut config);

    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if !cli.relays.is_empty() {
        config.relay_urls = cli.relays.clone();
    }
    if let Some(nick) = &cli.nick {
        config.nickname = nick.clone();
    }
    if let Some(secret) = &cli.secret {
        config.local_secret = Some(secret.clone());
        // A secret on the command line implies local signing unless a mode is given
        if cli.mode.is_none() && file_config.signing_mode.is_none() {
            config.signing_mode = SigningMode::Local;
        }
    }
    if cli.bunker.is_some() && cli.mode.is_none() && file_config.signing_mode.is_none() {
        config.signing_mode = SigningMode::Extension;
    }
    if let Some(mode) = cli.mode {
        config.signing_mode = mode;
    }
    if cli.publish_timeout.is_some() {
        config.publish_timeout_secs = cli.publish_timeout;
    }
    config
}

async fn send_once(runtime: &CoreRuntime, channel: &str, message: &str) -> Result<()> {
    if let Err(e) = runtime.select_channel(channel).await {
        // Publishing only needs the relay set, not a live subscription
        if matches!(e, teleport_core::CoreError::InvalidChannel(_)) {
            return Err(e.into());
        }
        tracing::warn!("subscribe failed, sending anyway: {}", e);
    }
    let outcome = runtime.send(message).await?;
    println!("{} accepted by {}", outcome.event_id, outcome.accepted_by);
    runtime.shutdown().await;
    Ok(())
}

fn print_history(runtime: &CoreRuntime, channel: &str) -> Result<()> {
    let channel = teleport_core::Channel::from_location_cue(channel)
        .with_context(|| format!("Not a channel name: {:?}", channel))?;
    let cache = teleport_core::store::ChannelCache::new(runtime.storage());
    for event in cache.load(&channel) {
        println!("{}", teleport_cli::cli::format_event(&event));
    }
    Ok(())
}

async fn whoami(runtime: &CoreRuntime) -> Result<()> {
    let keys = runtime.key_manager();
    let mode = keys.lock().mode();
    let identity = keys.lock().active_identity();
    match identity {
        Some(identity) => {
            let public_key = identity.public_key().await?;
            println!("{} ({})", public_key.to_hex(), mode);
        }
        None => println!("No identity available in {} mode", mode),
    }
    Ok(())
}
