//! Walkie-talkie node
//!
//! Captures from the microphone and plays the peer's audio at the same time.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walkie_link::{
    audio::device::list_devices,
    config::{AppConfig, Role},
    node,
};

#[derive(Parser, Debug)]
#[command(name = "walkie", version, about = "Encrypted full-duplex UDP walkie-talkie")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Which side of the link this node is
    #[arg(short, long)]
    role: Option<Role>,

    /// Peer address, overrides the role default
    #[arg(long)]
    peer: Option<SocketAddr>,

    /// UDP port for both directions
    #[arg(short, long)]
    port: Option<u16>,

    /// Input device id, e.g. "input:USB Microphone"
    #[arg(long)]
    input_device: Option<String>,

    /// Output device id, e.g. "output:Speakers"
    #[arg(long)]
    output_device: Option<String>,

    /// Print audio devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Start with push-to-talk held
    #[arg(long)]
    transmit: bool,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(role) = self.role {
            config.role = role;
        }
        if let Some(peer) = self.peer {
            config.network.peer = Some(peer);
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(id) = &self.input_device {
            config.audio.input_device = Some(id.clone());
        }
        if let Some(id) = &self.output_device {
            config.audio.output_device = Some(id.clone());
        }
        if self.transmit {
            config.control.transmit_on_start = true;
        }
    }
}

fn print_devices() {
    println!("\n=== Audio Devices ===");
    for device in list_devices() {
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  [{}] {}{}:", device.direction, device.name, default_marker);
        println!("    ID: {}", device.id);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        print_devices();
        return Ok(());
    }

    let mut config = AppConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    cli.apply(&mut config);

    node::run(config).await.context("Node failed")?;

    Ok(())
}
