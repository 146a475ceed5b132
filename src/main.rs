use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use boomx::config::AppConfig;
use boomx::protocol::{BeepVolume, EqBands, EqMode, PairingMode, ShutdownTimeout};
use boomx::{DeviceAddress, SpeakerClient};

#[derive(Parser)]
#[command(name = "boomx", about = "Control an EarFun UBOOM X speaker over Bluetooth")]
struct Cli {
    /// Speaker address (XX:XX:XX:XX:XX:XX); overrides the config file
    #[arg(long, global = true)]
    address: Option<DeviceAddress>,

    /// RFCOMM channel; overrides the config file
    #[arg(long, global = true)]
    channel: Option<u8>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Set a custom EQ: 10 comma-separated values in 0..=120
    Eq { bands: EqBands },
    /// Select an EQ preset (studio, indoor, indoor+, outdoor, outdoor+, boom, ground)
    Mode { mode: EqMode },
    /// Set the lights: "default", "off" or an RRGGBB color
    Light {
        action: String,
        /// Keep the color steady instead of dancing to the music
        #[arg(long)]
        solid: bool,
    },
    /// Set the auto shutdown timeout (5m, 10m, 30m, 60m, 90m, 120m, no)
    Shutdown { timeout: ShutdownTimeout },
    /// Turn the speaker off
    PowerOff,
    /// Turn pairing mode on or off
    Pairing { mode: PairingMode },
    /// Set the prompt tone volume (0, 25, 50, 75, 100)
    Beep { volume: BeepVolume },
    /// Send a hex-encoded message as-is
    Raw { hex: String },
    /// Print the battery level
    Battery,
    /// Print the firmware package name
    Firmware,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("boomx=info".parse()?);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::load();
    let address = resolve_address(&cli, &config)?;
    let channel = cli.channel.unwrap_or(config.channel);

    let mut client = SpeakerClient::connect(address, channel)
        .await
        .with_context(|| format!("Failed to connect to {address}"))?
        .with_reply_timeout(config.reply_timeout());

    let result = run(&mut client, cli.command).await;
    if let Err(e) = client.close().await {
        info!("Close after command failed: {}", e);
    }
    result
}

fn resolve_address(cli: &Cli, config: &AppConfig) -> Result<DeviceAddress> {
    let address = match (cli.address, config.address()) {
        (Some(address), _) => address,
        (None, Some(parsed)) => parsed.with_context(|| {
            format!("Invalid device_address in {}", AppConfig::path().display())
        })?,
        (None, None) => bail!(
            "No speaker address: pass --address or set device_address in {}",
            AppConfig::path().display()
        ),
    };

    // Windows scans report the speaker under a different OUI than the one
    // its RFCOMM service answers on
    #[cfg(windows)]
    let address = address.with_service_oui();

    Ok(address)
}

async fn run(client: &mut SpeakerClient, action: Action) -> Result<()> {
    match action {
        Action::Eq { bands } => {
            client.set_custom_eq(&bands).await?;
            println!("EQ set to {bands}");
        }
        Action::Mode { mode } => {
            client.set_mode(mode).await?;
            println!("EQ mode set to {mode}");
        }
        Action::Light { action, solid } => {
            client
                .handle_light_action(&action, solid)
                .await
                .with_context(|| format!("Light action {action:?} failed"))?;
            println!("Lights set to {action}");
        }
        Action::Shutdown { timeout } => {
            client.set_shutdown_timeout(timeout).await?;
            println!("Shutdown timeout set to {timeout}");
        }
        Action::PowerOff => {
            client.power_off().await?;
            println!("Power off sent");
        }
        Action::Pairing { mode } => {
            client.set_pairing(mode).await?;
            println!("Pairing mode {mode}");
        }
        Action::Beep { volume } => {
            client.set_beep_volume(volume).await?;
            println!("Beep volume set to {volume}");
        }
        Action::Raw { hex } => {
            client
                .send_raw(&hex)
                .await
                .with_context(|| format!("Raw message {hex:?} failed"))?;
            println!("Sent {hex}");
        }
        Action::Battery => {
            let level = client.read_battery_level().await.context("Battery query failed")?;
            println!("Battery: {level}%");
        }
        Action::Firmware => {
            let name = client.read_firmware_name().await.context("Firmware query failed")?;
            println!("Firmware: {name}");
        }
    }
    Ok(())
}
