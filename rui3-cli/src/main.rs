// rui3 -- CLI tool for configuring and exercising RAKwireless RUI3 LoRaWAN
// modules over their AT-command serial interface.
//
// Usage:
//   rui3 --port /dev/ttyUSB0 info
//   rui3 --port /dev/ttyUSB0 band set EU868
//   rui3 --port /dev/ttyUSB0 mask set 2
//   rui3 --port /dev/ttyUSB0 class get
//   rui3 --port /dev/ttyUSB0 join --attempts 10 --interval 8
//   rui3 --port /dev/ttyUSB0 send "hello"
//   rui3 --port /dev/ttyUSB0 raw "AT+BAT=?"
//
// Logging is controlled with RUST_LOG (default: info), e.g.
//   RUST_LOG=rui3_at_io=trace rui3 --port /dev/ttyUSB0 info

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rui3_core::{ChannelMask, DeviceClass, RegionBand};
use rui3_device::{Rui3Builder, Rui3Device};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// rui3 -- talk to a RUI3 LoRaWAN module from the command line.
#[derive(Parser)]
#[command(name = "rui3", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, short)]
    port: String,

    /// Baud rate of the module's AT interface.
    #[arg(long, default_value_t = 115_200)]
    baud: u32,

    /// Timeout for ordinary commands, in seconds.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print module identity, keys, and LoRaWAN settings.
    Info,

    /// Join the network and wait until the module reports it has joined.
    Join {
        /// Number of status checks before giving up.
        #[arg(long, default_value_t = 10)]
        attempts: u32,

        /// Seconds between status checks.
        #[arg(long, default_value_t = 8)]
        interval: u64,
    },

    /// Region band operations.
    Band {
        #[command(subcommand)]
        action: BandAction,
    },

    /// Channel mask operations.
    Mask {
        #[command(subcommand)]
        action: MaskAction,
    },

    /// Device class operations.
    Class {
        #[command(subcommand)]
        action: ClassAction,
    },

    /// Send a text uplink on port 1.
    Send {
        /// Text to send; transmitted as its UTF-8 bytes.
        text: String,
    },

    /// Send an arbitrary AT command and print the raw response.
    Raw {
        /// Command without line terminator (e.g. "AT+BAT=?").
        command: String,

        /// Timeout in seconds (defaults to --timeout).
        #[arg(long)]
        wait: Option<u64>,
    },
}

#[derive(Subcommand)]
enum BandAction {
    /// Read the current region band.
    Get,
    /// Set the region band (e.g. EU868, US915, AS923-2).
    Set { band: RegionBand },
}

#[derive(Subcommand)]
enum MaskAction {
    /// Read the current channel mask.
    Get,
    /// Set the channel mask: "all" or a sub-band number 1-12.
    Set { mask: ChannelMask },
}

#[derive(Subcommand)]
enum ClassAction {
    /// Read the current device class.
    Get,
    /// Set the device class (A, B or C).
    Set { class: DeviceClass },
}

// ---------------------------------------------------------------------------
// Device construction
// ---------------------------------------------------------------------------

async fn open_device(cli: &Cli) -> Result<Rui3Device> {
    if cli.timeout == 0 {
        bail!("--timeout must be at least 1 second");
    }

    Rui3Builder::new()
        .serial_port(&cli.port)
        .baud_rate(cli.baud)
        .command_timeout(Duration::from_secs(cli.timeout))
        .build()
        .await
        .with_context(|| format!("failed to open {} at {} baud", cli.port, cli.baud))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_info(dev: &Rui3Device) -> Result<()> {
    dev.attention()
        .await
        .context("module did not answer AT")?;

    println!("Module");
    println!("  Model:          {}", dev.hardware_model().await?);
    println!("  Hardware ID:    {}", dev.hardware_id().await?);
    println!("  Serial:         {}", dev.serial_number().await?);
    println!("  Firmware:       {}", dev.firmware_version().await?);
    println!("  API version:    {}", dev.api_version().await?);
    println!();
    println!("Identity");
    println!("  DevEUI:         {}", dev.dev_eui().await?);
    println!("  AppEUI:         {}", dev.app_eui().await?);
    println!("  DevAddr:        {}", dev.dev_addr().await?);
    println!();
    println!("LoRaWAN");
    println!("  Work mode:      {}", dev.work_mode().await?);
    println!("  Join mode:      {}", dev.join_mode().await?);
    println!("  Joined:         {}", dev.join_status().await?);
    println!("  Band:           {}", dev.region_band().await?);
    println!("  Channel mask:   {}", dev.channel_mask().await?);
    println!("  Class:          {}", dev.class().await?);
    println!("  ADR:            {}", dev.adaptive_data_rate().await?);
    println!("  Confirmed:      {}", dev.confirm_mode().await?);
    println!("  Data rate:      DR{}", dev.data_rate().await?);
    println!("  TX power index: {}", dev.tx_power().await?);
    Ok(())
}

async fn cmd_join(dev: &Rui3Device, attempts: u32, interval_secs: u64) -> Result<()> {
    if dev.join_status().await? {
        println!("Already joined");
        return Ok(());
    }

    dev.join_network().await.context("join request rejected")?;
    info!(attempts, interval_secs, "join requested, waiting for network");

    for attempt in 1..=attempts {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        match dev.join_status().await {
            Ok(true) => {
                println!("Joined after {attempt} check(s)");
                return Ok(());
            }
            Ok(false) => info!(attempt, "not joined yet"),
            Err(e) => warn!(attempt, error = %e, "join status check failed"),
        }
    }

    bail!("not joined after {attempts} checks ({}s apart)", interval_secs)
}

async fn cmd_send(dev: &Rui3Device, text: &str) -> Result<()> {
    dev.send_text(text).await.context("uplink failed")?;
    println!("Sent {} byte(s)", text.len());
    Ok(())
}

async fn cmd_raw(dev: &Rui3Device, command: &str, timeout: Duration) -> Result<()> {
    match dev.raw_command(command, timeout).await {
        Ok(text) => {
            print!("{text}");
            Ok(())
        }
        Err(e) => {
            let last = dev.last_response().await;
            if !last.is_empty() {
                print!("{last}");
            }
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dev = open_device(&cli).await?;

    let result = match &cli.command {
        Command::Info => cmd_info(&dev).await,
        Command::Join { attempts, interval } => cmd_join(&dev, *attempts, *interval).await,
        Command::Band { action } => match action {
            BandAction::Get => dev
                .region_band()
                .await
                .map(|band| println!("{band}"))
                .map_err(Into::into),
            BandAction::Set { band } => dev.set_region_band(*band).await.map_err(Into::into),
        },
        Command::Mask { action } => match action {
            MaskAction::Get => dev
                .channel_mask()
                .await
                .map(|mask| println!("{mask}"))
                .map_err(Into::into),
            MaskAction::Set { mask } => dev.set_channel_mask(*mask).await.map_err(Into::into),
        },
        Command::Class { action } => match action {
            ClassAction::Get => dev
                .class()
                .await
                .map(|class| println!("{class}"))
                .map_err(Into::into),
            ClassAction::Set { class } => dev.set_class(*class).await.map_err(Into::into),
        },
        Command::Send { text } => cmd_send(&dev, text).await,
        Command::Raw { command, wait } => {
            let timeout = Duration::from_secs(wait.unwrap_or(cli.timeout).max(1));
            cmd_raw(&dev, command, timeout).await
        }
    };

    dev.close().await.ok();
    result
}
