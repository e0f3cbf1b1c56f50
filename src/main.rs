// src/main.rs
//! Wanggan GPS - download and convert track data from Wanggan handheld receivers

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use env_logger::{Builder, Env};
use log::warn;
use std::path::PathBuf;
use std::process::ExitCode;
use wanggan_gps::{
    aggregate_bytes,
    display::TerminalDisplay,
    session::{list_serial_ports, DEFAULT_BAUDRATE},
    DeviceConfig, ExportSession, GpsError, OutputFormat, ParseOutcome, SerialTransport, TrackExporter,
    TriggerMode,
};

#[derive(Parser)]
#[command(name = "wanggan-gps", version, about = "Download and convert Wanggan GPS track data")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available serial ports
    Ports,
    /// Trigger an export on the device and convert the result
    Download(DownloadArgs),
    /// Convert a previously saved raw download
    Convert(ConvertArgs),
    /// Show or change the stored configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Kml)]
    format: OutputFormat,

    /// Write one file per record instead of a single merged file
    #[arg(long)]
    split: bool,

    /// Output directory (defaults to the configured one)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// File name prefix for merged and raw output
    #[arg(long, default_value = "track")]
    prefix: String,
}

#[derive(Args)]
struct DownloadArgs {
    /// Serial port, e.g. COM5 or /dev/ttyUSB0 (defaults to the configured one)
    #[arg(short, long)]
    port: Option<String>,

    /// Export mode to trigger
    #[arg(short, long, value_enum, default_value_t = TriggerMode::Tilde)]
    mode: TriggerMode,

    /// Also save the bytes exactly as received
    #[arg(long)]
    save_raw: bool,

    /// Seconds of silence that end the download
    #[arg(long)]
    idle_timeout: Option<f64>,

    /// Maximum seconds to wait for the whole download
    #[arg(long)]
    timeout: Option<f64>,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct ConvertArgs {
    /// Raw download file
    input: PathBuf,

    /// Print the parsed records as JSON instead of writing files
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration
    Show,
    /// Store the default serial port
    SetPort {
        port: String,
        #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
        baudrate: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<GpsError>().and_then(GpsError::hint) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ports => list_ports(),
        Command::Download(args) => download(args).await,
        Command::Convert(args) => convert(args),
        Command::Config { action } => configure(action),
    }
}

fn list_ports() -> Result<()> {
    let ports = list_serial_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {}", port);
        }
    }
    Ok(())
}

async fn download(args: DownloadArgs) -> Result<()> {
    let mut device = DeviceConfig::load().context("loading configuration")?;
    if let Some(secs) = args.idle_timeout {
        device.idle_timeout_secs = secs;
    }
    if let Some(secs) = args.timeout {
        device.download_timeout_secs = secs;
    }
    device.validate()?;

    let port = args
        .port
        .clone()
        .or_else(|| device.serial_port.clone())
        .context("no serial port given; pass --port or run `wanggan-gps config set-port`")?;

    let mut session = ExportSession::<SerialTransport>::connect(&port, &device).await?;
    let capture = session.perform_export(args.mode).await?;

    let exporter = exporter_for(&args.output, &device);
    let mut files = Vec::new();

    if args.save_raw || !args.mode.is_text() {
        let name = format!(
            "gps_export_{}_{}.txt",
            args.mode.name(),
            Local::now().format("%Y%m%d_%H%M%S")
        );
        files.push(exporter.save_raw(&name, &capture.data)?);
    }

    // Caret exports are binary and only ever saved raw
    let outcome = if args.mode.is_text() {
        let outcome = aggregate_bytes(&capture.data);
        files.extend(export_or_warn(&exporter, &capture.data, &outcome, args.output.format)?);
        Some(outcome)
    } else {
        None
    };

    TerminalDisplay::new().render_summary(
        &mut std::io::stdout(),
        Some(&capture),
        outcome.as_ref(),
        &files,
    )?;
    Ok(())
}

fn convert(args: ConvertArgs) -> Result<()> {
    let raw = std::fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let outcome = aggregate_bytes(&raw);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let device = DeviceConfig::load().context("loading configuration")?;
    let exporter = exporter_for(&args.output, &device);
    let files = export_or_warn(&exporter, &raw, &outcome, args.output.format)?;

    TerminalDisplay::new().render_summary(&mut std::io::stdout(), None, Some(&outcome), &files)?;
    Ok(())
}

fn configure(action: ConfigAction) -> Result<()> {
    let mut config = DeviceConfig::load().context("loading configuration")?;
    match action {
        ConfigAction::Show => {
            println!("# {}", DeviceConfig::get_config_path()?.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::SetPort { port, baudrate } => {
            config.update_serial(port, baudrate);
            config.save().context("saving configuration")?;
            println!("Saved default port {} at {} baud", config.serial_port.as_deref().unwrap_or(""), baudrate);
        }
    }
    Ok(())
}

fn exporter_for(output: &OutputArgs, device: &DeviceConfig) -> TrackExporter {
    TrackExporter::new(output.output_dir.clone().unwrap_or_else(|| device.output_dir.clone()))
        .with_prefix(output.prefix.clone())
        .split_by_block(output.split)
        .auto_create_dir(device.auto_create_dir)
}

/// An export with no coordinates is reported, not treated as a failure.
fn export_or_warn(
    exporter: &TrackExporter,
    raw: &[u8],
    outcome: &ParseOutcome,
    format: OutputFormat,
) -> Result<Vec<PathBuf>> {
    match exporter.export(raw, outcome, format) {
        Ok(files) => Ok(files),
        Err(GpsError::Export(msg)) => {
            warn!("{}", msg);
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}
