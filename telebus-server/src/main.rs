//! Command-line Modbus TCP telemetry server

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use telebus::*;

#[derive(Parser)]
#[command(name = "telebus-server")]
#[command(about = "A Modbus TCP server that publishes board temperature, nearby device count and a heartbeat")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1", help = "Address to listen on")]
    address: IpAddr,

    #[arg(short = 'p', long, default_value_t = 502, help = "Port to listen on")]
    port: u16,

    #[arg(
        short = 'i',
        long,
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between updates of the input registers"
    )]
    interval: u64,

    #[arg(short = 'o', long, default_value_t = 0, help = "Address of the first value in every bank")]
    offset: u16,

    #[arg(
        short = 'c',
        long,
        default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(1..),
        help = "Number of values in every bank"
    )]
    count: u16,

    #[arg(short = 'f', long, default_value_t = 31416, help = "Initial value of every register")]
    fill: u16,

    #[arg(long, help = "Do not publish the nearby device count")]
    no_scan: bool,

    #[arg(long, default_value_t = 10, help = "Largest heartbeat value before it wraps to 1")]
    heartbeat_max: u16,

    #[arg(short = 'u', long, default_value_t = 1, help = "The unit id served")]
    unit_id: u8,

    #[arg(long, default_value_t = 10, help = "Maximum number of concurrent sessions")]
    max_sessions: usize,

    #[arg(short = 's', long, value_enum, default_value_t = SensorKind::System, help = "Source of the published readings")]
    sensor: SensorKind,

    #[arg(long, help = "Read the temperature from a sysfs thermal zone instead of vcgencmd")]
    thermal_zone: Option<PathBuf>,

    #[arg(long, default_value = "hcitool scan", help = "Command that lists nearby devices")]
    scan_command: String,

    #[arg(short = 'd', long, value_enum, default_value_t = Decode::Nothing, help = "Protocol decode logging")]
    decode: Decode,

    #[arg(short = 'v', long, action = ArgAction::Count, help = "Increase log verbosity")]
    verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SensorKind {
    /// read the host hardware
    System,
    /// generate synthetic readings
    Simulated,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Decode {
    /// decode nothing
    Nothing,
    /// function codes and data headers
    Headers,
    /// function codes, headers and values
    Values,
    /// values and MBAP frames
    Frames,
    /// everything including raw bytes
    All,
}

impl From<Decode> for DecodeLevel {
    fn from(value: Decode) -> Self {
        match value {
            Decode::Nothing => DecodeLevel::nothing(),
            Decode::Headers => DecodeLevel::new(
                AppDecodeLevel::DataHeaders,
                FrameDecodeLevel::Nothing,
                PhysDecodeLevel::Nothing,
            ),
            Decode::Values => DecodeLevel::new(
                AppDecodeLevel::DataValues,
                FrameDecodeLevel::Nothing,
                PhysDecodeLevel::Nothing,
            ),
            Decode::Frames => DecodeLevel::new(
                AppDecodeLevel::DataValues,
                FrameDecodeLevel::Header,
                PhysDecodeLevel::Nothing,
            ),
            Decode::All => DecodeLevel::new(
                AppDecodeLevel::DataValues,
                FrameDecodeLevel::Payload,
                PhysDecodeLevel::Data,
            ),
        }
    }
}

impl Cli {
    fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }

    fn sensor(&self) -> ConfiguredSensor {
        match self.sensor {
            SensorKind::Simulated => ConfiguredSensor::Simulated(SimulatedSensor::default()),
            SensorKind::System => {
                let probe = match &self.thermal_zone {
                    Some(path) => TemperatureProbe::ThermalZone(path.clone()),
                    None => TemperatureProbe::Vcgencmd,
                };
                let scan_command = self
                    .scan_command
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                ConfiguredSensor::System(SystemSensor::new(probe, scan_command))
            }
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // initialize logging
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();

    run(cli)
        .await
        .inspect_err(|err| tracing::error!("unable to run the server: {err}"))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let context = Arc::new(
        SlaveContext::new(ContextConfig {
            start: cli.offset,
            count: cli.count,
            fill: cli.fill,
            unit_id: UnitId::new(cli.unit_id),
        })
        .with_identity(ServerIdentity::default()),
    );

    let shutdown = CancellationToken::new();

    let server = spawn_tcp_server_task(
        cli.max_sessions,
        SocketAddr::new(cli.address, cli.port),
        context.clone(),
        cli.decode.into(),
        shutdown.clone(),
    )
    .await?;
    tracing::info!("listening on {}", server.local_addr());

    let config = UpdaterConfig {
        interval: Duration::from_secs(cli.interval),
        scan_devices: !cli.no_scan,
        heartbeat_max: cli.heartbeat_max,
        address: context.input_registers_start(),
        ..Default::default()
    };
    let updater = tokio::spawn(
        Updater::new(context, cli.sensor(), config)
            .run(shutdown.clone())
            .instrument(tracing::info_span!("Updater")),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    shutdown.cancel();

    server.join().await?;
    if let Err(err) = updater.await? {
        tracing::warn!("updater stopped early: {err}");
    }

    Ok(())
}
