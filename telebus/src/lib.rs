//! A [Modbus](http://modbus.org/) TCP slave that publishes board telemetry,
//! built on [Tokio](https://docs.rs/tokio) and Rust's `async/await` syntax.
//!
//! # Features
//!
//! * Thread-safe register table shared by every session and the updater
//! * Periodic publication of `[temperature, device count, heartbeat]` into the input registers
//! * Panic-free parsing of MBAP frames and requests
//! * Graceful shutdown of the server and the updater through a cancellation token
//!
//! # Supported Functions
//!
//! * Read Coils
//! * Read Discrete Inputs
//! * Read Holding Registers
//! * Read Input Registers
//! * Write Single Coil
//! * Write Single Register
//! * Write Multiple Coils
//! * Write Multiple Registers
//! * Read Device Identification
//!
//! # Example
//!
//! ```no_run
//!use std::sync::Arc;
//!
//!use telebus::*;
//!use tokio_util::sync::CancellationToken;
//!
//!#[tokio::main]
//!async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!    let context = Arc::new(SlaveContext::new(ContextConfig::default()));
//!    let shutdown = CancellationToken::new();
//!
//!    let server = spawn_tcp_server_task(
//!        10,
//!        "127.0.0.1:502".parse()?,
//!        context.clone(),
//!        DecodeLevel::default(),
//!        shutdown.clone(),
//!    )
//!    .await?;
//!
//!    let config = UpdaterConfig {
//!        address: context.input_registers_start(),
//!        ..Default::default()
//!    };
//!    let updater = tokio::spawn(
//!        Updater::new(context, SimulatedSensor::default(), config).run(shutdown.clone()),
//!    );
//!
//!    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!    shutdown.cancel();
//!    server.join().await?;
//!    updater.await??;
//!    Ok(())
//!}
//! ```

/// Public constant values related to the Modbus specification
pub mod constants;
/// Register table served to every session
pub mod context;
/// Protocol decode logging levels
pub mod decode;
/// Error types
pub mod error;
/// Modbus exception codes
pub mod exception;
/// Telemetry sources
pub mod sensor;
/// Server API
pub mod server;
/// Types shared by the register table and the protocol
pub mod types;
/// Periodic register updates
pub mod updater;

// internal modules
pub(crate) mod common;
pub(crate) mod tcp;

pub use crate::context::{ContextConfig, RegisterBank, SlaveContext};
pub use crate::decode::{AppDecodeLevel, DecodeLevel, FrameDecodeLevel, PhysDecodeLevel};
pub use crate::error::{BankError, ContextError, RequestError};
pub use crate::exception::ExceptionCode;
pub use crate::sensor::{
    ConfiguredSensor, SensorError, SensorSource, SimulatedSensor, SystemSensor, TemperatureProbe,
};
pub use crate::server::{spawn_tcp_server_task, ServerHandle, ServerIdentity};
pub use crate::types::{AddressRange, Indexed, UnitId};
pub use crate::updater::{HeartbeatCounter, UpdateError, Updater, UpdaterConfig};
