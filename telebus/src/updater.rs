//! Periodic publication of sensor readings into the input registers

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::context::SlaveContext;
use crate::error::ContextError;
use crate::sensor::SensorSource;

/// Error that terminates an [`Updater`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UpdateError {
    /// The readings could not be written to the input registers
    #[error("unable to publish readings: {0}")]
    Write(#[from] ContextError),
}

/// Settings of the [`Updater`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Time between the end of one update and the start of the next
    pub interval: Duration,
    /// Publish the nearby device count between the temperature and the heartbeat
    pub scan_devices: bool,
    /// Largest heartbeat value before it wraps back to 1
    pub heartbeat_max: u16,
    /// Temperature published when no reading has ever succeeded
    pub fallback_temperature: u16,
    /// Input register address of the first published value
    pub address: u16,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            scan_devices: true,
            heartbeat_max: 10,
            fallback_temperature: 1,
            address: 0,
        }
    }
}

/// Liveness counter cycling through `1..=max`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeartbeatCounter {
    value: u16,
    max: u16,
}

impl HeartbeatCounter {
    /// Start at 1; a `max` of 0 is treated as 1
    pub fn new(max: u16) -> Self {
        Self {
            value: 1,
            max: max.max(1),
        }
    }

    /// Current value
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Move to the next value, wrapping to 1 after `max`
    pub fn advance(&mut self) {
        self.value = if self.value >= self.max {
            1
        } else {
            self.value + 1
        };
    }
}

/// Samples a [`SensorSource`] and writes `[temperature, device count, heartbeat]`
/// into the input registers of a [`SlaveContext`]
///
/// The device count is only part of the tuple when scanning is enabled.
pub struct Updater<S> {
    context: Arc<SlaveContext>,
    sensor: S,
    config: UpdaterConfig,
    heartbeat: HeartbeatCounter,
    last_temperature: Option<u16>,
}

impl<S: SensorSource> Updater<S> {
    /// Create an updater that has not published anything yet
    pub fn new(context: Arc<SlaveContext>, sensor: S, config: UpdaterConfig) -> Self {
        Self {
            context,
            sensor,
            config,
            heartbeat: HeartbeatCounter::new(config.heartbeat_max),
            last_temperature: None,
        }
    }

    /// Heartbeat value that the next update will publish
    pub fn heartbeat(&self) -> u16 {
        self.heartbeat.value()
    }

    /// Run until `shutdown` is cancelled
    ///
    /// Returns an error only if the readings cannot be written, which indicates the
    /// configured address does not fit in the input register bank.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), UpdateError> {
        tracing::info!("updater started");
        loop {
            let values = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                values = self.sample() => values,
            };

            self.publish(&values)?;

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.interval) => {}
            }
        }
        tracing::info!("updater stopped");
        Ok(())
    }

    /// Sample the sensor and publish a single tuple, returning the values written
    pub async fn update_once(&mut self) -> Result<Vec<u16>, UpdateError> {
        let values = self.sample().await;
        self.publish(&values)?;
        Ok(values)
    }

    async fn sample(&mut self) -> Vec<u16> {
        let temperature = match self.sensor.read_temperature().await {
            Ok(value) => {
                self.last_temperature = Some(value);
                value
            }
            Err(err) => {
                let value = self
                    .last_temperature
                    .unwrap_or(self.config.fallback_temperature);
                tracing::warn!("unable to read temperature, publishing {}: {}", value, err);
                value
            }
        };

        let mut values = vec![temperature];

        if self.config.scan_devices {
            let count = match self.sensor.read_nearby_device_count().await {
                Ok(count) => count,
                Err(err) => {
                    tracing::warn!("unable to count nearby devices, publishing 0: {}", err);
                    0
                }
            };
            values.push(count);
        }

        values.push(self.heartbeat.value());
        values
    }

    fn publish(&mut self, values: &[u16]) -> Result<(), UpdateError> {
        if let Err(err) = self
            .context
            .write_input_registers(self.config.address, values)
        {
            tracing::error!("unable to write input registers: {}", err);
            return Err(err.into());
        }
        tracing::debug!("published {:?} at {:#06X}", values, self.config.address);
        self.heartbeat.advance();
        Ok(())
    }
}
