//! Sources of the telemetry published in the input registers

use std::future::Future;

mod simulated;
mod system;

pub use simulated::SimulatedSensor;
pub use system::{SystemSensor, TemperatureProbe};

/// Errors reported by a [`SensorSource`]
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// The probe command could not be started
    #[error("unable to run `{command}`: {source}")]
    Spawn {
        /// command line that was run
        command: String,
        /// underlying error
        #[source]
        source: std::io::Error,
    },
    /// The probe command ran but reported failure
    #[error("`{command}` exited with {status}")]
    CommandFailed {
        /// command line that was run
        command: String,
        /// exit status of the command
        status: std::process::ExitStatus,
    },
    /// A sysfs file could not be read
    #[error("unable to read {}: {source}", path.display())]
    Read {
        /// file that was read
        path: std::path::PathBuf,
        /// underlying error
        #[source]
        source: std::io::Error,
    },
    /// The probe output was not in the expected format
    #[error("unable to parse temperature from {0:?}")]
    Parse(String),
    /// The reading does not fit in a register
    #[error("temperature of {0} hundredths of a degree F does not fit in a register")]
    OutOfRange(f64),
}

/// Capability that samples the board temperature and counts nearby wireless devices
///
/// Implementations may fail; the updater decides what to publish instead.
pub trait SensorSource: Send {
    /// Board temperature in hundredths of a degree Fahrenheit
    fn read_temperature(&mut self) -> impl Future<Output = Result<u16, SensorError>> + Send;

    /// Number of nearby devices found by a scan; a scan that finds nothing is `Ok(0)`
    fn read_nearby_device_count(&mut self)
        -> impl Future<Output = Result<u16, SensorError>> + Send;
}

/// Convert degrees Celsius to the register representation, hundredths of a degree Fahrenheit
///
/// The value is rounded to the nearest hundredth.
pub fn celsius_to_register(celsius: f64) -> Result<u16, SensorError> {
    let value = ((celsius * 9.0 / 5.0) + 32.0) * 100.0;
    let value = value.round();
    if !value.is_finite() || value < 0.0 || value > f64::from(u16::MAX) {
        return Err(SensorError::OutOfRange(value));
    }
    Ok(value as u16)
}

/// Sensor selected at startup
#[derive(Debug)]
pub enum ConfiguredSensor {
    /// Reads the host hardware
    System(SystemSensor),
    /// Produces deterministic synthetic readings
    Simulated(SimulatedSensor),
}

impl SensorSource for ConfiguredSensor {
    async fn read_temperature(&mut self) -> Result<u16, SensorError> {
        match self {
            Self::System(x) => x.read_temperature().await,
            Self::Simulated(x) => x.read_temperature().await,
        }
    }

    async fn read_nearby_device_count(&mut self) -> Result<u16, SensorError> {
        match self {
            Self::System(x) => x.read_nearby_device_count().await,
            Self::Simulated(x) => x.read_nearby_device_count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_body_temperature() {
        assert_eq!(celsius_to_register(37.0).unwrap(), 9860);
    }

    #[test]
    fn rounds_to_nearest_hundredth() {
        // 48.3 C == 118.94 F
        assert_eq!(celsius_to_register(48.3).unwrap(), 11894);
        // 20.0001 C == 68.00018 F
        assert_eq!(celsius_to_register(20.0001).unwrap(), 6800);
    }

    #[test]
    fn rejects_values_outside_register_range() {
        assert!(celsius_to_register(-40.0).is_err());
        assert!(celsius_to_register(400.0).is_err());
        assert!(celsius_to_register(f64::NAN).is_err());
    }
}
