use std::path::PathBuf;

use crate::sensor::{celsius_to_register, SensorError, SensorSource};

/// Where [`SystemSensor`] reads the board temperature from
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TemperatureProbe {
    /// Output of `vcgencmd measure_temp`, e.g. `temp=48.3'C`
    #[default]
    Vcgencmd,
    /// A sysfs thermal zone reporting millidegrees Celsius
    ThermalZone(PathBuf),
}

/// Sensor backed by the host: a temperature probe and a wireless scan command
#[derive(Clone, Debug)]
pub struct SystemSensor {
    probe: TemperatureProbe,
    scan_command: Vec<String>,
}

impl Default for SystemSensor {
    fn default() -> Self {
        Self::new(
            TemperatureProbe::default(),
            vec!["hcitool".to_string(), "scan".to_string()],
        )
    }
}

impl SystemSensor {
    /// Create a sensor from a probe and a scan command line (program followed by arguments)
    pub fn new(probe: TemperatureProbe, scan_command: Vec<String>) -> Self {
        Self {
            probe,
            scan_command,
        }
    }

    async fn read_celsius(&self) -> Result<f64, SensorError> {
        match &self.probe {
            TemperatureProbe::Vcgencmd => {
                let output = run_command(&["vcgencmd".to_string(), "measure_temp".to_string()])
                    .await?;
                parse_vcgencmd(&output)
            }
            TemperatureProbe::ThermalZone(path) => {
                let output = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| SensorError::Read {
                        path: path.clone(),
                        source,
                    })?;
                parse_millidegrees(&output)
            }
        }
    }
}

impl SensorSource for SystemSensor {
    async fn read_temperature(&mut self) -> Result<u16, SensorError> {
        celsius_to_register(self.read_celsius().await?)
    }

    async fn read_nearby_device_count(&mut self) -> Result<u16, SensorError> {
        let output = run_command(&self.scan_command).await?;
        Ok(count_scan_results(&output))
    }
}

async fn run_command(command: &[String]) -> Result<String, SensorError> {
    let (program, args) = match command.split_first() {
        Some(x) => x,
        None => {
            return Err(SensorError::Spawn {
                command: String::new(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
            })
        }
    };

    let output = tokio::process::Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| SensorError::Spawn {
            command: command.join(" "),
            source,
        })?;

    if !output.status.success() {
        return Err(SensorError::CommandFailed {
            command: command.join(" "),
            status: output.status,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// parse `temp=48.3'C` into degrees Celsius
pub(crate) fn parse_vcgencmd(output: &str) -> Result<f64, SensorError> {
    output
        .trim()
        .strip_prefix("temp=")
        .and_then(|x| x.strip_suffix("'C"))
        .and_then(|x| x.parse::<f64>().ok())
        .ok_or_else(|| SensorError::Parse(output.to_string()))
}

/// parse a sysfs thermal zone reading in millidegrees into degrees Celsius
pub(crate) fn parse_millidegrees(output: &str) -> Result<f64, SensorError> {
    output
        .trim()
        .parse::<i64>()
        .map(|x| x as f64 / 1000.0)
        .map_err(|_| SensorError::Parse(output.to_string()))
}

/// count the devices listed by a scan, skipping the `Scanning ...` header and blank lines
pub(crate) fn count_scan_results(output: &str) -> u16 {
    let count = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Scanning"))
        .count();
    u16::try_from(count).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vcgencmd_output() {
        assert_eq!(parse_vcgencmd("temp=48.3'C\n").unwrap(), 48.3);
        assert!(matches!(
            parse_vcgencmd("VCHI initialization failed"),
            Err(SensorError::Parse(_))
        ));
    }

    #[test]
    fn parses_thermal_zone_output() {
        assert_eq!(parse_millidegrees("37000\n").unwrap(), 37.0);
        assert!(parse_millidegrees("hot").is_err());
    }

    #[test]
    fn counts_scan_results() {
        let output = "Scanning ...\n\t00:11:22:33:44:55\tphone\n\tAA:BB:CC:DD:EE:FF\tn/a\n\n";
        assert_eq!(count_scan_results(output), 2);
    }

    #[test]
    fn scan_without_results_is_zero() {
        assert_eq!(count_scan_results("Scanning ...\n"), 0);
        assert_eq!(count_scan_results(""), 0);
    }

    #[tokio::test]
    async fn reads_temperature_from_thermal_zone() {
        let path = std::env::temp_dir().join(format!("telebus-zone-{}", std::process::id()));
        tokio::fs::write(&path, "37000\n").await.unwrap();
        let mut sensor = SystemSensor::new(TemperatureProbe::ThermalZone(path.clone()), vec![]);
        assert_eq!(sensor.read_temperature().await.unwrap(), 9860);
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn missing_thermal_zone_is_an_error() {
        let mut sensor = SystemSensor::new(
            TemperatureProbe::ThermalZone(PathBuf::from("/nonexistent/telebus/temp")),
            vec![],
        );
        assert!(matches!(
            sensor.read_temperature().await,
            Err(SensorError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn failed_scan_command_is_an_error() {
        let mut sensor = SystemSensor::new(
            TemperatureProbe::default(),
            vec!["telebus-scan-command-that-does-not-exist".to_string()],
        );
        assert!(matches!(
            sensor.read_nearby_device_count().await,
            Err(SensorError::Spawn { .. })
        ));
    }
}
