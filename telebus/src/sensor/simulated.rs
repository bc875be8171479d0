use crate::sensor::{celsius_to_register, SensorError, SensorSource};

/// Deterministic sensor for hosts without the hardware
///
/// Temperature follows a triangle wave between two bounds, moving one step per
/// reading. The device count cycles from 0 up to a maximum and back to 0.
#[derive(Clone, Debug)]
pub struct SimulatedSensor {
    min_celsius: f64,
    max_celsius: f64,
    step: f64,
    current: f64,
    rising: bool,
    devices: u16,
    max_devices: u16,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(40.0, 60.0, 0.5, 5)
    }
}

impl SimulatedSensor {
    /// Create a sensor that starts at `min_celsius`
    pub fn new(min_celsius: f64, max_celsius: f64, step: f64, max_devices: u16) -> Self {
        let (min_celsius, max_celsius) = if min_celsius <= max_celsius {
            (min_celsius, max_celsius)
        } else {
            (max_celsius, min_celsius)
        };
        Self {
            min_celsius,
            max_celsius,
            step: step.abs(),
            current: min_celsius,
            rising: true,
            devices: 0,
            max_devices,
        }
    }

    fn advance(&mut self) {
        if self.rising {
            self.current += self.step;
            if self.current >= self.max_celsius {
                self.current = self.max_celsius;
                self.rising = false;
            }
        } else {
            self.current -= self.step;
            if self.current <= self.min_celsius {
                self.current = self.min_celsius;
                self.rising = true;
            }
        }
    }
}

impl SensorSource for SimulatedSensor {
    async fn read_temperature(&mut self) -> Result<u16, SensorError> {
        let value = celsius_to_register(self.current);
        self.advance();
        value
    }

    async fn read_nearby_device_count(&mut self) -> Result<u16, SensorError> {
        let value = self.devices;
        self.devices = if self.devices >= self.max_devices {
            0
        } else {
            self.devices + 1
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::block_on;

    #[test]
    fn temperature_follows_triangle_wave() {
        let mut sensor = SimulatedSensor::new(0.0, 1.0, 0.5, 0);
        let values: Vec<u16> = (0..6)
            .map(|_| block_on(sensor.read_temperature()).unwrap())
            .collect();
        // 0.0, 0.5, 1.0, 0.5, 0.0, 0.5 C
        assert_eq!(values, vec![3200, 3290, 3380, 3290, 3200, 3290]);
    }

    #[test]
    fn device_count_cycles() {
        let mut sensor = SimulatedSensor::new(0.0, 1.0, 0.5, 2);
        let values: Vec<u16> = (0..5)
            .map(|_| block_on(sensor.read_nearby_device_count()).unwrap())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 0, 1]);
    }
}
