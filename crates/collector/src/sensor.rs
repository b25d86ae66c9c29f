//! BME280 sensor access.
//!
//! The register-level protocol lives in the `bme280` crate; this module
//! wraps it behind the [`Sensor`] trait so the control loop can be
//! exercised without hardware on the bus.

use bme280::i2c::BME280;
use linux_embedded_hal::Delay;
use linux_embedded_hal::I2cdev;
use thiserror::Error;

use crate::config::SECONDARY_I2C_ADDRESS;

/// One sample of the environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Atmospheric pressure in hPa.
    pub pressure: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
}

/// Errors reported by the sensor seam.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to open I2C bus {path}: {message}")]
    BusOpen { path: String, message: String },
    #[error("sensor driver fault: {message}")]
    Driver { message: String },
    #[error("no sample taken yet, refresh the sensor first")]
    NoSample,
}

/// Narrow interface the control loop reads the environment through.
pub trait Sensor {
    /// Forces a fresh measurement into the driver state.
    fn refresh(&mut self) -> Result<(), SensorError>;

    /// Returns the values captured by the last refresh.
    fn reading(&self) -> Result<Reading, SensorError>;
}

/// Owns the I2C bus and the BME280 driver for the process lifetime.
pub struct Bme280Sensor {
    driver: BME280<I2cdev>,
    delay: Delay,
    last: Option<Reading>,
}

impl core::fmt::Debug for Bme280Sensor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bme280Sensor")
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl Bme280Sensor {
    /// Opens the bus device and runs the driver's init sequence.
    pub fn open(device: &str, address: u8) -> Result<Self, SensorError> {
        let i2c = I2cdev::new(device).map_err(|err| SensorError::BusOpen {
            path: device.to_string(),
            message: err.to_string(),
        })?;

        let mut driver = if address == SECONDARY_I2C_ADDRESS {
            BME280::new_secondary(i2c)
        } else {
            BME280::new_primary(i2c)
        };

        let mut delay = Delay;
        driver.init(&mut delay).map_err(driver_error)?;

        Ok(Self {
            driver,
            delay,
            last: None,
        })
    }
}

impl Sensor for Bme280Sensor {
    fn refresh(&mut self) -> Result<(), SensorError> {
        let measurements = self.driver.measure(&mut self.delay).map_err(driver_error)?;
        self.last = Some(Reading {
            temperature: f64::from(measurements.temperature),
            // The driver reports pascals; the gauge contract is hPa.
            pressure: f64::from(measurements.pressure) / 100.0,
            humidity: f64::from(measurements.humidity),
        });
        Ok(())
    }

    fn reading(&self) -> Result<Reading, SensorError> {
        self.last.ok_or(SensorError::NoSample)
    }
}

fn driver_error<E: core::fmt::Debug>(err: bme280::Error<E>) -> SensorError {
    SensorError::Driver {
        message: format!("{err:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_on_missing_bus_reports_bus_open() {
        let err = Bme280Sensor::open("/dev/i2c-no-such-bus", 0x76).unwrap_err();
        match err {
            SensorError::BusOpen { path, .. } => assert_eq!(path, "/dev/i2c-no-such-bus"),
            other => panic!("expected BusOpen, got {other:?}"),
        }
    }
}
