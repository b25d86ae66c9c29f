//! Read-publish control loop.
//!
//! [`Collector`] owns the metrics registry and the push configuration
//! and drives the sensor through the [`Sensor`] seam. Every failure
//! past the presence check is fatal: the error is counted, logged, and
//! handed back to `main`, which exits non-zero. There is no
//! iteration-level recovery.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use embedded_hal::delay::DelayNs;
use tracing::debug;
use tracing::error;
use tracing::info;

use crate::metrics::MeteoMetrics;
use crate::sensor::Bme280Sensor;
use crate::sensor::Reading;
use crate::sensor::Sensor;
use crate::sensor::SensorError;

/// Settle delay before the first forced refresh.
const FIRST_SETTLE_MS: u32 = 1000;
/// Settle delay before the second forced refresh.
const SECOND_SETTLE_MS: u32 = 500;

pub struct Collector {
    metrics: MeteoMetrics,
    pushgateway_url: String,
    job_name: String,
    interval: Duration,
}

impl Collector {
    pub fn new(
        metrics: MeteoMetrics,
        pushgateway_url: String,
        job_name: String,
        interval: Duration,
    ) -> Self {
        Self {
            metrics,
            pushgateway_url,
            job_name,
            interval,
        }
    }

    pub fn metrics(&self) -> &MeteoMetrics {
        &self.metrics
    }

    /// Opens the sensor once; a failure is counted and yields no handle.
    pub fn initialize_sensor(&self, device: &str, address: u8) -> Option<Bme280Sensor> {
        match Bme280Sensor::open(device, address) {
            Ok(sensor) => {
                info!("BME280 sensor initialized on {device} at 0x{address:02x}");
                Some(sensor)
            }
            Err(err) => {
                self.metrics.inc_init_errors();
                error!("failed to initialize sensor: {err}");
                None
            }
        }
    }

    /// Takes a stabilized reading and overwrites the gauges with it.
    ///
    /// Any refresh or read failure is counted and returned; the gauges
    /// keep their previous values in that case.
    pub fn acquire<S, D>(&self, sensor: &mut S, delay: &mut D) -> Result<Reading, SensorError>
    where
        S: Sensor,
        D: DelayNs,
    {
        match stabilized_reading(sensor, delay) {
            Ok(reading) => {
                self.metrics.record_reading(&reading);
                info!(
                    "Reading: temperature={:.2} °C, pressure={:.2} hPa, humidity={:.2}%",
                    reading.temperature, reading.pressure, reading.humidity
                );
                Ok(reading)
            }
            Err(err) => {
                self.metrics.inc_read_errors();
                error!("failed to read sensor: {err}");
                Err(err)
            }
        }
    }

    /// Pushes the registry snapshot to the Pushgateway under the job label.
    pub fn push(&self) -> Result<(), prometheus::Error> {
        debug!("pushing metrics to {}", self.pushgateway_url);
        match prometheus::push_metrics(
            &self.job_name,
            HashMap::new(),
            &self.pushgateway_url,
            self.metrics.gather(),
            None,
        ) {
            Ok(()) => {
                info!("metrics pushed to Pushgateway");
                Ok(())
            }
            Err(err) => {
                self.metrics.inc_push_errors();
                error!("failed to push metrics to Pushgateway: {err}");
                Err(err)
            }
        }
    }

    /// Runs the infinite acquire/push/sleep cycle.
    ///
    /// Only returns on a fatal acquire or push failure.
    pub fn run<S, D>(&self, sensor: &mut S, delay: &mut D) -> anyhow::Result<()>
    where
        S: Sensor,
        D: DelayNs,
    {
        loop {
            self.acquire(sensor, delay).context("sensor read failed")?;
            self.push().context("metrics push failed")?;
            thread::sleep(self.interval);
        }
    }
}

/// Two forced refreshes, each preceded by a settle delay, then read.
///
/// The refresh count and delay values are load-bearing; readings taken
/// without this exact sequence drift after standby.
fn stabilized_reading<S, D>(sensor: &mut S, delay: &mut D) -> Result<Reading, SensorError>
where
    S: Sensor,
    D: DelayNs,
{
    delay.delay_ms(FIRST_SETTLE_MS);
    sensor.refresh()?;
    debug!("first sensor refresh done");

    delay.delay_ms(SECOND_SETTLE_MS);
    sensor.refresh()?;
    debug!("second sensor refresh done");

    sensor.reading()
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;
    use crate::metrics::MeteoMetrics;

    const READING: Reading = Reading {
        temperature: 21.5,
        pressure: 1013.25,
        humidity: 45.0,
    };

    /// Sensor double that counts refreshes and can fail on the nth one.
    struct ScriptedSensor {
        refreshes: usize,
        fail_on_refresh: Option<usize>,
        reading: Reading,
    }

    impl ScriptedSensor {
        fn ok(reading: Reading) -> Self {
            Self {
                refreshes: 0,
                fail_on_refresh: None,
                reading,
            }
        }

        fn failing_on(refresh: usize) -> Self {
            Self {
                refreshes: 0,
                fail_on_refresh: Some(refresh),
                reading: READING,
            }
        }
    }

    impl Sensor for ScriptedSensor {
        fn refresh(&mut self) -> Result<(), SensorError> {
            self.refreshes += 1;
            if self.fail_on_refresh == Some(self.refreshes) {
                return Err(SensorError::Driver {
                    message: "bus timeout".to_string(),
                });
            }
            Ok(())
        }

        fn reading(&self) -> Result<Reading, SensorError> {
            if self.refreshes == 0 {
                return Err(SensorError::NoSample);
            }
            Ok(self.reading)
        }
    }

    /// DelayNs double that records requested delays in milliseconds.
    #[derive(Default)]
    struct RecordingDelay {
        delays_ms: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.delays_ms.push(ns / 1_000_000);
        }

        fn delay_ms(&mut self, ms: u32) {
            self.delays_ms.push(ms);
        }
    }

    fn collector() -> Collector {
        Collector::new(
            MeteoMetrics::new().unwrap(),
            "http://127.0.0.1:1".to_string(),
            "meteo_server".to_string(),
            Duration::from_secs(60),
        )
    }

    #[test_log::test]
    fn acquire_refreshes_twice_with_settle_delays() {
        let collector = collector();
        let mut sensor = ScriptedSensor::ok(READING);
        let mut delay = RecordingDelay::default();

        collector.acquire(&mut sensor, &mut delay).unwrap();

        assert_eq!(sensor.refreshes, 2);
        assert_eq!(delay.delays_ms, vec![1000, 500]);
    }

    #[test]
    fn acquire_overwrites_gauges_with_reading() {
        let collector = collector();
        let mut sensor = ScriptedSensor::ok(READING);
        let mut delay = RecordingDelay::default();

        let reading = collector.acquire(&mut sensor, &mut delay).unwrap();

        assert_eq!(reading, READING);
        assert_eq!(collector.metrics().temperature_value(), 21.5);
        assert_eq!(collector.metrics().pressure_value(), 1013.25);
        assert_eq!(collector.metrics().humidity_value(), 45.0);
        assert_eq!(collector.metrics().read_error_count(), 0);
    }

    #[test]
    fn failure_on_second_refresh_counts_and_keeps_gauges() {
        let collector = collector();
        let mut delay = RecordingDelay::default();

        // Seed the gauges with a previous successful cycle.
        let mut sensor = ScriptedSensor::ok(Reading {
            temperature: 18.0,
            pressure: 990.0,
            humidity: 60.0,
        });
        collector.acquire(&mut sensor, &mut delay).unwrap();

        let mut sensor = ScriptedSensor::failing_on(2);
        let err = collector.acquire(&mut sensor, &mut delay).unwrap_err();

        assert!(matches!(err, SensorError::Driver { .. }));
        assert_eq!(sensor.refreshes, 2);
        assert_eq!(collector.metrics().read_error_count(), 1);
        assert_eq!(collector.metrics().temperature_value(), 18.0);
        assert_eq!(collector.metrics().pressure_value(), 990.0);
        assert_eq!(collector.metrics().humidity_value(), 60.0);
    }

    #[test]
    fn failure_on_first_refresh_skips_second() {
        let collector = collector();
        let mut sensor = ScriptedSensor::failing_on(1);
        let mut delay = RecordingDelay::default();

        collector.acquire(&mut sensor, &mut delay).unwrap_err();

        assert_eq!(sensor.refreshes, 1);
        assert_eq!(delay.delays_ms, vec![1000]);
        assert_eq!(collector.metrics().read_error_count(), 1);
    }

    #[test]
    fn initialize_sensor_failure_counts_once_and_yields_no_handle() {
        let collector = collector();
        let sensor = collector.initialize_sensor("/dev/i2c-no-such-bus", 0x76);
        assert!(sensor.is_none());
        assert_eq!(collector.metrics().init_error_count(), 1);
    }

    #[test]
    fn push_to_unreachable_gateway_counts_and_fails() {
        // Port 1 on loopback is never listening; the push must fail
        // fast with a connection error.
        let collector = collector();
        assert!(collector.push().is_err());
        assert_eq!(collector.metrics().push_error_count(), 1);
    }
}
