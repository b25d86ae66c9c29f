//! Prometheus instruments for the collector.
//!
//! The metric names are part of the external contract; dashboards and
//! alerts key on them.

use prometheus::proto::MetricFamily;
use prometheus::Gauge;
use prometheus::IntCounter;
use prometheus::Registry;

use crate::sensor::Reading;

/// The collector's registry: three reading gauges and three error
/// counters, created once at startup and owned by the control loop.
pub struct MeteoMetrics {
    registry: Registry,
    temperature: Gauge,
    pressure: Gauge,
    humidity: Gauge,
    sensor_init_errors: IntCounter,
    sensor_read_errors: IntCounter,
    push_errors: IntCounter,
}

impl MeteoMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let temperature = Gauge::new("meteo_temperature", "Current temperature in Celsius")?;
        let pressure = Gauge::new("meteo_pressure", "Current atmospheric pressure in hPa")?;
        let humidity = Gauge::new("meteo_humidity", "Current humidity percentage")?;
        let sensor_init_errors = IntCounter::new(
            "bme280_sensor_init_errors",
            "Number of sensor initialization errors",
        )?;
        let sensor_read_errors =
            IntCounter::new("bme280_sensor_read_errors", "Number of sensor read errors")?;
        let push_errors = IntCounter::new(
            "push_metrics_errors",
            "Number of errors when pushing metrics to Pushgateway",
        )?;

        registry.register(Box::new(temperature.clone()))?;
        registry.register(Box::new(pressure.clone()))?;
        registry.register(Box::new(humidity.clone()))?;
        registry.register(Box::new(sensor_init_errors.clone()))?;
        registry.register(Box::new(sensor_read_errors.clone()))?;
        registry.register(Box::new(push_errors.clone()))?;

        Ok(Self {
            registry,
            temperature,
            pressure,
            humidity,
            sensor_init_errors,
            sensor_read_errors,
            push_errors,
        })
    }

    /// Overwrites the three gauges with a fresh reading.
    pub fn record_reading(&self, reading: &Reading) {
        self.temperature.set(reading.temperature);
        self.pressure.set(reading.pressure);
        self.humidity.set(reading.humidity);
    }

    pub fn inc_init_errors(&self) {
        self.sensor_init_errors.inc();
    }

    pub fn inc_read_errors(&self) {
        self.sensor_read_errors.inc();
    }

    pub fn inc_push_errors(&self) {
        self.push_errors.inc();
    }

    /// Snapshot of every registered instrument, in push wire order.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    #[cfg(test)]
    pub fn temperature_value(&self) -> f64 {
        self.temperature.get()
    }

    #[cfg(test)]
    pub fn pressure_value(&self) -> f64 {
        self.pressure.get()
    }

    #[cfg(test)]
    pub fn humidity_value(&self) -> f64 {
        self.humidity.get()
    }

    #[cfg(test)]
    pub fn init_error_count(&self) -> u64 {
        self.sensor_init_errors.get()
    }

    #[cfg(test)]
    pub fn read_error_count(&self) -> u64 {
        self.sensor_read_errors.get()
    }

    #[cfg(test)]
    pub fn push_error_count(&self) -> u64 {
        self.push_errors.get()
    }
}
