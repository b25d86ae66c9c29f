use clap::Parser;

/// I2C address of a BME280 strapped to the secondary address pin.
pub const SECONDARY_I2C_ADDRESS: u8 = 0x77;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "meteo-collector",
    about = "Reads a BME280 environmental sensor and pushes the readings to a Prometheus Pushgateway",
    version
)]
pub struct CollectorArgs {
    #[arg(
        long,
        env = "PUSHGATEWAY_URL",
        help = "Pushgateway endpoint, e.g. http://localhost:9091"
    )]
    pub pushgateway_url: Option<String>,

    #[arg(
        long,
        default_value = "meteo_server",
        help = "Job label attached to pushed metrics"
    )]
    pub job_name: String,

    #[arg(
        long,
        default_value = "1",
        help = "I2C bus number; the sensor is expected on /dev/i2c-<bus>"
    )]
    pub i2c_bus: u8,

    #[arg(
        long,
        default_value = "0x76",
        value_parser = parse_address,
        help = "I2C address of the sensor, e.g. 0x76"
    )]
    pub sensor_address: u8,

    #[arg(
        long,
        default_value = "60",
        help = "Seconds to sleep between push cycles"
    )]
    pub interval_secs: u64,
}

impl CollectorArgs {
    /// Character device path of the configured I2C bus.
    pub fn i2c_device(&self) -> String {
        format!("/dev/i2c-{}", self.i2c_bus)
    }
}

/// Parses an I2C address given as `0x76` or bare hex digits `76`.
fn parse_address(raw: &str) -> Result<u8, String> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    u8::from_str_radix(digits, 16).map_err(|err| format!("invalid I2C address `{raw}`: {err}"))
}
