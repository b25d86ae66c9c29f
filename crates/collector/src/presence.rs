//! Bus presence check.
//!
//! Before touching the sensor the collector shells out to `i2cdetect`
//! and looks for the configured address in the scan grid. A scan that
//! cannot run is treated the same as an absent device.

use std::process::Command;

use tracing::debug;
use tracing::error;
use tracing::info;

/// Returns true iff `address` shows up in a scan of the given I2C bus.
///
/// Failure to execute the scan tool is logged and collapses to `false`;
/// the caller treats "not found" and "could not check" identically.
pub fn check_device_address(bus: u8, address: u8) -> bool {
    debug!("checking for device at 0x{address:02x} on I2C bus {bus}");

    let output = match Command::new("i2cdetect")
        .args(["-y", &bus.to_string()])
        .output()
    {
        Ok(output) => output,
        Err(err) => {
            error!("failed to run i2cdetect: {err}");
            return false;
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("i2cdetect output:\n{stdout}");

    if !scan_contains_address(&stdout, address) {
        error!("device at 0x{address:02x} not found on I2C bus {bus}, check the wiring");
        return false;
    }

    info!("device at 0x{address:02x} found on I2C bus {bus}");
    true
}

/// The scan grid prints present addresses as two lowercase hex digits.
fn scan_contains_address(scan_output: &str, address: u8) -> bool {
    scan_output.contains(&format!("{address:02x}"))
}
