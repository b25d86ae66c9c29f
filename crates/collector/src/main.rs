mod collector;
mod config;
mod metrics;
mod presence;
mod sensor;

use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use linux_embedded_hal::Delay;
use tracing::error;
use tracing::info;

use crate::collector::Collector;
use crate::config::CollectorArgs;
use crate::metrics::MeteoMetrics;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

fn main() {
    setup_global_hooks();

    let args = CollectorArgs::parse();
    utils::logging::init();

    if let Err(err) = run(args) {
        error!("exiting: {err:#}");
        std::process::exit(1);
    }
}

fn run(args: CollectorArgs) -> Result<()> {
    let Some(pushgateway_url) = args.pushgateway_url.clone() else {
        error!("Pushgateway URL not found. Set PUSHGATEWAY_URL in the environment.");
        bail!("missing Pushgateway URL");
    };

    if !presence::check_device_address(args.i2c_bus, args.sensor_address) {
        bail!(
            "device at 0x{:02x} not found on I2C bus {}",
            args.sensor_address,
            args.i2c_bus
        );
    }

    let metrics = MeteoMetrics::new().context("failed to build metrics registry")?;
    let collector = Collector::new(
        metrics,
        pushgateway_url,
        args.job_name.clone(),
        Duration::from_secs(args.interval_secs),
    );

    let Some(mut sensor) = collector.initialize_sensor(&args.i2c_device(), args.sensor_address)
    else {
        bail!("sensor initialization failed");
    };

    info!(
        "starting metrics push loop, interval {}s, job {}",
        args.interval_secs, args.job_name
    );
    collector.run(&mut sensor, &mut Delay)
}
