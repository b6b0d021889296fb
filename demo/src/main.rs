mod config;
mod demos;

use std::env::{var, var_os};
use std::time::Duration;
use dotenv::dotenv;
use lcdbridge_driver::bus::{BusTransport, MockTransport, SpidevTransport};
use lcdbridge_driver::driver::Driver;
use log::{debug, info};
use sysinfo::System;
use crate::config::Config;
use crate::demos::DemoKind;

fn run<T: BusTransport>(
    mut lcd: Driver<T>,
    demo: DemoKind,
    run_for: Option<Duration>,
) -> eyre::Result<()> {
    debug!("Initializing LCD driver...");
    lcd.start_preset()?;
    debug!("{:?} initialized.", lcd);

    info!("Running {:?} demo...", demo);
    match demo {
        DemoKind::Basic => demos::run_basic(&lcd, run_for)?,
        DemoKind::Static => demos::run_static(&lcd, run_for)?,
    }

    lcd.stop()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "lcdbridge on {}, kernel {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load() {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    let demo = var("LCDBRIDGE_DEMO")
        .ok()
        .as_deref()
        .map(str::parse::<DemoKind>)
        .transpose()?
        .unwrap_or_default();

    let run_for = var("LCDBRIDGE_RUN_SECONDS")
        .ok()
        .map(|s| s.parse::<u64>())
        .transpose()?
        .map(Duration::from_secs);

    if var_os("LCDBRIDGE_DRY_RUN").is_some() {
        info!("Dry run, bus writes are only logged.");
        let transport = MockTransport::new().with_history_limit(0);
        run(Driver::new(transport, config.driver), demo, run_for)
    } else {
        run(Driver::new(SpidevTransport::new(), config.driver), demo, run_for)
    }
}
