//! Demo applications. They only use the driver's text API.

use std::str::FromStr;
use std::thread::sleep;
use std::time::{Duration, Instant};
use eyre::eyre;
use lcdbridge_driver::bus::BusTransport;
use lcdbridge_driver::driver::Driver;
use log::{debug, info};
use sysinfo::System;
use time::OffsetDateTime;
use time::macros::format_description;

const UNKNOWN_STR: &str = "???";

/// A small heart, 5x8.
const HEART: [u8; 8] = [0x00, 0x0A, 0x1F, 0x1F, 0x0E, 0x04, 0x00, 0x00];

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum DemoKind {
    /// Title, counter, clock and date.
    #[default]
    Basic,
    /// Fixed text only.
    Static,
}

impl FromStr for DemoKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(DemoKind::Basic),
            "static" => Ok(DemoKind::Static),
            other => Err(eyre!("Unknown demo {:?}", other)),
        }
    }
}

fn keep_going(deadline: Option<Instant>) -> bool {
    deadline.is_none_or(|deadline| Instant::now() < deadline)
}

/// Shows the program name, host name and version, then idles.
pub fn run_static<T: BusTransport>(lcd: &Driver<T>, run_for: Option<Duration>) -> eyre::Result<()> {
    let deadline = run_for.map(|d| Instant::now() + d);

    const LAST_LINE: &str = concat!("v.", env!("CARGO_PKG_VERSION"));

    lcd.write_text("lcdbridge", 0, 0)?;
    lcd.write_text(System::host_name().as_deref().unwrap_or(UNKNOWN_STR), 1, 0)?;
    lcd.write_text(LAST_LINE, 2, lcd.columns() as isize - LAST_LINE.len() as isize)?;

    info!("Static text written.");

    while keep_going(deadline) {
        sleep(Duration::from_millis(100));
    }
    Ok(())
}

/// Counts seconds, and shows the current time and date on the rows below.
pub fn run_basic<T: BusTransport>(lcd: &Driver<T>, run_for: Option<Duration>) -> eyre::Result<()> {
    let deadline = run_for.map(|d| Instant::now() + d);
    let time_format = format_description!("[hour]:[minute]:[second]");
    let date_format = format_description!("[month repr:long] [day]");

    lcd.define_glyph(0, &HEART)?;
    lcd.write_text("This is a basic demo", 0, 0)?;
    lcd.write_text("\u{0}", 1, lcd.columns() as isize - 1)?;

    let mut n = 0u64;
    while keep_going(deadline) {
        lcd.write_text(&format!("Counting...{n}"), 1, 0)?;

        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        lcd.write_text(&format!("{}   ", now.format(time_format)?), 2, 0)?;
        lcd.write_text(&format!("{}   ", now.format(date_format)?), 3, 0)?;

        debug!("Tick {}", n);
        n += 1;
        sleep(Duration::from_secs(1));
    }
    Ok(())
}
