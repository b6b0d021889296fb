use crate::bus::{BusSettings, SharingMode, SpiMode};
use crate::layout::LayoutPreset;
use crate::scheduler::MIN_PERIOD;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Driver settings, loadable from a config file.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// Name of the bus controller to discover, e.g. `SPI0`.
    pub controller: String,
    pub chip_select: u8,
    pub clock_hz: u32,
    pub mode: SpiMode,
    pub sharing: SharingMode,
    /// How often the frame buffer is checked for changes.
    pub flush_period_ms: u64,
    pub layout: LayoutPreset,
}

impl DriverConfig {
    pub fn bus_settings(&self) -> BusSettings {
        BusSettings {
            chip_select: self.chip_select,
            clock_hz: self.clock_hz,
            mode: self.mode,
            sharing: self.sharing,
        }
    }

    /// The flush period, at least [MIN_PERIOD].
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_period_ms).max(MIN_PERIOD)
    }

    pub fn with_flush_period(mut self, period: Duration) -> Self {
        self.flush_period_ms = period.as_millis() as u64;
        self
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        let bus = BusSettings::default();
        DriverConfig {
            controller: "SPI0".to_string(),
            chip_select: bus.chip_select,
            clock_hz: bus.clock_hz,
            mode: bus.mode,
            sharing: bus.sharing,
            flush_period_ms: 200,
            layout: LayoutPreset::default(),
        }
    }
}
