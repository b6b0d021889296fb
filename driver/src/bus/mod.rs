//! Byte-oriented write-only bus the shift register hangs off.
//!
//! See [SpidevTransport] for the Linux implementation and [MockTransport] for an in-memory one.

mod mock;
mod spidev;

use crate::LcdResult;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
pub use mock::*;
pub use spidev::*;

/// Clock polarity and phase.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SpiMode {
    /// CPOL = 0, CPHA = 0.
    #[default]
    Mode0,
    /// CPOL = 0, CPHA = 1.
    Mode1,
    /// CPOL = 1, CPHA = 0.
    Mode2,
    /// CPOL = 1, CPHA = 1.
    Mode3,
}

/// Whether other users may open the same device while we hold it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum SharingMode {
    #[default]
    Exclusive,
    Shared,
}

/// Everything the transport needs to open a device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BusSettings {
    pub chip_select: u8,
    pub clock_hz: u32,
    pub mode: SpiMode,
    pub sharing: SharingMode,
}

impl Default for BusSettings {
    fn default() -> Self {
        BusSettings {
            chip_select: 0,
            clock_hz: 1_000_000,
            mode: SpiMode::Mode0,
            sharing: SharingMode::Exclusive,
        }
    }
}

/// A bus controller found during discovery.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct DeviceId {
    /// The name it was discovered by, e.g. `SPI0`.
    pub controller: String,
    /// Bus number, as in `/dev/spidev<bus>.<cs>`.
    pub bus: u16,
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(bus {})", self.controller, self.bus)
    }
}

pub trait BusTransport: Debug {
    type Connection: BusConnection + Send + 'static;

    /// Lists the devices answering to the given controller name.
    fn discover(&self, controller: &str) -> LcdResult<Vec<DeviceId>>;

    /// Opens a device for writing.
    ///
    /// # Errors
    /// - [crate::LcdError::DeviceUnavailable] if the device cannot be opened or configured.
    fn open(&self, device: &DeviceId, settings: &BusSettings) -> LcdResult<Self::Connection>;
}

pub trait BusConnection: Debug {
    /// Writes the bytes as one burst: one physical row dump, or one handshake step.
    ///
    /// A burst is not a single bus transaction. Every byte is one shift register load and has to
    /// be latched on its own, so implementations send it as a separate transfer.
    fn write(&mut self, bytes: &[u8]) -> LcdResult<()>;
}

/// Parses the bus number out of a controller name like `SPI0`.
pub fn controller_bus(controller: &str) -> Option<u16> {
    let digits_at = controller.find(|c: char| c.is_ascii_digit())?;
    let (prefix, digits) = controller.split_at(digits_at);
    if !prefix.eq_ignore_ascii_case("spi") {
        return None;
    }
    digits.parse().ok()
}
