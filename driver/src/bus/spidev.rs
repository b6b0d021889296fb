//! [BusTransport] on top of the Linux spidev interface.

use crate::bus::{
    BusConnection, BusSettings, BusTransport, DeviceId, SharingMode, SpiMode, controller_bus,
};
use crate::{LcdError, LcdResult};
use embedded_hal::spi::SpiDevice;
use linux_embedded_hal::SpidevDevice;
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use log::{debug, trace};
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Device nodes currently held in [SharingMode::Exclusive] mode by this process.
static CLAIMED: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

impl From<SpiMode> for SpiModeFlags {
    fn from(mode: SpiMode) -> Self {
        match mode {
            SpiMode::Mode0 => SpiModeFlags::SPI_MODE_0,
            SpiMode::Mode1 => SpiModeFlags::SPI_MODE_1,
            SpiMode::Mode2 => SpiModeFlags::SPI_MODE_2,
            SpiMode::Mode3 => SpiModeFlags::SPI_MODE_3,
        }
    }
}

/// Finds and opens `/dev/spidev<bus>.<cs>` nodes.
#[derive(Debug, Clone)]
pub struct SpidevTransport {
    dev_dir: PathBuf,
}

impl SpidevTransport {
    pub fn new() -> Self {
        Self::with_dev_dir("/dev")
    }

    /// Looks for device nodes in `dev_dir` instead of `/dev`.
    pub fn with_dev_dir(dev_dir: impl Into<PathBuf>) -> Self {
        SpidevTransport {
            dev_dir: dev_dir.into(),
        }
    }

    fn node_path(&self, bus: u16, chip_select: u8) -> PathBuf {
        self.dev_dir.join(format!("spidev{bus}.{chip_select}"))
    }
}

impl Default for SpidevTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransport for SpidevTransport {
    type Connection = SpidevConnection;

    fn discover(&self, controller: &str) -> LcdResult<Vec<DeviceId>> {
        let Some(bus) = controller_bus(controller) else {
            return Err(LcdError::DeviceUnavailable(format!(
                "unknown controller name {controller:?}"
            )));
        };

        let prefix = format!("spidev{bus}.");
        let entries = std::fs::read_dir(&self.dev_dir).map_err(|e| {
            LcdError::DeviceUnavailable(format!("{}: {}", self.dev_dir.display(), e))
        })?;

        let found = entries
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_name().to_string_lossy().starts_with(&prefix));

        debug!("Discovery of {controller} in {}: {found}", self.dev_dir.display());

        Ok(if found {
            vec![DeviceId {
                controller: controller.to_string(),
                bus,
            }]
        } else {
            Vec::new()
        })
    }

    fn open(&self, device: &DeviceId, settings: &BusSettings) -> LcdResult<SpidevConnection> {
        let path = self.node_path(device.bus, settings.chip_select);
        debug!("Opening {} with {:?}", path.display(), settings);

        let exclusive = settings.sharing == SharingMode::Exclusive;
        if exclusive {
            let mut claimed = CLAIMED.lock().unwrap_or_else(PoisonError::into_inner);
            if !claimed.insert(path.clone()) {
                return Err(LcdError::DeviceUnavailable(format!(
                    "{} is already in use",
                    path.display()
                )));
            }
        }

        let connection = open_device(&path, settings).map(|spi| SpidevConnection {
            spi,
            path: path.clone(),
            exclusive,
        });

        if connection.is_err() && exclusive {
            release(&path);
        }

        connection
    }
}

fn open_device(path: &Path, settings: &BusSettings) -> LcdResult<SpidevDevice> {
    let mut spi = SpidevDevice::open(path)
        .map_err(|e| LcdError::DeviceUnavailable(format!("{}: {:?}", path.display(), e)))?;

    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(settings.clock_hz)
        .mode(settings.mode.into())
        .build();

    spi.0
        .configure(&options)
        .map_err(|e| LcdError::DeviceUnavailable(format!("{}: {}", path.display(), e)))?;

    Ok(spi)
}

fn release(path: &Path) {
    CLAIMED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(path);
}

/// An open spidev node. Releases its exclusive claim when dropped.
pub struct SpidevConnection {
    spi: SpidevDevice,
    path: PathBuf,
    exclusive: bool,
}

impl Debug for SpidevConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpidevConnection({})", self.path.display())
    }
}

impl BusConnection for SpidevConnection {
    fn write(&mut self, bytes: &[u8]) -> LcdResult<()> {
        trace!("{:?}: writing {} bytes", self, bytes.len());
        write_latched(&mut self.spi, bytes)
            .map_err(|e| LcdError::Bus(format!("{}: {:?}", self.path.display(), e)))
    }
}

/// Sends every byte as its own transfer. The shift register latches its outputs when chip
/// select is released, so each byte needs its own chip select cycle to reach the display.
fn write_latched<S: SpiDevice>(spi: &mut S, bytes: &[u8]) -> Result<(), S::Error> {
    for byte in bytes {
        spi.write(std::slice::from_ref(byte))?;
    }
    Ok(())
}

impl Drop for SpidevConnection {
    fn drop(&mut self) {
        if self.exclusive {
            release(&self.path);
        }
    }
}
