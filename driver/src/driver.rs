//! The display driver: lifecycle, text/glyph API and the periodic dump.
//!
//! Callers only touch the [FrameBuffer]; the bus is written from three places, all under the same
//! mutex: the cold-start handshake, custom glyph uploads, and the [FlushScheduler] tick, which
//! re-sends every physical row whenever the frame buffer revision moved since the last dump.

use crate::bus::{BusConnection, BusTransport};
use crate::config::DriverConfig;
use crate::framebuffer::FrameBuffer;
use crate::layout::LayoutDescriptor;
use crate::protocol::{CursorDirection, Hd44780Commands, SET_FUNC_4, SET_FUNC_8, TransferBuffer};
use crate::scheduler::FlushScheduler;
use crate::{LcdError, LcdResult};
use log::{debug, error, info, trace, warn};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::sleep;
use std::time::Duration;

/// Pause after the first synchronization command (datasheet minimum is 4.1 ms).
pub const POWER_ON_RECOVERY: Duration = Duration::from_millis(5);
/// Pause after the second synchronization command (datasheet minimum is 100 us).
pub const SYNC_PAUSE: Duration = Duration::from_millis(1);

/// Custom character slots available in CGRAM.
pub const GLYPH_SLOTS: i32 = 8;
/// Tallest glyph pattern the controller supports (5x10 font).
pub const MAX_GLYPH_ROWS: usize = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriverState {
    Uninitialized,
    Initializing,
    Running,
    Stopped,
}

/// Everything shared between API callers and the flush thread.
#[derive(Debug)]
struct Session<C> {
    layout: LayoutDescriptor,
    frame: FrameBuffer,
    last_flushed: u32,
    connection: C,
}

impl<C: BusConnection> Session<C> {
    fn send(&mut self, buffer: &TransferBuffer) -> LcdResult<()> {
        submit(&mut self.connection, buffer)
    }

    /// Dumps every physical row if the frame buffer changed since the last successful dump.
    /// Returns whether anything was sent.
    ///
    /// The revision is only recorded once all rows went out, so a failed dump is redone in full
    /// on the next call.
    fn flush(&mut self) -> LcdResult<bool> {
        let revision = self.frame.revision();
        if revision == self.last_flushed {
            return Ok(false);
        }

        let mut buffer = TransferBuffer::with_capacity(self.layout.max_span() + 1);
        for row in self.layout.physical_rows() {
            buffer.clear();
            buffer.set_ddram_address(row.base_address())?;
            for block in row.blocks() {
                let cells = &self.frame.row(block.logical_row)
                    [block.logical_column_offset..block.logical_column_offset + block.width];
                for &cell in cells {
                    buffer.push_data(cell);
                }
            }
            submit(&mut self.connection, &buffer)?;
        }

        trace!("Dumped revision {}", revision);
        self.last_flushed = revision;
        Ok(true)
    }
}

fn submit<C: BusConnection>(connection: &mut C, buffer: &TransferBuffer) -> LcdResult<()> {
    trace!("Sending {} bytes", buffer.len());
    connection.write(buffer.as_bytes())
}

/// HD44780 4-bit cold start.
///
/// The controller may power up in either 8-bit or 4-bit mode, possibly halfway through a byte.
/// Three "function set, 8-bit" commands bring it to a known 8-bit state from any of those,
/// after which "function set, 4-bit" switches the interface for good.
fn handshake<C: BusConnection>(connection: &mut C) -> LcdResult<()> {
    let mut buffer = TransferBuffer::with_capacity(8);

    debug!("Synchronizing controller");
    buffer.push_command(SET_FUNC_8);
    submit(connection, &buffer)?;
    sleep(POWER_ON_RECOVERY);

    buffer.clear();
    buffer.push_command(SET_FUNC_8);
    submit(connection, &buffer)?;
    sleep(SYNC_PAUSE);

    buffer.clear();
    buffer.push_command(SET_FUNC_8);
    buffer.push_command(SET_FUNC_4);

    debug!("Controller in 4-bit mode, configuring");
    buffer.function_set(false, true, false);
    buffer.set_display_control(true, false, false);
    buffer.set_entry_mode(CursorDirection::Right, false);
    buffer.return_home();
    submit(connection, &buffer)
}

/// Drives one display on one bus device.
///
/// At most one running driver can hold a device opened in exclusive mode; see
/// [crate::bus::SharingMode].
pub struct Driver<T: BusTransport> {
    transport: T,
    config: DriverConfig,
    state: DriverState,
    rows: usize,
    columns: usize,
    session: Option<Arc<Mutex<Session<T::Connection>>>>,
    scheduler: Option<FlushScheduler>,
}

impl<T: BusTransport> Driver<T> {
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Driver {
            transport,
            config,
            state: DriverState::Uninitialized,
            rows: 0,
            columns: 0,
            session: None,
            scheduler: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Logical rows of the current layout, 0 before [Self::start].
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Logical columns of the current layout, 0 before [Self::start].
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Starts with the layout preset from the config.
    pub fn start_preset(&mut self) -> LcdResult<()> {
        self.start(self.config.layout.descriptor())
    }

    /// Opens the bus, initializes the controller, clears the screen and arms the flush scheduler.
    ///
    /// # Errors
    /// - [LcdError::AlreadyRunning] if the driver was started before, even if it was stopped since.
    /// - [LcdError::DeviceUnavailable] if the bus controller cannot be found or opened.
    /// - [LcdError::InitializationFailed] if the controller handshake fails.
    ///
    /// On error, the driver stays uninitialized and the bus device is released.
    pub fn start(&mut self, layout: LayoutDescriptor) -> LcdResult<()> {
        if self.state != DriverState::Uninitialized {
            return Err(LcdError::AlreadyRunning);
        }

        self.state = DriverState::Initializing;
        match self.initialize(layout) {
            Ok(()) => {
                self.state = DriverState::Running;
                info!(
                    "LCD driver running ({}x{} on {})",
                    self.columns, self.rows, self.config.controller
                );
                Ok(())
            }
            Err(e) => {
                self.state = DriverState::Uninitialized;
                Err(e)
            }
        }
    }

    fn initialize(&mut self, layout: LayoutDescriptor) -> LcdResult<()> {
        let controller = &self.config.controller;
        let devices = self.transport.discover(controller)?;
        debug!("Found {:?} for {}", devices, controller);

        let device = devices.first().ok_or_else(|| {
            LcdError::DeviceUnavailable(format!("no {controller} controller found"))
        })?;

        let mut connection = self.transport.open(device, &self.config.bus_settings())?;
        debug!("Opened {:?}", connection);

        if let Err(e) = handshake(&mut connection) {
            error!("Controller handshake failed: {}", e);
            return Err(LcdError::InitializationFailed(e.to_string()));
        }

        let mut frame = FrameBuffer::new(layout.logical_rows(), layout.logical_columns());
        frame.clear();

        let (rows, columns) = (layout.logical_rows(), layout.logical_columns());
        let session = Arc::new(Mutex::new(Session {
            layout,
            frame,
            last_flushed: 0,
            connection,
        }));

        let tick_session = Arc::clone(&session);
        let scheduler = FlushScheduler::spawn(self.config.flush_period(), move || {
            let mut session = tick_session.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = session.flush() {
                warn!("Display dump failed, retrying next tick: {}", e);
            }
        })
        .map_err(|e| LcdError::InitializationFailed(format!("flush thread: {e}")))?;

        self.rows = rows;
        self.columns = columns;
        self.session = Some(session);
        self.scheduler = Some(scheduler);
        Ok(())
    }

    /// Stops the flush scheduler, waiting for a dump in progress, and releases the bus device.
    ///
    /// # Errors
    /// [LcdError::NotRunning] if the driver is not running.
    pub fn stop(&mut self) -> LcdResult<()> {
        if self.state != DriverState::Running {
            return Err(LcdError::NotRunning);
        }

        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        self.session = None;
        self.state = DriverState::Stopped;
        info!("LCD driver stopped");
        Ok(())
    }

    fn with_session<R>(
        &self,
        f: impl FnOnce(&mut Session<T::Connection>) -> R,
    ) -> LcdResult<R> {
        match (&self.state, &self.session) {
            (DriverState::Running, Some(session)) => {
                let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(f(&mut session))
            }
            _ => Err(LcdError::NotRunning),
        }
    }

    /// Writes `text` from `(row, column)` to the right.
    ///
    /// Empty text, a row outside the grid, or a column past the last one are ignored. Characters
    /// falling outside the grid are clipped. Non-ASCII characters show up as `?`; custom glyphs
    /// are written as `'\u{0}'..='\u{7}'`.
    ///
    /// # Errors
    /// [LcdError::NotRunning] if the driver is not running.
    pub fn write_text(&self, text: &str, row: isize, column: isize) -> LcdResult<()> {
        self.with_session(|session| session.frame.write_text(text, row, column))
    }

    /// Same as [Self::write_text], with raw character codes.
    pub fn write_bytes(&self, bytes: &[u8], row: isize, column: isize) -> LcdResult<()> {
        self.with_session(|session| session.frame.write_bytes(bytes, row, column))
    }

    /// Blanks the whole grid.
    pub fn clear(&self) -> LcdResult<()> {
        self.with_session(|session| session.frame.clear())
    }

    /// Forces a dump on the next tick.
    pub fn invalidate(&self) -> LcdResult<()> {
        self.with_session(|session| session.frame.invalidate())
    }

    /// Current frame buffer revision.
    pub fn revision(&self) -> LcdResult<u32> {
        self.with_session(|session| session.frame.revision())
    }

    /// Character codes currently in logical row `row`.
    ///
    /// # Errors
    /// - [LcdError::NotRunning] if the driver is not running.
    /// - [LcdError::InvalidArgument] if `row` is outside the grid.
    pub fn read_row(&self, row: usize) -> LcdResult<Vec<u8>> {
        self.with_session(|session| {
            if row < session.frame.rows() {
                Ok(session.frame.row(row).to_vec())
            } else {
                Err(LcdError::InvalidArgument)
            }
        })?
    }

    /// Runs one scheduler tick right away. Returns whether a dump was sent.
    ///
    /// # Errors
    /// - [LcdError::NotRunning] if the driver is not running.
    /// - [LcdError::Bus] if a write failed; the next tick will retry the whole dump.
    pub fn flush(&self) -> LcdResult<bool> {
        self.with_session(|session| session.flush())?
    }

    /// Uploads a custom character pattern, one byte per pixel row (5 low bits used).
    ///
    /// `code` is wrapped into the 8 available slots (`8` is slot 0, `-1` is slot 7), and
    /// `pattern` is cut to [MAX_GLYPH_ROWS] rows. The upload is sent right away instead of waiting
    /// for the next tick.
    ///
    /// # Errors
    /// - [LcdError::NotInitialized] if the driver was never started.
    /// - [LcdError::NotRunning] if the driver was stopped.
    /// - [LcdError::Bus] if the write failed.
    ///
    /// # Example
    ///
    /// A 5x7 "F":
    ///
    /// ```text
    /// #####
    /// #
    /// #
    /// ###
    /// #
    /// #
    /// #
    /// ```
    ///
    /// ```no_run
    /// # use lcdbridge_driver::{bus::MockTransport, config::DriverConfig, driver::Driver};
    /// # let mut driver = Driver::new(MockTransport::new(), DriverConfig::default());
    /// # driver.start_preset().unwrap();
    /// driver.define_glyph(2, &[0x1F, 0x10, 0x10, 0x1C, 0x10, 0x10, 0x10]).unwrap();
    /// driver.write_text("\u{2}", 0, 0).unwrap();
    /// ```
    pub fn define_glyph(&self, code: i32, pattern: &[u8]) -> LcdResult<()> {
        match self.state {
            DriverState::Running => {}
            DriverState::Stopped => return Err(LcdError::NotRunning),
            DriverState::Uninitialized | DriverState::Initializing => {
                return Err(LcdError::NotInitialized);
            }
        }

        let slot = code.rem_euclid(GLYPH_SLOTS) as u8;
        let rows = &pattern[..pattern.len().min(MAX_GLYPH_ROWS)];

        let mut buffer = TransferBuffer::with_capacity(1 + rows.len());
        buffer.set_cgram_address(slot << 3)?;
        for &row in rows {
            buffer.push_data(row);
        }

        debug!("Uploading glyph {} ({} rows)", slot, rows.len());
        self.with_session(|session| {
            session.send(&buffer)?;
            session.frame.invalidate();
            Ok(())
        })?
    }
}

impl<T: BusTransport> Debug for Driver<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Driver({:?}, {:?}, {}x{})",
            self.transport, self.state, self.columns, self.rows
        )
    }
}

impl<T: BusTransport> Drop for Driver<T> {
    fn drop(&mut self) {
        if self.state == DriverState::Running {
            let _ = self.stop();
        }
    }
}
