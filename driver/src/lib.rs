//! Character LCD driver for HD44780-compatible controllers wired through a serial-to-parallel
//! shift register (74HC595 style) on an SPI bus.
//!
//! The [Driver](driver::Driver) owns a logical text grid ([FrameBuffer](framebuffer::FrameBuffer)),
//! and a background [FlushScheduler](scheduler::FlushScheduler) re-dumps it to the display whenever
//! its revision changes. The mapping from the logical grid to the controller's interleaved DDRAM
//! is described by a [LayoutDescriptor](layout::LayoutDescriptor).

pub mod bus;
pub mod config;
pub mod driver;
pub mod framebuffer;
pub mod layout;
pub mod protocol;
pub mod scheduler;

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("invalid layout: {0}")]
    Config(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    #[error("driver already running")]
    AlreadyRunning,
    #[error("driver not running")]
    NotRunning,
    #[error("driver not initialized")]
    NotInitialized,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("bus error: {0}")]
    Bus(String),
}

impl From<std::io::Error> for LcdError {
    fn from(err: std::io::Error) -> Self {
        LcdError::Bus(err.to_string())
    }
}

pub type LcdResult<T> = Result<T, LcdError>;
