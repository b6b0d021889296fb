//! In-memory [BusTransport] recording every burst, for tests and hardware-less runs.

use crate::bus::{BusConnection, BusSettings, BusTransport, DeviceId};
use crate::{LcdError, LcdResult};
use log::trace;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// What the mock bus has seen so far. Shared between the transport, its connections and the test.
#[derive(Debug, Default)]
pub struct MockBusState {
    /// Successful writes, in order. Only the last `history_limit` are kept when it is set.
    pub bursts: Vec<Vec<u8>>,
    pub history_limit: Option<usize>,
    /// Number of successful `open` calls.
    pub open_count: usize,
    /// Whether a connection is currently alive.
    pub connected: bool,
    /// Settings of the last `open`.
    pub last_settings: Option<BusSettings>,
    /// This many upcoming writes fail with [LcdError::Bus]...
    pub failing_writes: usize,
    /// ...once this many more writes went through.
    pub passing_writes: usize,
}

#[derive(Debug, Clone)]
pub struct MockTransport {
    controllers: Vec<String>,
    fail_open: bool,
    state: Arc<Mutex<MockBusState>>,
}

impl MockTransport {
    /// A transport with a single `SPI0` controller.
    pub fn new() -> Self {
        MockTransport {
            controllers: vec!["SPI0".to_string()],
            fail_open: false,
            state: Arc::default(),
        }
    }

    /// A transport where discovery finds nothing.
    pub fn without_devices() -> Self {
        MockTransport {
            controllers: Vec::new(),
            ..Self::new()
        }
    }

    /// Discovery succeeds, but opening fails.
    pub fn with_failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Keeps at most `limit` bursts, dropping the oldest. `0` only logs them.
    pub fn with_history_limit(self, limit: usize) -> Self {
        self.state().history_limit = Some(limit);
        self
    }

    /// Makes the next `count` writes fail.
    pub fn fail_writes(&self, count: usize) {
        self.fail_writes_after(0, count);
    }

    /// Lets `pass` writes through, then makes the following `count` writes fail.
    pub fn fail_writes_after(&self, pass: usize, count: usize) {
        let mut state = self.state();
        state.passing_writes = pass;
        state.failing_writes = count;
    }

    pub fn state(&self) -> MutexGuard<'_, MockBusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of all bursts written so far.
    pub fn bursts(&self) -> Vec<Vec<u8>> {
        self.state().bursts.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state().connected
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl BusTransport for MockTransport {
    type Connection = MockConnection;

    fn discover(&self, controller: &str) -> LcdResult<Vec<DeviceId>> {
        Ok(self
            .controllers
            .iter()
            .enumerate()
            .filter(|(_, name)| name.as_str() == controller)
            .map(|(bus, name)| DeviceId {
                controller: name.clone(),
                bus: bus as u16,
            })
            .collect())
    }

    fn open(&self, device: &DeviceId, settings: &BusSettings) -> LcdResult<MockConnection> {
        if self.fail_open {
            return Err(LcdError::DeviceUnavailable(format!("{device} refused to open")));
        }

        let mut state = self.state();
        if state.connected {
            return Err(LcdError::DeviceUnavailable(format!("{device} is already in use")));
        }
        state.connected = true;
        state.open_count += 1;
        state.last_settings = Some(settings.clone());

        Ok(MockConnection {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    state: Arc<Mutex<MockBusState>>,
}

impl BusConnection for MockConnection {
    fn write(&mut self, bytes: &[u8]) -> LcdResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.passing_writes > 0 {
            state.passing_writes -= 1;
        } else if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(LcdError::Bus("injected failure".to_string()));
        }
        trace!("Mock burst: {:02x?}", bytes);
        state.bursts.push(bytes.to_vec());
        if let Some(limit) = state.history_limit {
            let excess = state.bursts.len().saturating_sub(limit);
            state.bursts.drain(..excess);
        }
        Ok(())
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .connected = false;
    }
}
