//! Background thread calling a tick function at a fixed period until stopped.

use log::{debug, warn};
use std::fmt::{Debug, Formatter};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shortest accepted period. Anything below is raised to this.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

enum Control {
    Shutdown,
}

pub struct FlushScheduler {
    period: Duration,
    control: Sender<Control>,
    join: Option<JoinHandle<()>>,
}

impl FlushScheduler {
    /// Spawns the tick thread. The first tick happens one `period` after this call.
    pub fn spawn<F>(period: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        if period < MIN_PERIOD {
            warn!("Flush period {:?} too short, using {:?}", period, MIN_PERIOD);
        }
        let period = period.max(MIN_PERIOD);
        let (control, rx) = mpsc::channel();

        let join = thread::Builder::new()
            .name("lcd-flush".to_string())
            .spawn(move || {
                loop {
                    match rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => tick(),
                        Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Flush scheduler stopped");
            })?;

        debug!("Flush scheduler armed, period {:?}", period);

        Ok(FlushScheduler {
            period,
            control,
            join: Some(join),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Stops ticking, waiting for a tick in progress to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("Flush scheduler thread panicked");
            }
        }
    }
}

impl Debug for FlushScheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FlushScheduler({:?})", self.period)
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
