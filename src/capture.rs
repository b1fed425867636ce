//! This module contains all the capture logic

// The poller thread does one thing: every tick, ask the instrument for a reading
// and hand it over to the recorder through a bounded channel. It is the only
// producer and the recorder is the only consumer, so nothing here needs a lock.

use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::{error::AcquisitionError, reading::Reading};

/// Anything that can be asked for one reading at a time
pub trait ReadingSource {
    /// Try to get a single reading. Errors are transient.
    fn poll(&mut self) -> Result<Reading, AcquisitionError>;

    /// Release the connection to the instrument
    fn close(self)
    where
        Self: Sized,
    {
    }
}

/// Stop signal shared by a signal handler, the poller and the recorder
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Ask the poller to stop. Calling it more than once is harmless.
    pub fn trigger(&self) {
        let _ = self.tx.try_send(());
    }

    pub fn receiver(&self) -> Receiver<()> {
        self.rx.clone()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll `source` every `interval` until `shutdown` fires (or all its senders are gone),
/// or the consumer hangs up. Failed polls are logged and skipped. Sending blocks when
/// the queue is full, so a slow recorder slows down polling instead of growing memory.
///
/// The source is handed back so it can be closed once the recorder is done with it.
pub fn poll_readings<S: ReadingSource>(
    mut source: S,
    interval: Duration,
    shutdown: Receiver<()>,
    sender: Sender<Reading>,
) -> S {
    let ticker = tick(interval);
    let mut failures = 0usize;
    loop {
        select! {
            recv(shutdown) -> _ => {
                info!("Stopping acquisition");
                break;
            }
            recv(ticker) -> _ => {
                let reading = match source.poll() {
                    Ok(r) => r,
                    Err(e) => {
                        // Keep truckin, next tick will probably work
                        failures += 1;
                        warn!(error = %e, failures, "Poll failed");
                        continue;
                    }
                };
                if sender.send(reading).is_err() {
                    warn!("Recorder hung up, stopping acquisition");
                    break;
                }
            }
        }
    }
    debug!(failures, "Poller finished");
    source
}
