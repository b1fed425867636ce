//! Acquisition and offline geo-tagging of DB44 FM monitor readings.
//!
//! The acquisition side polls the instrument on a fixed tick and checkpoints
//! readings to disk in chunks ([`recorder`]). The fusion side matches every
//! point of a GPX track with the closest reading in time ([`correlate`]).

use std::time::Duration;

pub mod args;
pub mod capture;
pub mod correlate;
pub mod db44;
pub mod error;
pub mod gpx;
pub mod reading;
pub mod recorder;

pub use error::{AcquisitionError, FusionError, PersistenceError};
pub use reading::{AnnotatedTrackPoint, Reading, TrackPoint};

/// How many readings are buffered before a chunk is written
pub const CHECKPOINT_EVERY: usize = 100;
/// Time between two polls of the instrument
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on a single request to the instrument
pub const POLL_TIMEOUT: Duration = Duration::from_secs(2);
/// Capacity of the queue between the poller and the recorder
pub const QUEUE_CAPACITY: usize = 256;
