//! Shared data model for readings and track points

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped measurement from the FM monitor
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// Tuned frequency in kHz
    pub frequency: f64,
    /// RF level in tenths of dBµV
    #[serde(rename = "rf_level")]
    pub level: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, frequency: f64, level: f64) -> Self {
        Self {
            timestamp,
            frequency,
            level,
        }
    }

    /// Human friendly "MHz - dBµV" string used to label track points
    pub fn label(&self) -> String {
        // These scale factors are part of the output format, don't touch them
        format!("{} - {}", self.frequency / 1000f64, self.level / 10f64)
    }
}

/// A single GPS fix from a recorded track
#[derive(Clone, Debug, PartialEq)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub timestamp: DateTime<Utc>,
    pub label: String,
}

impl TrackPoint {
    pub fn new(latitude: f64, longitude: f64, elevation: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
            timestamp,
            label: String::new(),
        }
    }
}

/// A track point labelled with its closest reading
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedTrackPoint {
    pub point: TrackPoint,
    /// Index of the matched reading in the sequence given to the correlator
    pub reading: usize,
}
