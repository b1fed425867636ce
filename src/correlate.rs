//! Nearest-in-time matching of track points against readings

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    error::FusionError,
    gpx,
    reading::{AnnotatedTrackPoint, Reading, TrackPoint},
    recorder::read_readings,
};

/// Index of the reading closest in time to `t`, `None` if there are no readings.
///
/// `readings` must be sorted by timestamp. Ties go to the later reading.
pub fn nearest(readings: &[Reading], t: DateTime<Utc>) -> Option<usize> {
    let len = readings.len();
    if len == 0 {
        return None;
    }
    // Lower bound: first reading at or after t
    let i = readings.partition_point(|r| r.timestamp < t);
    let idx = if i < len && readings[i].timestamp == t {
        i
    } else if i == 0 {
        0
    } else if i == len {
        len - 1
    } else {
        // readings[i - 1] < t < readings[i], so both gaps are positive
        let before = t - readings[i - 1].timestamp;
        let after = readings[i].timestamp - t;
        if before < after {
            i - 1
        } else {
            i
        }
    };
    Some(idx)
}

/// Label every track point with its closest reading.
///
/// Both slices must already be sorted by timestamp, this doesn't sort them.
pub fn correlate(
    points: &[TrackPoint],
    readings: &[Reading],
) -> Result<Vec<AnnotatedTrackPoint>, FusionError> {
    if readings.is_empty() {
        return Err(FusionError::EmptyInput);
    }
    Ok(points
        .iter()
        .map(|p| {
            // Can't be None, readings isn't empty
            let idx = nearest(readings, p.timestamp).unwrap_or(0);
            let mut point = p.clone();
            point.label = readings[idx].label();
            AnnotatedTrackPoint {
                point,
                reading: idx,
            }
        })
        .collect())
}

/// Load the readings file written by the recorder, as fusion input
pub fn load_readings(path: &Path) -> Result<Vec<Reading>, FusionError> {
    read_readings(path).map_err(|e| FusionError::malformed(path, e))
}

/// One offline pass: label the first segment of `track` with `measures` and write the
/// result to `output`. Both inputs are parsed before anything else happens, so a bad
/// input never leaves a partial output behind. Returns the number of points written.
pub fn fuse_files(track: &Path, measures: &Path, output: &Path) -> Result<usize, FusionError> {
    let mut points = gpx::read(track)?;
    let mut readings = load_readings(measures)?;
    info!(
        points = points.len(),
        readings = readings.len(),
        "Loaded track and readings"
    );

    // Stable, so equal timestamps keep their file order
    points.sort_by_key(|p| p.timestamp);
    readings.sort_by_key(|r| r.timestamp);

    let annotated = correlate(&points, &readings)?;
    gpx::write(output, &annotated)?;
    info!(output = %output.display(), points = annotated.len(), "Wrote labelled track");
    Ok(annotated.len())
}
