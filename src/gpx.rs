//! Just enough GPX to read a recorded track and write the labelled one back out.
//!
//! Only the first segment of the first track is used; the output is always a single
//! track with a single segment.

use std::{fs, io::Write, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::{
    error::FusionError,
    reading::{AnnotatedTrackPoint, TrackPoint},
};

const GPX_VERSION: &str = "1.1";
const GPX_NAMESPACE: &str = "http://www.topografix.com/GPX/1/1";
const CREATOR: &str = "gpxinjector";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "gpx")]
struct Gpx {
    #[serde(rename = "@version", default)]
    version: String,
    #[serde(rename = "@creator", default)]
    creator: String,
    // Namespace declarations aren't attributes when reading
    #[serde(rename = "@xmlns", default, skip_deserializing)]
    xmlns: String,
    #[serde(rename = "trk", default)]
    tracks: Vec<Track>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Track {
    #[serde(rename = "trkseg", default)]
    segments: Vec<Segment>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Segment {
    #[serde(rename = "trkpt", default)]
    points: Vec<Point>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Point {
    #[serde(rename = "@lat")]
    lat: f64,
    #[serde(rename = "@lon")]
    lon: f64,
    #[serde(default)]
    ele: f64,
    #[serde(default)]
    name: String,
    time: DateTime<Utc>,
}

impl From<Point> for TrackPoint {
    fn from(p: Point) -> Self {
        TrackPoint {
            latitude: p.lat,
            longitude: p.lon,
            elevation: p.ele,
            timestamp: p.time,
            label: p.name,
        }
    }
}

impl From<&TrackPoint> for Point {
    fn from(p: &TrackPoint) -> Self {
        Point {
            lat: p.latitude,
            lon: p.longitude,
            ele: p.elevation,
            name: p.label.clone(),
            time: p.timestamp,
        }
    }
}

/// Parse a GPX document and return the points of its first track segment.
/// `origin` is only used for error messages.
pub fn from_str(origin: &Path, data: &str) -> Result<Vec<TrackPoint>, FusionError> {
    let gpx: Gpx = serde_xml_rs::from_str(data).map_err(|e| FusionError::malformed(origin, e))?;
    let segment = gpx
        .tracks
        .into_iter()
        .next()
        .and_then(|trk| trk.segments.into_iter().next())
        .ok_or_else(|| FusionError::malformed(origin, "no track segment"))?;
    Ok(segment.points.into_iter().map(TrackPoint::from).collect())
}

/// Read the first track segment of the GPX file at `path`
pub fn read(path: &Path) -> Result<Vec<TrackPoint>, FusionError> {
    let data = fs::read_to_string(path).map_err(|e| FusionError::malformed(path, e))?;
    from_str(path, &data)
}

/// Render labelled points as a single-track, single-segment GPX document
pub fn to_string(points: &[AnnotatedTrackPoint]) -> Result<String, serde_xml_rs::Error> {
    let gpx = Gpx {
        version: GPX_VERSION.to_owned(),
        creator: CREATOR.to_owned(),
        xmlns: GPX_NAMESPACE.to_owned(),
        tracks: vec![Track {
            segments: vec![Segment {
                points: points.iter().map(|a| Point::from(&a.point)).collect(),
            }],
        }],
    };
    serde_xml_rs::to_string(&gpx)
}

/// Write labelled points to `path`, replacing it only once the whole document is on disk
pub fn write(path: &Path, points: &[AnnotatedTrackPoint]) -> Result<(), FusionError> {
    let output_err = |source| FusionError::Output {
        path: path.to_owned(),
        source,
    };
    let doc = to_string(points)
        .map_err(|e| output_err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(output_err)?;
    tmp.write_all(doc.as_bytes()).map_err(output_err)?;
    tmp.persist(path).map_err(|e| output_err(e.error))?;
    Ok(())
}
