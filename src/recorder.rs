//! This module is responsible for getting readings safely onto disk.
//!
//! Readings are buffered in memory and every `checkpoint_every` of them are written
//! to a numbered chunk file sitting next to the output (`<output>.<n>`). On shutdown
//! the remainder is flushed and every chunk is folded into the output file, so an
//! interrupted run only ever loses what was still buffered.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

use crate::{
    capture::{poll_readings, ReadingSource, Shutdown},
    error::PersistenceError,
    reading::Reading,
    CHECKPOINT_EVERY,
};

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Canonical location of the consolidated readings
    pub output: PathBuf,
    /// Number of readings between two automatic checkpoints
    pub checkpoint_every: usize,
}

impl RecorderConfig {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            checkpoint_every: CHECKPOINT_EVERY,
        }
    }
}

/// Owns the in-memory buffer of not-yet-flushed readings
#[derive(Debug)]
pub struct Recorder {
    output: PathBuf,
    checkpoint_every: usize,
    buffer: Vec<Reading>,
    total: usize,
    checkpoints: usize,
    next_chunk: u64,
}

impl Recorder {
    /// Chunk numbering resumes after whatever a previous, interrupted run left behind
    pub fn new(config: RecorderConfig) -> Result<Self, PersistenceError> {
        let next_chunk = discover_chunks(&config.output)?
            .last()
            .map_or(1, |(idx, _)| idx + 1);
        let checkpoint_every = config.checkpoint_every.max(1);
        Ok(Self {
            output: config.output,
            checkpoint_every,
            buffer: Vec::with_capacity(checkpoint_every),
            total: 0,
            checkpoints: 0,
            next_chunk,
        })
    }

    /// Buffer a reading, checkpointing when the running total hits the threshold.
    /// Returns the chunk written, if any.
    pub fn record(&mut self, reading: Reading) -> Result<Option<PathBuf>, PersistenceError> {
        self.buffer.push(reading);
        self.total += 1;
        if self.total % self.checkpoint_every == 0 {
            self.checkpoint()
        } else {
            Ok(None)
        }
    }

    /// Write the buffer to a fresh chunk and clear it. On error the buffer is left as is.
    pub fn checkpoint(&mut self) -> Result<Option<PathBuf>, PersistenceError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let path = chunk_path(&self.output, self.next_chunk);
        write_readings(&path, &self.buffer)?;
        info!(chunk = %path.display(), readings = self.buffer.len(), "Flushed readings");
        self.buffer.clear();
        self.next_chunk += 1;
        self.checkpoints += 1;
        Ok(Some(path))
    }

    /// Fold every chunk into the output file, see [`consolidate`]
    pub fn consolidate(&self) -> Result<usize, PersistenceError> {
        consolidate(&self.output)
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Readings recorded so far in this run
    pub fn total(&self) -> usize {
        self.total
    }

    /// Chunks written so far in this run
    pub fn checkpoints(&self) -> usize {
        self.checkpoints
    }

    /// Readings waiting in memory
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Checkpoint, trying again up to `retries` more times before giving up
pub fn checkpoint_with_retry(
    recorder: &mut Recorder,
    retries: usize,
) -> Result<Option<PathBuf>, PersistenceError> {
    let mut attempt = 0;
    loop {
        match recorder.checkpoint() {
            Ok(chunk) => return Ok(chunk),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(error = %e, attempt, "Checkpoint failed, retrying");
                thread::sleep(RETRY_BACKOFF);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Record everything coming out of the poller until it hangs up.
/// A failed automatic checkpoint gets `retries` more attempts before the error is returned.
pub fn drain(
    receiver: &Receiver<Reading>,
    recorder: &mut Recorder,
    retries: usize,
) -> Result<(), PersistenceError> {
    for reading in receiver.iter() {
        debug!(
            frequency = reading.frequency,
            rf_level = reading.level,
            "Got reading"
        );
        if let Err(e) = recorder.record(reading) {
            warn!(error = %e, "Checkpoint failed");
            checkpoint_with_retry(recorder, retries)?;
        }
    }
    Ok(())
}

/// One acquisition run, from the first poll to the closed connection.
///
/// Polls `source` on its own thread and records until `shutdown` fires. Then the
/// remaining buffer is flushed, every chunk is consolidated and only after that is the
/// source closed. The source is closed on the error path too. Returns the number of
/// readings in the consolidated file.
pub fn run<S>(
    source: S,
    recorder: &mut Recorder,
    interval: Duration,
    capacity: usize,
    retries: usize,
    shutdown: &Shutdown,
) -> Result<usize, PersistenceError>
where
    S: ReadingSource + Send + 'static,
{
    // Start producing readings on a thread
    let (sender, receiver) = bounded(capacity);
    let stop = shutdown.receiver();
    let poller = thread::spawn(move || poll_readings(source, interval, stop, sender));

    // Record until the poller hangs up
    let drained = drain(&receiver, recorder, retries);
    // No more readings past this point, whatever happened
    shutdown.trigger();
    drop(receiver);

    let persisted = drained
        .and_then(|_| checkpoint_with_retry(recorder, retries))
        .and_then(|_| recorder.consolidate());

    match poller.join() {
        Ok(source) => source.close(),
        Err(_) => error!("Poller thread panicked"),
    }
    persisted
}

/// Merge every chunk belonging to `output` into it, after whatever it already holds,
/// then remove the chunks. Chunks are read in index order and never re-sorted by time.
/// With no chunks on disk this does nothing at all. Returns the number of readings in
/// the consolidated file.
///
/// If a chunk can't be removed afterwards its readings are in the output *and* still on
/// disk, so the next consolidation would add them twice. That case is reported as
/// [`PersistenceError::Leftover`] and the listed files must be removed by hand.
pub fn consolidate(output: &Path) -> Result<usize, PersistenceError> {
    let chunks = discover_chunks(output)?;
    if chunks.is_empty() {
        info!(output = %output.display(), "No chunks to consolidate");
        return Ok(0);
    }
    info!(output = %output.display(), chunks = chunks.len(), "Consolidating outputs");

    let mut readings = if output.is_file() {
        read_readings(output)?
    } else {
        Vec::new()
    };
    for (_, chunk) in &chunks {
        readings.extend(read_readings(chunk)?);
    }
    write_readings(output, &readings)?;

    // Only now that the output is durable can the chunks go
    remove_chunks(chunks)?;
    Ok(readings.len())
}

/// Remove every chunk, even after a failure, and report the ones still on disk
fn remove_chunks(chunks: Vec<(u64, PathBuf)>) -> Result<(), PersistenceError> {
    let mut leftover = Vec::new();
    for (_, chunk) in chunks {
        if let Err(e) = fs::remove_file(&chunk) {
            error!(chunk = %chunk.display(), error = %e, "Unable to delete consolidated chunk");
            leftover.push(chunk);
        }
    }
    if leftover.is_empty() {
        Ok(())
    } else {
        Err(PersistenceError::Leftover { paths: leftover })
    }
}

/// Path of chunk `idx` for a given output
pub fn chunk_path(output: &Path, idx: u64) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(format!(".{idx}"));
    PathBuf::from(path)
}

/// All `<output>.<digits>` files next to `output`, ordered by index
pub fn discover_chunks(output: &Path) -> Result<Vec<(u64, PathBuf)>, PersistenceError> {
    let base = output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            PersistenceError::io(
                output,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
            )
        })?;
    let dir = parent_dir(output);
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        // Nothing was ever written there
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PersistenceError::io(dir, e)),
    };

    let mut chunks = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PersistenceError::io(dir, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| PersistenceError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name();
        let idx = name
            .to_str()
            .and_then(|name| name.strip_prefix(base))
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u64>().ok());
        if let Some(idx) = idx {
            chunks.push((idx, entry.path()));
        }
    }
    chunks.sort_by_key(|(idx, _)| *idx);
    Ok(chunks)
}

/// Parse a JSON array of readings. An empty file holds no readings.
pub fn read_readings(path: &Path) -> Result<Vec<Reading>, PersistenceError> {
    let data = fs::read(path).map_err(|e| PersistenceError::io(path, e))?;
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&data).map_err(|source| PersistenceError::Parse {
        path: path.to_owned(),
        source,
    })
}

/// Atomically replace `path` with the JSON encoding of `readings`
pub fn write_readings(path: &Path, readings: &[Reading]) -> Result<(), PersistenceError> {
    let data = serde_json::to_vec(readings)?;
    let dir = parent_dir(path);
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| PersistenceError::io(dir, e))?;
    tmp.write_all(&data)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| PersistenceError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| PersistenceError::io(path, e.error))?;
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}
