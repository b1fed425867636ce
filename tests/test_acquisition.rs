use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use chrono::Utc;
use db44monitor::capture::{ReadingSource, Shutdown};
use db44monitor::recorder::{discover_chunks, read_readings, run, Recorder, RecorderConfig};
use db44monitor::{AcquisitionError, PersistenceError, Reading};
use tempfile::TempDir;

const STOP_AFTER: usize = 150;

/// What the output looked like when the source was closed
#[derive(Debug, PartialEq)]
struct AtClose {
    readings: usize,
    chunks: usize,
}

/// Counts its polls and pulls the plug itself after `STOP_AFTER` of them
struct Scripted {
    polls: Arc<AtomicUsize>,
    closed: Arc<Mutex<Option<AtClose>>>,
    shutdown: Shutdown,
    output: std::path::PathBuf,
}

impl ReadingSource for Scripted {
    fn poll(&mut self) -> Result<Reading, AcquisitionError> {
        let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == STOP_AFTER {
            self.shutdown.trigger();
        }
        Ok(Reading::new(Utc::now(), 88000.0, n as f64))
    }

    fn close(self) {
        let readings = read_readings(&self.output).map_or(0, |r| r.len());
        let chunks = discover_chunks(&self.output).map_or(usize::MAX, |c| c.len());
        *self.closed.lock().unwrap() = Some(AtClose { readings, chunks });
    }
}

#[test]
fn test_shutdown_persists_everything_before_close() -> Result<(), PersistenceError> {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("db44monitor.json");
    let mut recorder = Recorder::new(RecorderConfig {
        output: output.clone(),
        checkpoint_every: 100,
    })?;

    let shutdown = Shutdown::new();
    let polls = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(Mutex::new(None));
    let source = Scripted {
        polls: polls.clone(),
        closed: closed.clone(),
        shutdown: shutdown.clone(),
        output: output.clone(),
    };

    let consolidated = run(
        source,
        &mut recorder,
        Duration::from_millis(1),
        16,
        0,
        &shutdown,
    )?;

    // A poll or two may still land after the trigger, none may go missing
    let polled = polls.load(Ordering::SeqCst);
    assert!(polled >= STOP_AFTER);
    assert_eq!(consolidated, polled);
    assert_eq!(recorder.total(), polled);
    assert_eq!(recorder.buffered(), 0);

    let persisted = read_readings(&output)?;
    let levels: Vec<f64> = persisted.iter().map(|r| r.level).collect();
    let expected: Vec<f64> = (1..=polled).map(|n| n as f64).collect();
    assert_eq!(levels, expected);
    assert!(discover_chunks(&output)?.is_empty());

    // Closed exactly once, after consolidation was complete
    assert_eq!(
        closed.lock().unwrap().take(),
        Some(AtClose {
            readings: polled,
            chunks: 0
        })
    );
    Ok(())
}
