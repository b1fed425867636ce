use chrono::{Duration, TimeZone, Utc};
use db44monitor::recorder::{discover_chunks, read_readings, Recorder, RecorderConfig};
use db44monitor::{PersistenceError, Reading};
use tempfile::TempDir;

fn readings(n: i64) -> Vec<Reading> {
    let start = Utc.with_ymd_and_hms(2017, 3, 4, 10, 0, 0).unwrap();
    (0..n)
        .map(|i| Reading::new(start + Duration::seconds(i), 88000.0 + i as f64, 450.0))
        .collect()
}

#[test]
fn test_chunking_and_consolidation() -> Result<(), PersistenceError> {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("db44monitor.json");
    let mut recorder = Recorder::new(RecorderConfig::new(&output))?;

    let input = readings(250);
    let mut automatic = Vec::new();
    for r in &input {
        if let Some(chunk) = recorder.record(*r)? {
            automatic.push((recorder.total(), chunk));
        }
    }
    // Checkpoints at 100 and 200
    assert_eq!(
        automatic.iter().map(|(n, _)| *n).collect::<Vec<_>>(),
        vec![100, 200]
    );
    assert_eq!(recorder.buffered(), 50);

    // Shutdown flushes the rest
    let last = recorder.checkpoint()?.expect("remainder should be flushed");
    assert_eq!(read_readings(&last)?.len(), 50);
    assert_eq!(recorder.checkpoints(), 3);
    assert_eq!(discover_chunks(&output)?.len(), 3);

    assert_eq!(recorder.consolidate()?, 250);
    assert_eq!(read_readings(&output)?, input);
    assert!(discover_chunks(&output)?.is_empty());
    Ok(())
}

#[test]
fn test_exact_multiple_leaves_nothing_to_flush() -> Result<(), PersistenceError> {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("db44monitor.json");
    let mut recorder = Recorder::new(RecorderConfig::new(&output))?;
    for r in readings(300) {
        recorder.record(r)?;
    }
    assert_eq!(recorder.checkpoints(), 3);
    assert_eq!(recorder.checkpoint()?, None);
    assert_eq!(recorder.checkpoints(), 3);
    Ok(())
}

#[test]
fn test_interrupted_run_is_recovered() -> Result<(), PersistenceError> {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("db44monitor.json");
    let all = readings(230);

    // First run dies after one checkpoint, the 30 buffered readings are lost
    {
        let mut recorder = Recorder::new(RecorderConfig::new(&output))?;
        for r in &all[..130] {
            recorder.record(*r)?;
        }
    }
    assert_eq!(discover_chunks(&output)?.len(), 1);

    // Second run picks up the leftovers at shutdown
    let mut recorder = Recorder::new(RecorderConfig::new(&output))?;
    for r in &all[130..] {
        recorder.record(*r)?;
    }
    recorder.checkpoint()?;
    assert_eq!(recorder.consolidate()?, 200);

    let merged = read_readings(&output)?;
    assert_eq!(&merged[..100], &all[..100]);
    assert_eq!(&merged[100..], &all[130..]);
    Ok(())
}
