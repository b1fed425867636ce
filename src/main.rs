use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use db44monitor::{
    args::{init_logging, MonitorArgs},
    capture::Shutdown,
    db44::SnmpSource,
    recorder::{consolidate, run, Recorder, RecorderConfig},
};
use tracing::info;

fn main() -> anyhow::Result<()> {
    let args = MonitorArgs::parse();
    init_logging(args.verbose.log_level_filter());

    if args.consolidate_only {
        let n = consolidate(&args.output).context("Unable to consolidate outputs")?;
        info!(output = %args.output.display(), readings = n, "Done");
        return Ok(());
    }
    let ip = match args.ip.as_deref() {
        Some(ip) => ip,
        None => bail!("--ip is required unless --consolidate-only is given"),
    };

    info!(
        ip,
        port = args.port,
        community = %args.community,
        "Connecting to FM monitor"
    );
    let source = SnmpSource::connect(
        ip,
        args.port,
        &args.community,
        Duration::from_millis(args.timeout_ms),
    )
    .context("Unable to create DB44 monitor session")?;

    let mut recorder = Recorder::new(RecorderConfig {
        output: args.output.clone(),
        checkpoint_every: args.checkpoint_every,
    })
    .context("Unable to look for previous chunks")?;

    // Shutdown on Ctrl-C
    let shutdown = Shutdown::new();
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || ctrlc_shutdown.trigger())
        .context("Unable to install signal handler")?;

    let persisted = run(
        source,
        &mut recorder,
        Duration::from_millis(args.interval_ms),
        args.capacity,
        args.checkpoint_retries,
        &shutdown,
    );
    let n = persisted.context("Unable to persist readings, flushed chunks are kept on disk")?;
    info!(
        recorded = recorder.total(),
        consolidated = n,
        output = %args.output.display(),
        "Done"
    );
    Ok(())
}
