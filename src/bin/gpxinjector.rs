use anyhow::Context;
use clap::Parser;
use db44monitor::{
    args::{init_logging, InjectorArgs},
    correlate::fuse_files,
};

fn main() -> anyhow::Result<()> {
    let args = InjectorArgs::parse();
    init_logging(args.verbose.log_level_filter());

    fuse_files(&args.gpx, &args.measures, &args.output)
        .context("Unable to build GPX with DB44 data embedded")?;
    Ok(())
}
