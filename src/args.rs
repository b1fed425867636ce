//! Argument parsing for running from the command line

use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

/// Poll a DB44 FM monitor over SNMP and record its readings to JSON
#[derive(Parser, Debug)]
#[clap(name = "db44monitor", author, version, about, long_about = None)]
pub struct MonitorArgs {
    /// IP address or hostname of the FM monitor, required unless only consolidating
    #[clap(short, long)]
    pub ip: Option<String>,
    /// SNMP port of the FM monitor
    #[clap(short, long, default_value_t = 161)]
    #[clap(value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
    /// Read SNMP community
    #[clap(short = 'r', long, default_value = "DEVA44")]
    pub community: String,
    /// JSON output path, chunks are written next to it as <output>.<n>
    #[clap(short, long, default_value = "db44monitor.json")]
    pub output: PathBuf,
    /// Time between two polls, in milliseconds
    #[clap(long, default_value_t = crate::POLL_INTERVAL.as_millis() as u64)]
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,
    /// Timeout of a single SNMP request, in milliseconds
    #[clap(long, default_value_t = crate::POLL_TIMEOUT.as_millis() as u64)]
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,
    /// Number of readings kept in memory before they're flushed to a chunk
    #[clap(long, default_value_t = crate::CHECKPOINT_EVERY)]
    #[clap(value_parser = valid_count)]
    pub checkpoint_every: usize,
    /// Capacity of the queue between the poller and the recorder
    #[clap(short, long, default_value_t = crate::QUEUE_CAPACITY)]
    #[clap(value_parser = valid_count)]
    pub capacity: usize,
    /// Extra attempts at a failed checkpoint before giving up
    #[clap(long, default_value_t = 2)]
    pub checkpoint_retries: usize,
    /// Merge chunks left behind by an interrupted run into the output and exit
    #[clap(long)]
    pub consolidate_only: bool,
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

/// Label the points of a GPX track with the closest DB44 reading
#[derive(Parser, Debug)]
#[clap(name = "gpxinjector", author, version, about, long_about = None)]
pub struct InjectorArgs {
    /// GPX input file
    #[clap(short, long)]
    pub gpx: PathBuf,
    /// Readings file written by db44monitor
    #[clap(short, long)]
    pub measures: PathBuf,
    /// GPX output file
    #[clap(short, long, default_value = "output.gpx")]
    pub output: PathBuf,
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

/// Match verbosity filter with tracing subscriber log levels
pub fn convert_filter(filter: log::LevelFilter) -> tracing_subscriber::filter::LevelFilter {
    match filter {
        log::LevelFilter::Off => tracing_subscriber::filter::LevelFilter::OFF,
        log::LevelFilter::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        log::LevelFilter::Warn => tracing_subscriber::filter::LevelFilter::WARN,
        log::LevelFilter::Info => tracing_subscriber::filter::LevelFilter::INFO,
        log::LevelFilter::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
        log::LevelFilter::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
    }
}

/// Install the global subscriber at the requested verbosity
pub fn init_logging(filter: log::LevelFilter) {
    tracing_subscriber::fmt()
        .with_max_level(convert_filter(filter))
        .init();
}

fn valid_count(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err("Invalid count".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_defaults() {
        let args = MonitorArgs::parse_from(["db44monitor", "--ip", "10.0.0.44"]);
        assert_eq!(args.ip.as_deref(), Some("10.0.0.44"));
        assert_eq!(args.port, 161);
        assert_eq!(args.community, "DEVA44");
        assert_eq!(args.checkpoint_every, 100);
        assert_eq!(args.interval_ms, 1000);
        assert_eq!(args.timeout_ms, 2000);
        assert_eq!(args.verbose.log_level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn test_verbose_logs_readings() {
        let args = MonitorArgs::parse_from(["db44monitor", "-i", "10.0.0.44", "-v"]);
        assert_eq!(args.verbose.log_level_filter(), log::LevelFilter::Debug);
    }

    #[test]
    fn test_consolidate_only_without_ip() {
        let args = MonitorArgs::try_parse_from(["db44monitor", "--consolidate-only"]).unwrap();
        assert!(args.consolidate_only);
        assert!(args.ip.is_none());
    }

    #[test]
    fn test_zero_checkpoint_rejected() {
        assert!(MonitorArgs::try_parse_from([
            "db44monitor",
            "--ip",
            "10.0.0.44",
            "--checkpoint-every",
            "0"
        ])
        .is_err());
    }

    #[test]
    fn test_injector_args() {
        let args = InjectorArgs::parse_from(["gpxinjector", "-g", "in.gpx", "-m", "m.json"]);
        assert_eq!(args.output, PathBuf::from("output.gpx"));
    }
}
