// Public modules
pub mod bus;
pub mod config;
pub mod errors;
pub mod host;
pub mod nmea;
pub mod record;
pub mod registry;
pub mod sampler;
pub mod scheduler;
pub mod sensors;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{load_or_default, Config};
pub use errors::{CollectError, CollectResult};
pub use record::{LogRecord, HEADER, SENTINEL};
pub use storage::LogFile;

use chrono::{Local, NaiveDateTime};
use std::future::Future;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

use crate::bus::i2c::{I2CBus, I2cTransport};
use crate::registry::init_all;
use crate::sampler::sample_once;
use crate::scheduler::{watch_gps, WatchSummary};

/// Diagnostic line prefix, e.g. `2024-06-01-12:00:00`
pub const DIAGNOSTIC_TIME_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Initialize tracing: stderr, local timestamps, `RUST_LOG` support
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_timer(ChronoLocal::new(DIAGNOSTIC_TIME_FORMAT.to_string()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// What one run left behind
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub path: PathBuf,
    pub header_written: bool,
    pub record: LogRecord,
    pub gps: Option<WatchSummary>,
}

/// Open the configured bus and perform one collection run at the current time.
/// Ctrl-C ends the optional GPS watch.
pub async fn run(config: &Config) -> CollectResult<RunOutcome> {
    let bus = I2CBus::new(&config.bus.path).map_err(|source| CollectError::Bus {
        path: config.bus.path.clone(),
        source,
    })?;

    let shutdown = async {
        // If the handler cannot be installed, only max_polls ends the watch
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    run_with_bus(Box::new(bus), config, Local::now().naive_local(), shutdown).await
}

/// One collection run against an already opened bus.
///
/// The timestamp is taken once by the caller so the file name and the row
/// always agree on the date.
pub async fn run_with_bus<F>(
    bus: Box<dyn I2cTransport>,
    config: &Config,
    now: NaiveDateTime,
    shutdown: F,
) -> CollectResult<RunOutcome>
where
    F: Future<Output = ()>,
{
    let data_dir = config.log.resolved_data_dir()?;
    let hostname = config.log.hostname.clone().unwrap_or_else(host::hostname);

    let mut suite = init_all(bus, config).await?;
    info!("[main] sensors initialized");

    let record = sample_once(&mut suite, &hostname, &config.log.location, now).await;

    let mut log_file = LogFile::for_day(&data_dir, &hostname, now.date());
    if !config.log.create_dirs {
        log_file = log_file.without_dir_creation();
    }
    let outcome = log_file.append(&record)?;
    info!("[main] row written to {}", log_file.path().display());

    let gps = if config.gps.watch {
        Some(watch_gps(&mut suite.gps, suite.bus.as_mut(), &config.gps, shutdown).await)
    } else {
        None
    };

    Ok(RunOutcome {
        path: log_file.path().to_path_buf(),
        header_written: outcome.header_written,
        record,
        gps,
    })
}
