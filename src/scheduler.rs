use std::future::Future;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::bus::i2c::I2cTransport;
use crate::config::GpsSettings;
use crate::sensors::titan_gps::TitanGps;
use crate::sensors::SensorDriver;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub polls: u64,
    /// Polls that produced a GGA sentence with a position
    pub fixes: u64,
    pub errors: u64,
}

/// Poll the GPS at the configured rate and log every fix.
///
/// Stops after `max_polls` polls, or as soon as `shutdown` resolves.
pub async fn watch_gps<F>(
    gps: &mut TitanGps,
    bus: &mut dyn I2cTransport,
    settings: &GpsSettings,
    shutdown: F,
) -> WatchSummary
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let period = Duration::from_millis(settings.poll_interval_ms);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut summary = WatchSummary::default();

    match settings.max_polls {
        Some(max) => info!("[gps] watching every {:?} for {} polls", period, max),
        None => info!("[gps] watching every {:?} until interrupted", period),
    }

    loop {
        if settings.max_polls.is_some_and(|max| summary.polls >= max) {
            break;
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("[gps] watch cancelled");
                break;
            }
            _ = ticker.tick() => {}
        }

        summary.polls += 1;
        match gps.read(bus).await {
            Ok(Some(fix)) if fix.has_position() => {
                summary.fixes += 1;
                info!("[gps] {}", fix);
            }
            Ok(Some(fix)) => debug!("[gps] receiver has no position yet (quality {})", fix.quality),
            Ok(None) => debug!("[gps] no new data"),
            Err(e) => {
                summary.errors += 1;
                warn!("[gps] poll failed: {}", e);
            }
        }
    }

    info!(
        "[gps] watch finished: {} polls, {} fixes, {} errors",
        summary.polls, summary.fixes, summary.errors
    );
    summary
}
