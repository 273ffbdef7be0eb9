//! Service loops: each long-lived component runs as its own cooperative
//! tokio task, communicates only through the bus, refreshes a liveness
//! heartbeat on a 30-second cadence, and exits cleanly on the shared
//! shutdown signal.

pub mod account_monitor;
pub mod execution_engine;
pub mod risk_governor;
pub mod signal_engine;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Heartbeat cadence for long-lived subscriber loops.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Back-off before re-subscribing after a lost subscription.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Shared liveness marker, refreshed by its owning actor and read by the
/// health endpoint.
#[derive(Clone)]
pub struct Heartbeat {
    name: &'static str,
    last_beat: Arc<AtomicU64>,
}

impl Heartbeat {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            last_beat: Arc::new(AtomicU64::new(unix_now_secs())),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn beat(&self) {
        self.last_beat.store(unix_now_secs(), Ordering::Relaxed);
    }

    pub fn age(&self) -> Duration {
        let last = self.last_beat.load(Ordering::Relaxed);
        Duration::from_secs(unix_now_secs().saturating_sub(last))
    }

    pub fn is_healthy(&self, max_age: Duration) -> bool {
        self.age() <= max_age
    }
}
