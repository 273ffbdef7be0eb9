//! Latency simulator: a uniform random cooperative pause standing in for
//! network and processing delay on simulated fills. The suspension is
//! load-bearing — it is what keeps one busy strategy from monopolising
//! the execution loop.

use std::time::Duration;

use rand::Rng;

pub struct LatencySimulator {
    min_ms: u64,
    max_ms: u64,
}

impl LatencySimulator {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        let max_ms = max_ms.max(min_ms);
        Self { min_ms, max_ms }
    }

    pub async fn delay(&self) {
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

impl Default for LatencySimulator {
    fn default() -> Self {
        Self::new(50, 200)
    }
}
