//! Synthetic request streams.
//!
//! Traffic is skewed: a configurable share of requests targets a small set of popular keys,
//! which is where concurrent callers collide on the same key. Every design replays the exact
//! same streams so their invocation counts are comparable.

use crate::models::SimulationConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// One request issued by a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub key: u64,
    /// The caller gives up after `SimulationConfig::patience`
    pub abandon: bool,
}

/// Pre-generated requests for every worker, plus the keys whose computation fails
#[derive(Debug, Clone)]
pub struct Workload {
    streams: Vec<Vec<Request>>,
    failing: Vec<bool>,
}

impl Workload {
    pub fn generate(config: &SimulationConfig) -> Self {
        let keys = config.keys.max(1);
        let mut rng = StdRng::seed_from_u64(config.seed);

        let failing = (0..keys)
            .map(|_| rng.gen_bool(config.failure_rate.clamp(0.0, 1.0)))
            .collect();

        let popular = ((keys as f64 * f64::from(config.popular_keys_percent) / 100.0) as u64)
            .clamp(1, keys);
        let popular_probability = f64::from(config.popular_traffic_percent.min(100)) / 100.0;
        let cancel_rate = config.cancel_rate.clamp(0.0, 1.0);

        let streams = (0..config.threads)
            .map(|_| {
                (0..config.requests_per_thread)
                    .map(|_| {
                        let key = if popular == keys || rng.gen_bool(popular_probability) {
                            rng.gen_range(0..popular)
                        } else {
                            rng.gen_range(popular..keys)
                        };
                        Request {
                            key,
                            abandon: rng.gen_bool(cancel_rate),
                        }
                    })
                    .collect()
            })
            .collect();

        Self { streams, failing }
    }

    pub fn streams(&self) -> &[Vec<Request>] {
        &self.streams
    }

    pub fn fails(&self, key: u64) -> bool {
        self.failing.get(key as usize).copied().unwrap_or(false)
    }

    pub fn key_count(&self) -> usize {
        self.failing.len()
    }

    pub fn total_requests(&self) -> u64 {
        self.streams.iter().map(|s| s.len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimulationConfig {
        SimulationConfig {
            threads: 4,
            keys: 100,
            requests_per_thread: 1_000,
            failure_rate: 0.1,
            cancel_rate: 0.2,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_seed_same_workload() {
        let a = Workload::generate(&config());
        let b = Workload::generate(&config());
        assert_eq!(a.streams(), b.streams());
        assert_eq!(a.total_requests(), 4_000);
        assert_eq!(a.key_count(), 100);
    }

    #[test]
    fn test_traffic_is_skewed_towards_popular_keys() {
        let workload = Workload::generate(&config());
        let popular_hits = workload
            .streams()
            .iter()
            .flatten()
            .filter(|r| r.key < 20)
            .count();
        // 80% of traffic to 20% of the keys
        assert!(popular_hits > 2_800, "popular hits: {popular_hits}");
        assert!(workload.streams().iter().flatten().all(|r| r.key < 100));
    }

    #[test]
    fn test_rates_are_respected() {
        let workload = Workload::generate(&config());
        let abandoned = workload
            .streams()
            .iter()
            .flatten()
            .filter(|r| r.abandon)
            .count();
        assert!((500..1_100).contains(&abandoned), "abandoned: {abandoned}");

        let failing = (0..100).filter(|k| workload.fails(*k)).count();
        assert!(failing < 40, "failing keys: {failing}");
        assert!(!workload.fails(10_000));
    }

    #[test]
    fn test_no_failures_or_cancellations_by_default_rates() {
        let workload = Workload::generate(&SimulationConfig {
            failure_rate: 0.0,
            cancel_rate: 0.0,
            ..config()
        });
        assert!(workload.streams().iter().flatten().all(|r| !r.abandon));
        assert!((0..100).all(|k| !workload.fails(k)));
    }
}
