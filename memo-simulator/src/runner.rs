//! Simulation runner for memoization designs
//!
//! Every design replays the same pre-generated [`Workload`] on the same number of worker
//! threads. The compute function is shared: it sleeps for the configured latency, fails for
//! the workload's failing keys, and counts how many times it ran for each key. Duplicate
//! invocations are the observable cost of a design that does not coalesce concurrent callers.
//!
//! ## Abandoned requests
//!
//! A request flagged `abandon` stops waiting after `SimulationConfig::patience`. The memoizer
//! honours this through `compute_timeout`; the other designs have no way to give up, so the
//! caller blocks until the value arrives and the request counts as abandoned when it took
//! longer than the caller's patience.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use ahash::RandomState as AHashRandomState;
use lru::LruCache;
use memo_rs::{Error, MemoConfig, Memoizer};
use moka::sync::Cache as MokaCache;
use rand::Rng;
use tracing::{debug, info};

use crate::models::{Design, DesignStats, LatencyPercentiles, OpLatencyStats, SimulationConfig};
use crate::workload::{Request, Workload};

/// Maximum latency samples kept per worker for percentile calculation
const MAX_SAMPLES: usize = 5000;

/// What the caller observed for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reply {
    Value,
    Failed,
    Abandoned,
}

/// Tracks latency for the request path
#[derive(Debug)]
struct OpLatencyTracker {
    /// Total time spent (nanoseconds)
    total_ns: u64,
    /// Number of operations
    count: u64,
    /// Minimum latency (nanoseconds)
    min_ns: u64,
    /// Maximum latency (nanoseconds)
    max_ns: u64,
    /// Sample reservoir for percentile calculation
    samples: Vec<u64>,
}

impl OpLatencyTracker {
    fn new() -> Self {
        Self {
            total_ns: 0,
            count: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            samples: Vec::with_capacity(MAX_SAMPLES),
        }
    }

    #[inline]
    fn record(&mut self, latency_ns: u64) {
        self.total_ns += latency_ns;
        self.count += 1;
        self.min_ns = self.min_ns.min(latency_ns);
        self.max_ns = self.max_ns.max(latency_ns);

        // Reservoir sampling for percentiles
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(latency_ns);
        } else {
            let slot = rand::thread_rng().gen_range(0..self.count) as usize;
            if slot < MAX_SAMPLES {
                self.samples[slot] = latency_ns;
            }
        }
    }

    /// Folds another worker's tracker into this one
    fn merge(&mut self, other: OpLatencyTracker) {
        self.total_ns += other.total_ns;
        self.count += other.count;
        self.min_ns = self.min_ns.min(other.min_ns);
        self.max_ns = self.max_ns.max(other.max_ns);
        self.samples.extend(other.samples);
    }

    fn percentiles(&mut self) -> LatencyPercentiles {
        if self.samples.is_empty() {
            return LatencyPercentiles::default();
        }

        self.samples.sort_unstable();
        let len = self.samples.len();

        LatencyPercentiles {
            p50_ns: self.samples[len * 50 / 100],
            p90_ns: self.samples[len * 90 / 100],
            p99_ns: self.samples[len * 99 / 100],
            p999_ns: self.samples[len.saturating_sub(1).min(len * 999 / 1000)],
        }
    }

    fn finalize_op_stats(&mut self) -> OpLatencyStats {
        OpLatencyStats {
            total_ns: self.total_ns,
            count: self.count,
            min_ns: if self.min_ns == u64::MAX {
                0
            } else {
                self.min_ns
            },
            max_ns: self.max_ns,
            percentiles: self.percentiles(),
        }
    }
}

/// Per-worker outcome counters
#[derive(Debug)]
struct Tally {
    latency: OpLatencyTracker,
    failures: u64,
    cancellations: u64,
}

impl Tally {
    fn new() -> Self {
        Self {
            latency: OpLatencyTracker::new(),
            failures: 0,
            cancellations: 0,
        }
    }

    fn record(&mut self, reply: Reply, elapsed: Duration) {
        self.latency.record(elapsed.as_nanos() as u64);
        match reply {
            Reply::Value => {}
            Reply::Failed => self.failures += 1,
            Reply::Abandoned => self.cancellations += 1,
        }
    }

    fn merge(&mut self, other: Tally) {
        self.latency.merge(other.latency);
        self.failures += other.failures;
        self.cancellations += other.cancellations;
    }
}

/// The expensive function every design memoizes
struct Backend<'a> {
    workload: &'a Workload,
    latency: Duration,
    invocations: Vec<AtomicU64>,
}

impl<'a> Backend<'a> {
    fn new(workload: &'a Workload, latency: Duration) -> Self {
        Self {
            workload,
            latency,
            invocations: (0..workload.key_count())
                .map(|_| AtomicU64::new(0))
                .collect(),
        }
    }

    fn compute(&self, key: &u64) -> Result<u64, String> {
        if let Some(counter) = self.invocations.get(*key as usize) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        if self.workload.fails(*key) {
            Err(format!("computation for key {key} failed"))
        } else {
            Ok(key.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        }
    }

    /// Returns (total invocations, invocations beyond the first per key)
    fn invocation_counts(&self) -> (u64, u64) {
        self.invocations
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .fold((0, 0), |(total, dup), n| {
                (total + n, dup + n.saturating_sub(1))
            })
    }
}

/// Result of a full simulation run
#[derive(Debug)]
pub struct SimulationResult {
    /// Statistics per design
    pub stats: BTreeMap<Design, DesignStats>,
    /// Requests replayed against each design
    pub total_requests: u64,
    /// Total time for all designs
    pub duration: Duration,
}

/// Runner that replays a workload against each configured design
pub struct SimulationRunner {
    config: SimulationConfig,
}

impl SimulationRunner {
    /// Create a new simulation runner
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Run every configured design against the same workload
    pub fn run(&self) -> Result<SimulationResult, String> {
        let config = &self.config;
        if config.threads == 0 {
            return Err("at least one worker thread is required".to_string());
        }
        if config.keys == 0 {
            return Err("at least one key is required".to_string());
        }
        if config.segments == 0 {
            return Err("segment count must be > 0".to_string());
        }
        if config.capacity == Some(0) {
            return Err("capacity must be > 0".to_string());
        }

        let start_time = Instant::now();
        let workload = Workload::generate(config);
        debug!(
            threads = config.threads,
            keys = config.keys,
            requests = workload.total_requests(),
            "workload generated"
        );

        let mut stats = BTreeMap::new();
        for design in &config.designs {
            info!(design = %design, "running design");
            let design_stats = self.run_design(*design, &workload);
            debug!(
                design = %design,
                invocations = design_stats.invocations,
                duplicates = design_stats.duplicate_invocations,
                wall_ms = design_stats.wall_time.as_millis() as u64,
                "design finished"
            );
            stats.insert(*design, design_stats);
        }

        Ok(SimulationResult {
            stats,
            total_requests: workload.total_requests(),
            duration: start_time.elapsed(),
        })
    }

    fn run_design(&self, design: Design, workload: &Workload) -> DesignStats {
        let config = &self.config;
        let backend = Backend::new(workload, config.latency);
        let patience = config.patience();
        let capacity = config.capacity.and_then(NonZeroUsize::new);

        let (wall_time, mut tally) = match design {
            Design::Memo => {
                let mut memo_config = MemoConfig::new().with_segments(config.segments);
                if let Some(capacity) = capacity {
                    memo_config = memo_config.with_max_entries(capacity);
                }
                let memo = Memoizer::with_config(
                    |key: &u64| -> Result<u64, String> { backend.compute(key) },
                    memo_config,
                );
                drive(workload, |request| {
                    let result = if request.abandon {
                        memo.compute_timeout(&request.key, patience)
                    } else {
                        memo.compute(&request.key)
                    };
                    match result {
                        Ok(_) => Reply::Value,
                        Err(Error::TimedOut | Error::Interrupted) => Reply::Abandoned,
                        Err(Error::Computation(_) | Error::CacheUnavailable(_)) => Reply::Failed,
                    }
                })
            }
            Design::GlobalLock => {
                let cache = Mutex::new(match capacity {
                    Some(capacity) => LruCache::new(capacity),
                    None => LruCache::unbounded(),
                });
                drive(workload, |request| {
                    let started = Instant::now();
                    let result = {
                        let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
                        if let Some(result) = cache.get(&request.key).cloned() {
                            result
                        } else {
                            let result = backend.compute(&request.key);
                            cache.put(request.key, result.clone());
                            result
                        }
                    };
                    blocking_reply(request, result.is_ok(), started, patience)
                })
            }
            Design::RacyMap => {
                let cache: MokaCache<u64, Result<u64, String>, AHashRandomState> =
                    moka_builder(capacity).build_with_hasher(AHashRandomState::default());
                drive(workload, |request| {
                    let started = Instant::now();
                    let result = match cache.get(&request.key) {
                        Some(result) => result,
                        None => {
                            let result = backend.compute(&request.key);
                            cache.insert(request.key, result.clone());
                            result
                        }
                    };
                    blocking_reply(request, result.is_ok(), started, patience)
                })
            }
            Design::Moka => {
                let cache: MokaCache<u64, u64, AHashRandomState> =
                    moka_builder(capacity).build_with_hasher(AHashRandomState::default());
                drive(workload, |request| {
                    let started = Instant::now();
                    let result = cache.try_get_with(request.key, || backend.compute(&request.key));
                    blocking_reply(request, result.is_ok(), started, patience)
                })
            }
        };

        let (invocations, duplicate_invocations) = backend.invocation_counts();
        DesignStats {
            requests: tally.latency.count,
            invocations,
            duplicate_invocations,
            failures: tally.failures,
            cancellations: tally.cancellations,
            wall_time,
            latency: tally.latency.finalize_op_stats(),
        }
    }
}

fn moka_builder<V>(
    capacity: Option<NonZeroUsize>,
) -> moka::sync::CacheBuilder<u64, V, MokaCache<u64, V>>
where
    V: Clone + Send + Sync + 'static,
{
    let builder = MokaCache::builder();
    match capacity {
        Some(capacity) => builder
            .max_capacity(capacity.get() as u64)
            .initial_capacity(capacity.get()),
        None => builder,
    }
}

/// Reply for designs that cannot stop waiting early
fn blocking_reply(request: &Request, ok: bool, started: Instant, patience: Duration) -> Reply {
    if request.abandon && started.elapsed() > patience {
        Reply::Abandoned
    } else if ok {
        Reply::Value
    } else {
        Reply::Failed
    }
}

/// Replays every worker's stream on its own thread and merges the tallies
fn drive<H>(workload: &Workload, handler: H) -> (Duration, Tally)
where
    H: Fn(&Request) -> Reply + Sync,
{
    let start = Instant::now();
    let tallies: Vec<Tally> = thread::scope(|scope| {
        let handles: Vec<_> = workload
            .streams()
            .iter()
            .map(|stream| {
                let handler = &handler;
                scope.spawn(move || {
                    let mut tally = Tally::new();
                    for request in stream {
                        let issued = Instant::now();
                        let reply = handler(request);
                        tally.record(reply, issued.elapsed());
                    }
                    tally
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });
    let wall_time = start.elapsed();

    let mut total = Tally::new();
    for tally in tallies {
        total.merge(tally);
    }
    (wall_time, total)
}
