// Reporting for simulation results

use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{CsvResultRow, Design, DesignStats, SimulationConfig};
use crate::runner::SimulationResult;

/// Collected statistics for every simulated design
#[derive(Debug)]
pub struct SimulationStats {
    stats: BTreeMap<Design, DesignStats>,
    total_requests: u64,
    threads: usize,
    keys: u64,
}

impl SimulationStats {
    /// Create SimulationStats from a SimulationResult
    pub fn from_result(result: &SimulationResult, config: &SimulationConfig) -> Self {
        Self {
            stats: result.stats.clone(),
            total_requests: result.total_requests,
            threads: config.threads,
            keys: config.keys,
        }
    }

    pub fn get(&self, design: Design) -> Option<&DesignStats> {
        self.stats.get(&design)
    }

    /// Print a summary of the simulation results
    pub fn print_summary(&self) {
        println!("\nMemoization Simulation Summary");
        println!("==============================");
        println!("Requests per design: {}", self.total_requests);
        println!("Worker threads: {}", self.threads);
        println!("Distinct keys: {}", self.keys);

        println!("\nResults by Design:");
        println!(
            "{:<12} {:>10} {:>11} {:>10} {:>9} {:>9} {:>10} {:>12} {:>10} {:>10}",
            "Design",
            "Requests",
            "Invocations",
            "Duplicate",
            "Failed",
            "Abandon",
            "Wall",
            "Req/sec",
            "p50",
            "p99"
        );
        println!("{}", "-".repeat(112));

        for (design, stats) in &self.stats {
            println!(
                "{:<12} {:>10} {:>11} {:>10} {:>9} {:>9} {:>9.3}s {:>12.0} {:>8}ns {:>8}ns",
                design.as_str(),
                stats.requests,
                stats.invocations,
                stats.duplicate_invocations,
                stats.failures,
                stats.cancellations,
                stats.wall_time.as_secs_f64(),
                stats.throughput(),
                stats.latency.percentiles.p50_ns,
                stats.latency.percentiles.p99_ns
            );
        }
    }

    /// Print how every design compares with the memoizer
    pub fn print_comparison(&self) {
        let Some(baseline) = self.stats.get(&Design::Memo) else {
            return;
        };

        println!("\n┌──────────────┬────────────┬──────────────┬────────────────────┐");
        println!("│ Design       │ Inv. rate  │ Duplicates   │ Throughput vs memo │");
        println!("├──────────────┼────────────┼──────────────┼────────────────────┤");

        for (design, stats) in &self.stats {
            let relative = if baseline.throughput() > 0.0 {
                format!("{:.2}x", stats.throughput() / baseline.throughput())
            } else {
                "N/A".to_string()
            };
            println!(
                "│ {:<12} │ {:>9.2}% │ {:>12} │ {:>18} │",
                design.as_str(),
                stats.invocation_rate(),
                stats.duplicate_invocations,
                relative
            );
        }

        println!("└──────────────┴────────────┴──────────────┴────────────────────┘");
        println!("\nNote: duplicates count every invocation beyond the first for a key,");
        println!("including recomputation after eviction or an uncached failure.");
    }

    fn rows(&self) -> impl Iterator<Item = CsvResultRow> + '_ {
        self.stats.iter().map(|(design, stats)| CsvResultRow {
            design: design.as_str().to_string(),
            threads: self.threads,
            keys: self.keys,
            requests: stats.requests,
            invocations: stats.invocations,
            duplicate_invocations: stats.duplicate_invocations,
            failures: stats.failures,
            cancellations: stats.cancellations,
            wall_time_ms: stats.wall_time.as_millis() as u64,
            throughput: stats.throughput(),
            avg_latency_ns: stats.latency.avg_ns(),
            min_latency_ns: stats.latency.min_ns,
            max_latency_ns: stats.latency.max_ns,
            p50_ns: stats.latency.percentiles.p50_ns,
            p90_ns: stats.latency.percentiles.p90_ns,
            p99_ns: stats.latency.percentiles.p99_ns,
            p999_ns: stats.latency.percentiles.p999_ns,
        })
    }

    /// Export results to a CSV file
    pub fn export_csv(&self, path: &Path) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in self.rows() {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OpLatencyStats;
    use std::time::Duration;

    fn sample() -> SimulationStats {
        let mut stats = BTreeMap::new();
        stats.insert(
            Design::Memo,
            DesignStats {
                requests: 100,
                invocations: 10,
                wall_time: Duration::from_millis(10),
                latency: OpLatencyStats {
                    total_ns: 1_000,
                    count: 100,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        stats.insert(
            Design::RacyMap,
            DesignStats {
                requests: 100,
                invocations: 30,
                duplicate_invocations: 20,
                wall_time: Duration::from_millis(20),
                ..Default::default()
            },
        );
        SimulationStats {
            stats,
            total_requests: 100,
            threads: 4,
            keys: 10,
        }
    }

    #[test]
    fn test_rows_follow_design_order() {
        let stats = sample();
        let rows: Vec<_> = stats.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].design, "memo");
        assert_eq!(rows[1].design, "racy-map");
        assert_eq!(rows[1].duplicate_invocations, 20);
        assert!((rows[0].avg_latency_ns - 10.0).abs() < f64::EPSILON);
        assert_eq!(stats.get(Design::Moka).map(|s| s.requests), None);
    }

    #[test]
    fn test_export_csv_writes_header_and_rows() {
        let path = std::env::temp_dir().join(format!(
            "memo-simulator-test-{}.csv",
            std::process::id()
        ));
        sample().export_csv(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let mut lines = contents.lines();
        assert!(lines
            .next()
            .unwrap()
            .starts_with("design,threads,keys,requests,invocations"));
        assert!(lines.next().unwrap().starts_with("memo,4,10,100,10"));
        assert!(lines.next().unwrap().starts_with("racy-map,4,10,100,30,20"));
        assert!(lines.next().is_none());
    }
}
