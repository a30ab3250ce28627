//! Stress tests for OrbitalDB.
//!
//! These tests verify behavior under heavy load and concurrent access
//! through a shared [`Catalog`].

use crate::fixtures::doc;
use orbital_core::{Catalog, DocumentId};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone, Serialize)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    #[must_use]
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    fn merge(results: impl IntoIterator<Item = Self>, duration: Duration) -> Self {
        let (ok, failed) = results
            .into_iter()
            .fold((0, 0), |(ok, failed), r| (ok + r.successful_ops, failed + r.failed_ops));
        Self::new(ok, failed, duration)
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Length of the padding field in each document.
    pub document_size: usize,
    /// Number of distinct ids written.
    pub id_space: i64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            document_size: 256,
            id_space: 1_000,
        }
    }
}

fn padded(id: i64, config: &StressConfig) -> orbital_core::Document {
    doc(json!({ "id": id, "pad": "x".repeat(config.document_size) }))
}

/// Run a sequential insert stress test on collection `name`.
pub fn stress_sequential_inserts(
    catalog: &Catalog,
    name: &str,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let (mut successful, mut failed) = (0usize, 0usize);

    let Ok(handle) = catalog.collection(name) else {
        return StressTestResult::new(0, config.operations, start.elapsed());
    };
    for i in 0..config.operations {
        let id = i as i64 % config.id_space;
        match handle.lock().insert(padded(id, config)) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a mixed insert/get/delete stress test, compacting whenever the
/// collection's policy asks for it.
pub fn stress_mixed_operations(
    catalog: &Catalog,
    name: &str,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let (mut successful, mut failed) = (0usize, 0usize);

    let Ok(handle) = catalog.collection(name) else {
        return StressTestResult::new(0, config.operations, start.elapsed());
    };
    for i in 0..config.operations {
        let id = (i as i64 * 7) % config.id_space;
        let mut collection = handle.lock();
        let ok = match i % 4 {
            0 | 1 => collection.insert(padded(id, config)).is_ok(),
            2 => collection.get(&DocumentId::Int(id)).is_ok(),
            _ => collection.delete(&DocumentId::Int(id)).is_ok(),
        };
        let ok = ok && collection.compact_if_needed().is_ok();
        if ok {
            successful += 1;
        } else {
            failed += 1;
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run inserts from `config.threads` threads, each on its own collection.
pub fn stress_concurrent_collections(
    catalog: Arc<Catalog>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let catalog = Arc::clone(&catalog);
            let config = config.clone();
            thread::spawn(move || stress_sequential_inserts(&catalog, &format!("c{t}"), &config))
        })
        .collect();

    let results = handles
        .into_iter()
        .map(|h| {
            h.join()
                .unwrap_or_else(|_| StressTestResult::new(0, 1, Duration::ZERO))
        })
        .collect::<Vec<_>>();
    StressTestResult::merge(results, start.elapsed())
}

/// Run inserts from `config.threads` threads into the same collection,
/// each thread writing a disjoint id range.
pub fn stress_shared_collection(
    catalog: Arc<Catalog>,
    name: &str,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let catalog = Arc::clone(&catalog);
            let config = config.clone();
            let name = name.to_string();
            thread::spawn(move || {
                let (mut ok, mut failed) = (0usize, 0usize);
                let Ok(handle) = catalog.collection(&name) else {
                    return StressTestResult::new(0, config.operations, Duration::ZERO);
                };
                for i in 0..config.operations {
                    let id = (t * config.operations + i) as i64;
                    match handle.lock().insert(padded(id, &config)) {
                        Ok(_) => ok += 1,
                        Err(_) => failed += 1,
                    }
                }
                StressTestResult::new(ok, failed, Duration::ZERO)
            })
        })
        .collect();

    let results = handles
        .into_iter()
        .map(|h| {
            h.join()
                .unwrap_or_else(|_| StressTestResult::new(0, 1, Duration::ZERO))
        })
        .collect::<Vec<_>>();
    StressTestResult::merge(results, start.elapsed())
}
