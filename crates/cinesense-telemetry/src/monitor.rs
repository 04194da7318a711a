//! Analysis latency and outcome monitoring

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Input-length bucket used to group latency figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthBucket {
    /// Fewer than 50 characters
    Short,
    /// 50 to 199 characters
    Medium,
    /// 200 characters or more
    Long,
}

impl LengthBucket {
    pub const ALL: [LengthBucket; 3] = [Self::Short, Self::Medium, Self::Long];

    /// Bucket for a text of `chars` characters
    pub fn for_len(chars: usize) -> Self {
        match chars {
            0..=49 => Self::Short,
            50..=199 => Self::Medium,
            _ => Self::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Short => 0,
            Self::Medium => 1,
            Self::Long => 2,
        }
    }
}

/// Thread-safe performance monitor for the sentiment runtime.
///
/// Cloning is cheap; clones share the same counters.
#[derive(Clone, Default)]
pub struct PerformanceMonitor {
    inner: Arc<MonitorInner>,
}

#[derive(Default)]
struct MonitorInner {
    total_analyses: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    cache_hits: AtomicU64,
    total_latency_us: AtomicU64,
    buckets: [BucketCounters; 3],
    accepted_accelerated: AtomicU64,
    accepted_cpu: AtomicU64,
    accepted_keyword: AtomicU64,
}

#[derive(Default)]
struct BucketCounters {
    count: AtomicU64,
    latency_us: AtomicU64,
}

impl PerformanceMonitor {
    /// Create a new monitor with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed analysis
    pub fn record_analysis(&self, text_chars: usize, latency_us: u64, success: bool) {
        let bucket = LengthBucket::for_len(text_chars);
        let inner = &self.inner;

        inner.total_analyses.fetch_add(1, Ordering::Relaxed);
        inner.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        if success {
            inner.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            inner.failures.fetch_add(1, Ordering::Relaxed);
        }

        let counters = &inner.buckets[bucket.index()];
        counters.count.fetch_add(1, Ordering::Relaxed);
        counters.latency_us.fetch_add(latency_us, Ordering::Relaxed);

        let outcome = if success { "success" } else { "failure" };
        metrics::counter!(
            "cinesense_analyses_total",
            "bucket" => bucket.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("cinesense_analysis_latency_us", "bucket" => bucket.as_str())
            .record(latency_us as f64);

        tracing::trace!(
            bucket = bucket.as_str(),
            latency_us,
            success,
            "analysis recorded"
        );
    }

    /// Record a result served from the cache
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("cinesense_cache_hits_total").increment(1);
    }

    /// Record which backend produced an accepted result.
    ///
    /// Known names are `accelerated`, `cpu` and `keyword`; anything else is
    /// only forwarded to the metrics facade.
    pub fn record_backend_accepted(&self, backend: &'static str) {
        let counter = match backend {
            "accelerated" => Some(&self.inner.accepted_accelerated),
            "cpu" => Some(&self.inner.accepted_cpu),
            "keyword" => Some(&self.inner.accepted_keyword),
            _ => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        metrics::counter!("cinesense_backend_accepted_total", "backend" => backend).increment(1);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MonitorSnapshot {
        let inner = &self.inner;
        let buckets = LengthBucket::ALL
            .iter()
            .map(|bucket| {
                let counters = &inner.buckets[bucket.index()];
                (
                    *bucket,
                    BucketSnapshot {
                        count: counters.count.load(Ordering::Relaxed),
                        total_latency_us: counters.latency_us.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        let mut accepted_by_backend = BTreeMap::new();
        accepted_by_backend.insert(
            "accelerated",
            inner.accepted_accelerated.load(Ordering::Relaxed),
        );
        accepted_by_backend.insert("cpu", inner.accepted_cpu.load(Ordering::Relaxed));
        accepted_by_backend.insert("keyword", inner.accepted_keyword.load(Ordering::Relaxed));

        MonitorSnapshot {
            total_analyses: inner.total_analyses.load(Ordering::Relaxed),
            successes: inner.successes.load(Ordering::Relaxed),
            failures: inner.failures.load(Ordering::Relaxed),
            cache_hits: inner.cache_hits.load(Ordering::Relaxed),
            total_latency_us: inner.total_latency_us.load(Ordering::Relaxed),
            buckets,
            accepted_by_backend,
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.total_analyses,
            &inner.successes,
            &inner.failures,
            &inner.cache_hits,
            &inner.total_latency_us,
            &inner.accepted_accelerated,
            &inner.accepted_cpu,
            &inner.accepted_keyword,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        for bucket in &inner.buckets {
            bucket.count.store(0, Ordering::Relaxed);
            bucket.latency_us.store(0, Ordering::Relaxed);
        }
    }
}

/// Per-bucket totals
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct BucketSnapshot {
    pub count: u64,
    pub total_latency_us: u64,
}

impl BucketSnapshot {
    pub fn avg_latency_us(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_latency_us / self.count
        }
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub total_analyses: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache_hits: u64,
    pub total_latency_us: u64,
    pub buckets: BTreeMap<LengthBucket, BucketSnapshot>,
    pub accepted_by_backend: BTreeMap<&'static str, u64>,
}

impl MonitorSnapshot {
    /// Calculate average latency per analysis
    pub fn avg_latency_us(&self) -> u64 {
        if self.total_analyses == 0 {
            0
        } else {
            self.total_latency_us / self.total_analyses
        }
    }

    /// Fraction of analyses that produced a successful result
    pub fn success_rate(&self) -> f64 {
        if self.total_analyses == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_analyses as f64
        }
    }

    /// Totals for a single bucket
    pub fn bucket(&self, bucket: LengthBucket) -> BucketSnapshot {
        self.buckets.get(&bucket).copied().unwrap_or_default()
    }
}
