//! CineSense Telemetry
//!
//! Performance monitoring for the sentiment runtime.
//!
//! Provides:
//! - Per-analysis latency and outcome counters, bucketed by input length
//! - Cache-hit and backend-acceptance counters
//! - Mirroring of every record to the `metrics` facade for exporters

pub mod monitor;

pub use monitor::{LengthBucket, MonitorSnapshot, PerformanceMonitor};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::monitor::{LengthBucket, MonitorSnapshot, PerformanceMonitor};
}
