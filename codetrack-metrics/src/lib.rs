//! Codetrack system metrics
//!
//! Host-level metric samples broadcast to monitor clients once per tick.
//!
//! ## Contents
//!
//! - [`SystemMetrics`]: one sample (CPU, memory, host identity, uptime)
//! - [`SystemSampler`]: sysinfo-backed collector producing samples

pub mod models;
pub mod sampler;

// Re-export main types
pub use models::SystemMetrics;
pub use sampler::SystemSampler;
