//! System metrics sampler
//!
//! Wraps a long-lived `sysinfo::System` so CPU usage is computed as the delta
//! between consecutive refreshes. The first sample after construction reports
//! the usage since `new()`, so callers should sample on a fixed interval.

use chrono::Utc;
use sysinfo::System;
use tracing::debug;

use crate::models::SystemMetrics;

const BYTES_PER_GIB: u64 = 1024 * 1024 * 1024;

/// Collects [`SystemMetrics`] samples from the host
pub struct SystemSampler {
    system: System,

    // Static host identity, read once
    cpu_model: String,
    platform: String,
    kernel: String,
}

impl SystemSampler {
    /// Create new sampler and prime the CPU counters
    pub fn new() -> Self {
        let mut system = System::new_all();
        system.refresh_cpu_all();
        system.refresh_memory();

        let cpu_model = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .unwrap_or_default();

        let platform = System::distribution_id();
        let kernel = System::kernel_version().unwrap_or_default();

        debug!(
            cpu_model = %cpu_model,
            platform = %platform,
            kernel = %kernel,
            "System sampler initialized"
        );

        Self {
            system,
            cpu_model,
            platform,
            kernel,
        }
    }

    /// Refresh counters and take one sample
    /// Should be called periodically (e.g., every 1 second)
    pub fn sample(&mut self) -> SystemMetrics {
        self.system.refresh_cpu_all();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();

        SystemMetrics {
            cpu: self.system.global_cpu_usage() as f64,
            cpu_model: self.cpu_model.clone(),
            cores: self.system.cpus().len(),
            memory: SystemMetrics::percent(used, total),
            total_mem: total / BYTES_PER_GIB,
            used_mem: used / BYTES_PER_GIB,
            os: std::env::consts::OS.to_string(),
            platform: self.platform.clone(),
            kernel: self.kernel.clone(),
            arch: std::env::consts::ARCH.to_string(),
            uptime: System::uptime(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}
