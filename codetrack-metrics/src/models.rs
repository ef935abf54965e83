//! Data models for system metric samples

use serde::{Deserialize, Serialize};

/// One system metrics sample as sent to monitor clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Global CPU usage (percent, 0-100)
    pub cpu: f64,
    pub cpu_model: String,
    /// Logical core count
    pub cores: usize,

    /// Memory used (percent, 0-100)
    pub memory: f64,
    /// Total memory (GiB, truncated)
    pub total_mem: u64,
    /// Used memory (GiB, truncated)
    pub used_mem: u64,

    // Host identity
    pub os: String,
    pub platform: String,
    pub kernel: String,
    pub arch: String,

    /// Host uptime in seconds
    pub uptime: u64,
    /// RFC 3339 sample time
    pub timestamp: String,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self {
            cpu: 0.0,
            cpu_model: String::new(),
            cores: 0,
            memory: 0.0,
            total_mem: 0,
            used_mem: 0,
            os: std::env::consts::OS.to_string(),
            platform: String::new(),
            kernel: String::new(),
            arch: std::env::consts::ARCH.to_string(),
            uptime: 0,
            timestamp: String::new(),
        }
    }
}

impl SystemMetrics {
    /// Percentage of `used` over `total`, 0.0 when `total` is zero
    pub fn percent(used: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_serialization_field_names() {
        let metrics = SystemMetrics {
            cpu: 12.5,
            cpu_model: "Test CPU".to_string(),
            cores: 8,
            memory: 50.0,
            total_mem: 16,
            used_mem: 8,
            os: "linux".to_string(),
            platform: "debian".to_string(),
            kernel: "6.1.0".to_string(),
            arch: "x86_64".to_string(),
            uptime: 3600,
            timestamp: "2026-10-19T12:00:00+00:00".to_string(),
        };

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["cpu"], 12.5);
        assert_eq!(json["cpu_model"], "Test CPU");
        assert_eq!(json["total_mem"], 16);
        assert_eq!(json["used_mem"], 8);
        assert_eq!(json["uptime"], 3600);
    }

    #[test]
    fn test_percent() {
        assert_eq!(SystemMetrics::percent(50, 200), 25.0);
        assert_eq!(SystemMetrics::percent(10, 0), 0.0);
    }
}
