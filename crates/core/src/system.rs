use serde::Serialize;
use sysinfo::System;

use crate::gpu::GpuSample;

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub cpu_pct: f64,
    pub ram_pct: f64,
    pub ram_used_gb: u64,
    pub ram_total_gb: u64,
    pub gpu: Vec<GpuSample>,
}

/// CPU usage is a delta between refreshes, so the probe keeps its `System`
/// around and is primed once on creation.
pub struct SystemProbe {
    system: System,
}

impl SystemProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self { system }
    }

    pub fn sample(&mut self, gpu: Vec<GpuSample>) -> SystemStats {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let used = self.system.used_memory();
        let ram_pct = if total == 0 {
            0.0
        } else {
            used as f64 * 100.0 / total as f64
        };

        SystemStats {
            cpu_pct: round1(self.system.global_cpu_usage() as f64),
            ram_pct: round1(ram_pct),
            ram_used_gb: used / GIB,
            ram_total_gb: total / GIB,
            gpu,
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
