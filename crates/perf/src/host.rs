//! Host and process readings.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, System};

const MIB: u64 = 1024 * 1024;

/// One reading of the machine and of this process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    pub cpu_usage: f64,
    pub cpu_count: usize,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    pub uptime_secs: u64,
    /// Resident set of this process.
    pub process_rss_bytes: u64,
    pub process_virtual_bytes: u64,
    pub process_uptime_secs: u64,
}

impl HostSnapshot {
    /// `(1 - available/total) * 100`, 0 when the total is unknown.
    pub fn memory_usage(&self) -> f64 {
        if self.total_memory_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.available_memory_bytes as f64 / self.total_memory_bytes as f64) * 100.0
    }

    pub fn total_memory_mb(&self) -> u64 {
        self.total_memory_bytes / MIB
    }

    pub fn available_memory_mb(&self) -> u64 {
        self.available_memory_bytes / MIB
    }

    pub fn process_rss_mb(&self) -> f64 {
        self.process_rss_bytes as f64 / MIB as f64
    }
}

pub trait HostMetrics: Send + Sync {
    fn snapshot(&self) -> HostSnapshot;
}

/// Reads the live host through `sysinfo`.
///
/// CPU usage is the utilisation between two consecutive snapshots, so the
/// first reading after construction covers the interval since `new`.
pub struct SysinfoHost {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoHost {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_specifics(CpuRefreshKind::everything());
        let pid = sysinfo::get_current_pid().ok();
        if pid.is_none() {
            tracing::warn!("current pid unavailable; process metrics will be zero");
        }
        Self {
            system: Mutex::new(system),
            pid,
        }
    }
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostMetrics for SysinfoHost {
    fn snapshot(&self) -> HostSnapshot {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);

        system.refresh_cpu_specifics(CpuRefreshKind::everything());
        let cpus = system.cpus();
        let cpu_count = cpus.len();
        let cpu_usage = cpus.iter().map(sysinfo::Cpu::cpu_usage).sum::<f32>() / cpu_count.max(1) as f32;

        system.refresh_memory_specifics(MemoryRefreshKind::everything());

        let mut snapshot = HostSnapshot {
            cpu_usage: f64::from(cpu_usage),
            cpu_count,
            total_memory_bytes: system.total_memory(),
            available_memory_bytes: system.available_memory(),
            uptime_secs: System::uptime(),
            ..HostSnapshot::default()
        };

        if let Some(pid) = self.pid {
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                ProcessRefreshKind::nothing().with_memory(),
            );
            if let Some(process) = system.process(pid) {
                snapshot.process_rss_bytes = process.memory();
                snapshot.process_virtual_bytes = process.virtual_memory();
                snapshot.process_uptime_secs = process.run_time();
            }
        }
        snapshot
    }
}

/// A fixed reading, replaceable between samples.
#[derive(Debug, Default)]
pub struct StaticHost {
    snapshot: Mutex<HostSnapshot>,
}

impl StaticHost {
    pub fn new(snapshot: HostSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    pub fn set(&self, snapshot: HostSnapshot) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

impl HostMetrics for StaticHost {
    fn snapshot(&self) -> HostSnapshot {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
