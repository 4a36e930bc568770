//! Process and system memory sampling.
//!
//! The monitor is advisory: the pipeline samples it before and after a batch.
//! Workers only consult it when admission control is switched on, and even
//! then they delay rather than refuse work.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use sysinfo::{Pid, System};
use tracing::{Span, info, warn};

use crate::util::format_gb;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStatus {
    pub process_bytes: u64,
    pub system_used_bytes: u64,
    pub system_total_bytes: u64,
    pub percent: f64,
}

impl MemoryStatus {
    pub fn summary(&self) -> String {
        format!(
            "process {}, system {} / {} ({:.1}%)",
            format_gb(self.process_bytes),
            format_gb(self.system_used_bytes),
            format_gb(self.system_total_bytes),
            self.percent
        )
    }
}

pub struct ResourceMonitor {
    ceiling_bytes: u64,
    system: Mutex<System>,
    pid: Option<Pid>,
    span: Span,
}

impl ResourceMonitor {
    pub fn new(ceiling_bytes: u64, span: Span) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!(parent: &span, "cannot determine own pid, process memory reads as 0: {e}");
                None
            }
        };
        Self {
            ceiling_bytes,
            system: Mutex::new(System::new()),
            pid,
            span,
        }
    }

    pub fn ceiling_bytes(&self) -> u64 {
        self.ceiling_bytes
    }

    /// Resident set size of this process.
    pub fn current_usage_bytes(&self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_process(pid);
        sys.process(pid).map(|p| p.memory()).unwrap_or(0)
    }

    /// Whether `extra_bytes` more would still fit under the ceiling.
    pub fn available(&self, extra_bytes: u64) -> bool {
        let current = self.current_usage_bytes();
        if current.saturating_add(extra_bytes) > self.ceiling_bytes {
            warn!(
                parent: &self.span,
                event = "memory_ceiling",
                current_bytes = current,
                extra_bytes,
                ceiling_bytes = self.ceiling_bytes,
                "memory limit approaching: {} / {}",
                format_gb(current),
                format_gb(self.ceiling_bytes)
            );
            return false;
        }
        true
    }

    pub fn status_snapshot(&self) -> MemoryStatus {
        let process_bytes = self.current_usage_bytes();

        let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
        sys.refresh_memory();
        let system_total_bytes = sys.total_memory();
        let system_used_bytes = sys.used_memory();
        drop(sys);

        let percent = if system_total_bytes > 0 {
            system_used_bytes as f64 / system_total_bytes as f64 * 100.0
        } else {
            0.0
        };

        let status = MemoryStatus {
            process_bytes,
            system_used_bytes,
            system_total_bytes,
            percent,
        };
        info!(
            parent: &self.span,
            event = "memory_snapshot",
            process_bytes,
            system_used_bytes,
            system_total_bytes,
            "memory status: {}",
            status.summary()
        );
        status
    }
}
