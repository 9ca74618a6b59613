#[cfg(feature = "cli")]
use std::sync::Mutex;
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[derive(Debug, Clone)]
pub struct PhaseStats {
    pub phase: String,
    pub phase_time: Duration,
    pub elapsed_time: Duration,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
}

/// Tracks per-phase timing (and process memory when `cli` is enabled) for one evaluation.
#[cfg(feature = "cli")]
pub struct EvaluationMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    start_time: Instant,
    last_phase: Mutex<Instant>,
    peak_memory: Mutex<u64>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl EvaluationMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        if enabled && pid.is_none() {
            tracing::warn!("Could not resolve current PID, memory stats disabled");
        }

        let now = Instant::now();
        Self {
            system: Mutex::new(System::new()),
            pid,
            start_time: now,
            last_phase: Mutex::new(now),
            peak_memory: Mutex::new(0),
            enabled,
        }
    }

    fn current_memory_mb(&self) -> u64 {
        let (Some(pid), Ok(mut system)) = (self.pid, self.system.lock()) else {
            return 0;
        };

        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        system
            .process(pid)
            .map(|process| process.memory() / 1024 / 1024)
            .unwrap_or(0)
    }

    pub fn record_phase(&self, phase: &str) -> Option<PhaseStats> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();
        let phase_time = {
            let mut last = self.last_phase.lock().ok()?;
            let elapsed = now.duration_since(*last);
            *last = now;
            elapsed
        };

        let memory_mb = self.current_memory_mb();
        let peak_memory_mb = {
            let mut peak = self.peak_memory.lock().ok()?;
            if memory_mb > *peak {
                *peak = memory_mb;
            }
            *peak
        };

        let stats = PhaseStats {
            phase: phase.to_string(),
            phase_time,
            elapsed_time: self.start_time.elapsed(),
            memory_usage_mb: memory_mb,
            peak_memory_mb,
        };

        tracing::info!(
            "📊 {} - took {:?}, memory {}MB (peak {}MB), total {:?}",
            stats.phase,
            stats.phase_time,
            stats.memory_usage_mb,
            stats.peak_memory_mb,
            stats.elapsed_time
        );
        Some(stats)
    }

    pub fn log_final_stats(&self) {
        if self.enabled {
            let peak = self.peak_memory.lock().map(|p| *p).unwrap_or(0);
            tracing::info!(
                "📊 Evaluation finished in {:?}, peak memory {}MB",
                self.start_time.elapsed(),
                peak
            );
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for EvaluationMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 沒有 sysinfo 時只保留計時
#[cfg(not(feature = "cli"))]
pub struct EvaluationMonitor {
    start_time: Instant,
    last_phase: std::sync::Mutex<Instant>,
    enabled: bool,
}

#[cfg(not(feature = "cli"))]
impl EvaluationMonitor {
    pub fn new(enabled: bool) -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_phase: std::sync::Mutex::new(now),
            enabled,
        }
    }

    pub fn record_phase(&self, phase: &str) -> Option<PhaseStats> {
        if !self.enabled {
            return None;
        }
        let now = Instant::now();
        let mut last = self.last_phase.lock().ok()?;
        let phase_time = now.duration_since(*last);
        *last = now;
        tracing::info!("📊 {} - took {:?}", phase, phase_time);
        Some(PhaseStats {
            phase: phase.to_string(),
            phase_time,
            elapsed_time: self.start_time.elapsed(),
            memory_usage_mb: 0,
            peak_memory_mb: 0,
        })
    }

    pub fn log_final_stats(&self) {
        if self.enabled {
            tracing::info!("📊 Evaluation finished in {:?}", self.start_time.elapsed());
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(not(feature = "cli"))]
impl Default for EvaluationMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_records_nothing() {
        let monitor = EvaluationMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.record_phase("market").is_none());
    }

    #[test]
    fn test_enabled_monitor_tracks_phases() {
        let monitor = EvaluationMonitor::new(true);
        let first = monitor.record_phase("input").unwrap();
        let second = monitor.record_phase("market").unwrap();
        assert_eq!(first.phase, "input");
        assert_eq!(second.phase, "market");
        assert!(second.elapsed_time >= first.elapsed_time);
        assert!(second.peak_memory_mb >= first.memory_usage_mb);
    }
}
