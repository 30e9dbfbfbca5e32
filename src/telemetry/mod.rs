//! Diagnostics telemetry shared by the detection and indicator tasks.
//!
//! Each task owns a [`TaskHeartbeat`] in the global hub and bumps plain
//! atomic counters from its own thread. A low-frequency reporter thread
//! reads them and logs one headroom line per task. Nothing here is on the
//! functional path: counters are relaxed and reports are best-effort.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Per-task liveness and activity counters.
pub struct TaskHeartbeat {
    name: &'static str,
    cycles: AtomicU64,
    faults: AtomicU64,
    events_sent: AtomicU64,
    events_dropped: AtomicU64,
    /// Milliseconds since hub start at the last beat, plus one; zero means never
    last_beat_ms: AtomicU64,
}

impl TaskHeartbeat {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            cycles: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            last_beat_ms: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_sent(&self) {
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    fn beat_at(&self, since_start: Duration) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.last_beat_ms
            .store(since_start.as_millis() as u64 + 1, Ordering::Relaxed);
    }

    fn snapshot_at(&self, since_start: Duration) -> TaskSnapshot {
        let last = self.last_beat_ms.load(Ordering::Relaxed);
        let now_ms = since_start.as_millis() as u64;
        TaskSnapshot {
            name: self.name.to_string(),
            cycles: self.cycles.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            events_sent: self.events_sent.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            ms_since_heartbeat: (last > 0).then(|| now_ms.saturating_sub(last - 1)),
        }
    }
}

/// Point-in-time copy of one task's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub name: String,
    pub cycles: u64,
    pub faults: u64,
    pub events_sent: u64,
    pub events_dropped: u64,
    /// `None` until the task has completed its first cycle
    pub ms_since_heartbeat: Option<u64>,
}

/// Snapshot of all tasks for CLI reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub uptime_ms: u64,
    pub tasks: Vec<TaskSnapshot>,
}

/// Top-level hub holding one heartbeat per task.
pub struct TelemetryHub {
    started: Instant,
    detection: TaskHeartbeat,
    indicator: TaskHeartbeat,
}

impl TelemetryHub {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            detection: TaskHeartbeat::new("detection"),
            indicator: TaskHeartbeat::new("indicator"),
        }
    }

    pub fn detection(&self) -> &TaskHeartbeat {
        &self.detection
    }

    pub fn indicator(&self) -> &TaskHeartbeat {
        &self.indicator
    }

    /// Mark one completed cycle of `task`
    pub fn beat(&self, task: &TaskHeartbeat) {
        task.beat_at(self.started.elapsed());
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let since_start = self.started.elapsed();
        TelemetrySnapshot {
            uptime_ms: since_start.as_millis() as u64,
            tasks: vec![
                self.detection.snapshot_at(since_start),
                self.indicator.snapshot_at(since_start),
            ],
        }
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns successive snapshots into headroom lines.
#[derive(Debug, Default)]
pub struct HeadroomReporter {
    previous_cycles: Vec<u64>,
}

impl HeadroomReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// One line per task: cycles since the previous report and totals
    pub fn lines(&mut self, snapshot: &TelemetrySnapshot) -> Vec<String> {
        self.previous_cycles.resize(snapshot.tasks.len(), 0);
        snapshot
            .tasks
            .iter()
            .zip(self.previous_cycles.iter_mut())
            .map(|(task, previous)| {
                let delta = task.cycles.saturating_sub(*previous);
                *previous = task.cycles;
                let heartbeat = match task.ms_since_heartbeat {
                    Some(ms) => format!("{} ms ago", ms),
                    None => "never".to_string(),
                };
                format!(
                    "task {}: +{} cycles ({} total), faults {}, events sent {} dropped {}, heartbeat {}",
                    task.name,
                    delta,
                    task.cycles,
                    task.faults,
                    task.events_sent,
                    task.events_dropped,
                    heartbeat
                )
            })
            .collect()
    }
}

/// Spawn the periodic diagnostics reporter
///
/// Logs at `debug` every `interval`; runs until the process exits.
pub fn spawn_diagnostics_reporter(interval: Duration) -> io::Result<JoinHandle<()>> {
    let interval = interval.max(Duration::from_millis(100));
    thread::Builder::new()
        .name("kws-diagnostics".to_string())
        .spawn(move || {
            let mut reporter = HeadroomReporter::new();
            loop {
                thread::sleep(interval);
                for line in reporter.lines(&hub().snapshot()) {
                    debug!("[Diagnostics] {}", line);
                }
            }
        })
}
