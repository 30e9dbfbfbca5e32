//! Task placement: named threads pinned to a core at a fixed priority.
//!
//! Pinning and priority are best-effort. Platforms that refuse either (no
//! such core, missing privileges for real-time priorities) get a warning and
//! the task runs unpinned at default priority.

use std::io;
use std::thread::{self, JoinHandle};

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{debug, warn};

use crate::config::SchedulingConfig;

/// Where and how a task runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: String,
    pub core: usize,
    /// Cross-platform priority, 0 (lowest) to 99 (highest)
    pub priority: u8,
    pub stack_size: usize,
}

impl TaskSpec {
    pub fn detection(config: &SchedulingConfig) -> Self {
        Self {
            name: "kws-detection".to_string(),
            core: config.detection_core,
            priority: config.detection_priority,
            stack_size: config.stack_size,
        }
    }

    pub fn indicator(config: &SchedulingConfig) -> Self {
        Self {
            name: "kws-indicator".to_string(),
            core: config.indicator_core,
            priority: config.indicator_priority,
            stack_size: config.stack_size,
        }
    }
}

/// What placement actually took effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub pinned: bool,
    pub prioritized: bool,
}

/// Spawn `body` on a new thread placed according to `spec`
pub fn spawn_task<F>(spec: TaskSpec, body: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(spec.name.clone())
        .stack_size(spec.stack_size)
        .spawn(move || {
            let placement = apply_placement(&spec);
            debug!(
                "[Scheduling] {} started (core {} pinned: {}, priority {} set: {})",
                spec.name, spec.core, placement.pinned, spec.priority, placement.prioritized
            );
            body();
        })
}

/// Pin the calling thread and raise its priority
pub fn apply_placement(spec: &TaskSpec) -> Placement {
    Placement {
        pinned: pin_current_thread(spec),
        prioritized: prioritize_current_thread(spec),
    }
}

fn pin_current_thread(spec: &TaskSpec) -> bool {
    let Some(core) = core_affinity::get_core_ids()
        .and_then(|ids| ids.into_iter().find(|id| id.id == spec.core))
    else {
        warn!(
            "[Scheduling] Core {} unavailable for {}, running unpinned",
            spec.core, spec.name
        );
        return false;
    };

    let pinned = core_affinity::set_for_current(core);
    if !pinned {
        warn!(
            "[Scheduling] Could not pin {} to core {}",
            spec.name, spec.core
        );
    }
    pinned
}

fn prioritize_current_thread(spec: &TaskSpec) -> bool {
    let value = match ThreadPriorityValue::try_from(spec.priority) {
        Ok(value) => value,
        Err(err) => {
            warn!(
                "[Scheduling] Invalid priority {} for {}: {}",
                spec.priority, spec.name, err
            );
            return false;
        }
    };

    match set_current_thread_priority(ThreadPriority::Crossplatform(value)) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                "[Scheduling] Could not set priority {} for {}: {:?}",
                spec.priority, spec.name, e
            );
            false
        }
    }
}
