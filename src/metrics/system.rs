//! # System Gauges
//!
//! Memory gauges registered under the `memory.` prefix. Values are bytes and
//! are read fresh from the operating system whenever a snapshot is taken.

use super::gauge::Gauge;
use super::store::MetricStore;
use crate::error::MonitoringError;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, System};

/// Prefix shared by every memory gauge.
pub const MEMORY_PREFIX: &str = "memory";

struct MemorySampler {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl MemorySampler {
    fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    fn read(&self, select: impl FnOnce(&mut System, Option<Pid>) -> Option<u64>) -> f64 {
        match self.system.lock() {
            Ok(mut system) => select(&mut system, self.pid).map_or(f64::NAN, |v| v as f64),
            Err(_) => f64::NAN,
        }
    }
}

/// Register the host and process memory gauges on `store`.
pub fn register_memory_gauges(store: &MetricStore) -> Result<(), MonitoringError> {
    let sampler = Arc::new(MemorySampler::new());

    let gauges: [(&str, fn(&mut System, Option<Pid>) -> Option<u64>); 5] = [
        ("total", |system, _| {
            system.refresh_memory();
            Some(system.total_memory())
        }),
        ("used", |system, _| {
            system.refresh_memory();
            Some(system.used_memory())
        }),
        ("available", |system, _| {
            system.refresh_memory();
            Some(system.available_memory())
        }),
        ("process.resident", |system, pid| {
            let pid = pid?;
            system.refresh_process(pid);
            system.process(pid).map(|process| process.memory())
        }),
        ("process.virtual", |system, pid| {
            let pid = pid?;
            system.refresh_process(pid);
            system.process(pid).map(|process| process.virtual_memory())
        }),
    ];

    for (suffix, select) in gauges {
        let sampler = sampler.clone();
        store.register_gauge(
            &format!("{}.{}", MEMORY_PREFIX, suffix),
            Gauge::new(move || sampler.read(select)),
        )?;
    }
    Ok(())
}
