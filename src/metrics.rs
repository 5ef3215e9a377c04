//! Process metrics, rendered as a Prometheus text page. Lock-free atomics,
//! no external metrics backend — the exposition format is hand-rolled.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub allocator_attempts: AtomicU64,
    pub allocator_successes: AtomicU64,
    pub allocator_no_capacity: AtomicU64,
    pub heartbeat_to_active: AtomicU64,
    pub heartbeat_to_full: AtomicU64,
    pub heartbeat_to_available: AtomicU64,
    pub heartbeat_to_available_priority: AtomicU64,
    pub autoscaler_launches: AtomicU64,
    pub autoscaler_integrity_brakes: AtomicU64,
    pub registry_retries: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Render as a Prometheus exposition-format text body.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let line = |out: &mut String, name: &str, help: &str, value: u64| {
            out.push_str(&format!("# HELP {name} {help}\n"));
            out.push_str(&format!("# TYPE {name} counter\n"));
            out.push_str(&format!("{name} {value}\n"));
        };

        line(&mut out, "fleet_allocator_attempts_total", "Allocator claim attempts", Self::get(&self.allocator_attempts));
        line(&mut out, "fleet_allocator_successes_total", "Allocator claims that succeeded", Self::get(&self.allocator_successes));
        line(&mut out, "fleet_allocator_no_capacity_total", "Allocator requests that exhausted both phases", Self::get(&self.allocator_no_capacity));
        line(&mut out, "fleet_heartbeat_to_active_total", "Heartbeats that moved a server to active", Self::get(&self.heartbeat_to_active));
        line(&mut out, "fleet_heartbeat_to_full_total", "Heartbeats that moved a server to full", Self::get(&self.heartbeat_to_full));
        line(&mut out, "fleet_heartbeat_to_available_total", "Heartbeats that moved a server to available", Self::get(&self.heartbeat_to_available));
        line(&mut out, "fleet_heartbeat_to_available_priority_total", "Heartbeats that moved a server to available-priority", Self::get(&self.heartbeat_to_available_priority));
        line(&mut out, "fleet_autoscaler_launches_total", "Tasks launched by the autoscaler", Self::get(&self.autoscaler_launches));
        line(&mut out, "fleet_autoscaler_integrity_brakes_total", "Autoscaler iterations that tripped the integrity brake", Self::get(&self.autoscaler_integrity_brakes));
        line(&mut out, "fleet_registry_retries_total", "Registry operation retries", Self::get(&self.registry_retries));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_every_counter_name() {
        let m = Metrics::new();
        Metrics::inc(&m.allocator_attempts);
        let text = m.render();
        assert!(text.contains("fleet_allocator_attempts_total 1"));
        assert!(text.contains("fleet_autoscaler_launches_total 0"));
    }
}
