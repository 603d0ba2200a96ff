//! In-memory service counters exposed on the info endpoints

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime counters, reset on restart
pub struct ServiceStats {
    started_at: DateTime<Utc>,
    updates_received: AtomicU64,
    commands_handled: AtomicU64,
    replies_sent: AtomicU64,
    errors: AtomicU64,
}

/// Snapshot of the counters for JSON responses
#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub updates_received: u64,
    pub commands_handled: u64,
    pub replies_sent: u64,
    pub errors: u64,
}

impl ServiceStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            updates_received: AtomicU64::new(0),
            commands_handled: AtomicU64::new(0),
            replies_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn update_received(&self) {
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_handled(&self) {
        self.commands_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reply_sent(&self) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            updates_received: self.updates_received.load(Ordering::Relaxed),
            commands_handled: self.commands_handled.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for ServiceStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = ServiceStats::new();
        stats.update_received();
        stats.update_received();
        stats.command_handled();
        stats.error();

        let snap = stats.snapshot();
        assert_eq!(snap.updates_received, 2);
        assert_eq!(snap.commands_handled, 1);
        assert_eq!(snap.replies_sent, 0);
        assert_eq!(snap.errors, 1);
        assert!(snap.uptime_secs >= 0);
    }
}
