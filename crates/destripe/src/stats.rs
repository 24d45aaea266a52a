//! Live I/O accounting
//!
//! Four lock-free counters shared by every in-flight request: totals grow
//! monotonically, pendings rise at dispatch and fall at completion. Only
//! ordinary reads and writes are counted; flushes and discards pass the
//! dispatcher uncounted.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::request::IoKind;

/// Dispatch/completion counters, safe for concurrent update from
/// arbitrarily many I/O paths.
#[derive(Debug, Default)]
pub struct IoCounters {
    read_total: AtomicU64,
    read_pending: AtomicU64,
    write_total: AtomicU64,
    write_pending: AtomicU64,
}

/// Point-in-time copy of the live counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub read_total: u64,
    pub read_pending: u64,
    pub write_total: u64,
    pub write_pending: u64,
}

impl IoCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a forwarded read or write. Other kinds are not counted.
    pub fn dispatched(&self, kind: IoKind) {
        match kind {
            IoKind::Write => {
                self.write_total.fetch_add(1, Ordering::Relaxed);
                self.write_pending.fetch_add(1, Ordering::Relaxed);
            }
            IoKind::Read => {
                self.read_total.fetch_add(1, Ordering::Relaxed);
                self.read_pending.fetch_add(1, Ordering::Relaxed);
            }
            IoKind::Flush | IoKind::Discard => {}
        }
    }

    /// Record the completion matching an earlier `dispatched()`. Pending
    /// counters must never drop below zero: completions correspond 1:1
    /// to counted dispatches.
    pub fn completed(&self, kind: IoKind) {
        match kind {
            IoKind::Write => {
                let prev = self.write_pending.fetch_sub(1, Ordering::Relaxed);
                debug_assert!(prev > 0, "write completion without dispatch");
            }
            IoKind::Read => {
                let prev = self.read_pending.fetch_sub(1, Ordering::Relaxed);
                debug_assert!(prev > 0, "read completion without dispatch");
            }
            IoKind::Flush | IoKind::Discard => {}
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            read_total: self.read_total.load(Ordering::Relaxed),
            read_pending: self.read_pending.load(Ordering::Relaxed),
            write_total: self.write_total.load(Ordering::Relaxed),
            write_pending: self.write_pending.load(Ordering::Relaxed),
        }
    }
}
