//! Deferred device-health notification
//!
//! Raising a health event must never block or delay an I/O completion,
//! so the completion monitor only flips an atomic "scheduled" flag and
//! hands the actual notification to a deferred-execution facility. The
//! flag coalesces racing schedulers: at most one notification is
//! logically pending at a time, and re-scheduling while pending is a
//! no-op rather than a queue entry. Teardown drains the pending slot so
//! the notification can never outlive the target it describes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crossbeam_channel::Sender;
use parking_lot::{Condvar, Mutex};
use tracing::debug;

/// Observer for device-health events (e.g. the host's monitoring plane).
pub trait EventSink: Send + Sync {
    /// A backing device of `target` crossed into a concerning error rate.
    fn device_event(&self, target: &str);
}

/// Deferred-execution facility supplied by the host. Fire-and-forget:
/// submitted work runs eventually, off every I/O path.
pub trait Workqueue: Send + Sync {
    fn submit(&self, work: Box<dyn FnOnce() + Send>);
}

enum Job {
    Run(Box<dyn FnOnce() + Send>),
    Shutdown,
}

/// Single worker-thread [`Workqueue`], joined on drop.
pub struct ThreadWorkqueue {
    tx: Sender<Job>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ThreadWorkqueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded::<Job>();

        let handle = thread::spawn(move || {
            while let Ok(job) = rx.recv() {
                match job {
                    Job::Run(work) => work(),
                    Job::Shutdown => break,
                }
            }
        });

        Self {
            tx,
            worker: Mutex::new(Some(handle)),
        }
    }
}

impl Default for ThreadWorkqueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Workqueue for ThreadWorkqueue {
    fn submit(&self, work: Box<dyn FnOnce() + Send>) {
        // Send only fails after shutdown, when the work is moot anyway.
        let _ = self.tx.send(Job::Run(work));
    }
}

impl Drop for ThreadWorkqueue {
    fn drop(&mut self) {
        let _ = self.tx.send(Job::Shutdown);
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }
}

struct TriggerState {
    scheduled: AtomicBool,
    lock: Mutex<()>,
    idle: Condvar,
}

/// Coalesced single-slot scheduler for the health-event notification.
pub struct HealthTrigger {
    target: String,
    sink: Arc<dyn EventSink>,
    queue: Arc<dyn Workqueue>,
    state: Arc<TriggerState>,
}

impl HealthTrigger {
    pub fn new(
        target: impl Into<String>,
        sink: Arc<dyn EventSink>,
        queue: Arc<dyn Workqueue>,
    ) -> Self {
        Self {
            target: target.into(),
            sink,
            queue,
            state: Arc::new(TriggerState {
                scheduled: AtomicBool::new(false),
                lock: Mutex::new(()),
                idle: Condvar::new(),
            }),
        }
    }

    /// Schedule the notification unless one is already pending.
    pub fn schedule(&self) {
        if self
            .state
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Already pending; coalesce.
            return;
        }

        debug!(target_name = %self.target, "scheduling device health event");

        let sink = Arc::clone(&self.sink);
        let state = Arc::clone(&self.state);
        let target = self.target.clone();

        self.queue.submit(Box::new(move || {
            sink.device_event(&target);

            let _guard = state.lock.lock();
            state.scheduled.store(false, Ordering::Release);
            state.idle.notify_all();
        }));
    }

    pub fn is_scheduled(&self) -> bool {
        self.state.scheduled.load(Ordering::Acquire)
    }

    /// Block until no notification is outstanding. Called at teardown so
    /// the sink is never invoked for a target that no longer exists.
    pub fn drain(&self) {
        let mut guard = self.state.lock.lock();
        while self.state.scheduled.load(Ordering::Acquire) {
            self.state.idle.wait(&mut guard);
        }
    }
}
