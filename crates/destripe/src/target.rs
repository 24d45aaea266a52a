//! The destripe target: lifecycle, dispatch, completion, introspection
//!
//! A [`DestripeTarget`] is built once from a validated argument line,
//! serves concurrent `map()`/`end_io()` calls from the host pipeline for
//! its whole active lifetime, and drains its deferred health event on
//! drop. Nothing in the config is mutated after construction; the only
//! shared mutable state is atomic counters and flags.

use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::{debug, info, warn};

use crate::config::{DestripeArgs, TargetParams, parse_args};
use crate::device::{BlockDevice, DeviceResolver};
use crate::error::{ConstructError, IoError, MessageError};
use crate::event::{EventSink, HealthTrigger, Workqueue};
use crate::map::StripeMap;
use crate::request::{IoKind, IoRequest, MapDisposition};
use crate::stats::IoCounters;
use crate::{IO_ERROR_THRESHOLD, SECTOR_SHIFT};

/// Which status encoding the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    /// Configuration and live counters, human-oriented
    Info,
    /// Reconstructable configuration line
    Table,
}

/// Granularity hints for the host's request-shaping logic, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoHints {
    pub io_min: u32,
    pub io_opt: u32,
}

/// One reverse-striping mapping bound to a single backing device.
pub struct DestripeTarget {
    name: String,
    /// First logical sector of the mapped region
    target_start: u64,
    /// Mapped region length in sectors
    target_len: u64,
    map: StripeMap,
    /// Backing capacity the whole stripe set requires, in sectors
    physical_size: u64,
    dev: Arc<dyn BlockDevice>,
    /// Device name cached for error-source identification
    dev_name: String,
    /// Stripe-set start sector on the backing device
    physical_start: u64,
    /// Reported backing device capacity in sectors
    physical_secs: u64,
    counters: IoCounters,
    /// Errors attributed to the backing device; grows without bound,
    /// only notification scheduling stops at the threshold
    error_count: AtomicU64,
    suspended: AtomicBool,
    trigger: HealthTrigger,
}

impl DestripeTarget {
    /// Construct a mapping from an argument line.
    ///
    /// Validates per [`parse_args`], resolves the backing device, and
    /// checks its capacity against `stripe_count * target_length`. On any
    /// failure everything acquired so far is released before returning.
    pub fn new(
        params: &TargetParams,
        args: &[&str],
        resolver: &dyn DeviceResolver,
        sink: Arc<dyn EventSink>,
        queue: Arc<dyn Workqueue>,
    ) -> Result<Self, ConstructError> {
        let DestripeArgs {
            stripe_count,
            stripe_index,
            chunk_size,
            device,
            physical_start,
        } = parse_args(params, args)?;

        let dev = resolver
            .open(&device)
            .map_err(ConstructError::DeviceUnavailable)?;

        let physical_size = params.len * u64::from(stripe_count);
        let physical_secs = dev
            .capacity_sectors()
            .map_err(ConstructError::CapacityQuery)?;

        if physical_secs < physical_size {
            return Err(ConstructError::InsufficientCapacity {
                required: physical_size,
                actual: physical_secs,
            });
        }
        if physical_secs > physical_size {
            warn!(
                target_name = %params.name,
                using = physical_size,
                capacity = physical_secs,
                "larger physical space than required, destriping a prefix"
            );
        }

        let map = StripeMap::new(stripe_count, stripe_index, chunk_size);
        let dev_name = dev.name().to_string();
        let trigger = HealthTrigger::new(params.name.clone(), sink, queue);

        info!(
            target_name = %params.name,
            len = params.len,
            stripes = stripe_count,
            idx = stripe_index,
            phys_size = physical_size,
            chunk_size,
            chunk_size_shift = map.chunk_shift().map_or(-1, |s| s as i32),
            "destripe target initialized"
        );

        Ok(Self {
            name: params.name.clone(),
            target_start: params.start,
            target_len: params.len,
            map,
            physical_size,
            dev,
            dev_name,
            physical_start,
            physical_secs,
            counters: IoCounters::new(),
            error_count: AtomicU64::new(0),
            suspended: AtomicBool::new(false),
            trigger,
        })
    }

    // ── Request dispatch ─────────────────────────────────────────────────

    /// Route one request: rewrite its device and address in place and say
    /// whether to forward it or treat it as already completed.
    ///
    /// Callers split requests at the [`Self::split_boundary`] so a single
    /// request never spans a chunk boundary.
    pub fn map(&self, req: &mut IoRequest) -> MapDisposition {
        match req.kind {
            // A flush applies to the whole device, not a sub-range:
            // redirect past address translation.
            IoKind::Flush => {
                req.device = Some(Arc::clone(&self.dev));
                MapDisposition::Remapped
            }
            IoKind::Discard => self.map_discard(req),
            IoKind::Read | IoKind::Write => {
                let offset = self.target_offset(req.sector);
                req.sector = self.map.map_sector(offset) + self.physical_start;
                req.device = Some(Arc::clone(&self.dev));

                self.counters.dispatched(req.kind);
                debug!(
                    target_name = %self.name,
                    kind = ?req.kind,
                    addr = req.sector << SECTOR_SHIFT,
                    sectors = req.sectors,
                    "remapped"
                );
                MapDisposition::Remapped
            }
        }
    }

    fn map_discard(&self, req: &mut IoRequest) -> MapDisposition {
        let offset = self.target_offset(req.sector);
        match self.map.map_range(offset, req.sectors) {
            Some((begin, len)) => {
                req.sector = begin + self.physical_start;
                req.sectors = len;
                req.device = Some(Arc::clone(&self.dev));
                MapDisposition::Remapped
            }
            // No complete chunk covered: the caller completes the
            // request successfully without touching the device.
            None => MapDisposition::Completed,
        }
    }

    fn target_offset(&self, sector: u64) -> u64 {
        debug_assert!(sector >= self.target_start);
        sector - self.target_start
    }

    // ── Completion & error monitor ───────────────────────────────────────

    /// Account and classify one completion from the backing device.
    ///
    /// The matching pending counter falls first, unconditionally. Errors
    /// are never swallowed or converted, only classified: benign kinds
    /// pass straight through, anything else is counted against the device
    /// and — while the count stays under [`IO_ERROR_THRESHOLD`] — also
    /// schedules the coalesced health event.
    pub fn end_io(&self, req: &IoRequest, result: Result<(), IoError>) -> Result<(), IoError> {
        self.counters.completed(req.kind);

        let Err(err) = result else {
            return Ok(());
        };

        match &err {
            IoError::WouldBlock if req.read_ahead => return Err(err),
            IoError::Unsupported => return Err(err),
            _ => {}
        }

        // Attribute the error to the device that produced it. With a
        // single backing device the identity match is trivially true, but
        // a completion from elsewhere must not poison this device.
        let from_our_device = req
            .device
            .as_ref()
            .is_some_and(|dev| dev.name() == self.dev_name);

        if from_our_device {
            let count = self.error_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count < IO_ERROR_THRESHOLD {
                self.trigger.schedule();
            }
        }

        Err(err)
    }

    // ── Suspend protocol ─────────────────────────────────────────────────

    /// Raise the suspend flag. Idempotent; may be called more than once.
    pub fn presuspend(&self) {
        self.suspended.store(true, Ordering::Release);
    }

    /// Consistency check only: the flag must already be raised.
    pub fn postsuspend(&self) {
        debug_assert!(
            self.suspended.load(Ordering::Acquire),
            "postsuspend without presuspend"
        );
    }

    /// Clear the suspend flag. Also called at device init, so it must not
    /// require the flag to be set.
    pub fn resume(&self) {
        self.suspended.store(false, Ordering::Release);
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    // ── Introspection ────────────────────────────────────────────────────

    /// Render the requested status view.
    pub fn status(&self, mode: StatusMode) -> String {
        let mut out = String::new();
        match mode {
            StatusMode::Info => {
                let snap = self.counters.snapshot();
                write!(
                    out,
                    "\ndestripe[{}] stripes={} idx={}chunk_size={} chunk_size_shift={} phys_size={}",
                    self.name,
                    self.map.stripe_count(),
                    self.map.stripe_index(),
                    self.map.chunk_size(),
                    self.map.chunk_shift().map_or(-1, |s| s as i32),
                    self.physical_size,
                )
                .unwrap();
                write!(
                    out,
                    "\ndestripe[{}] IO Count: TRD: {} ORD: {} TWR: {} OWR: {}",
                    self.name,
                    snap.read_total,
                    snap.read_pending,
                    snap.write_total,
                    snap.write_pending,
                )
                .unwrap();
            }
            StatusMode::Table => {
                // Always one destination device span, whatever the
                // logical stripe count.
                write!(
                    out,
                    "1 {} {} {}",
                    self.map.chunk_size(),
                    self.dev_name,
                    self.physical_start,
                )
                .unwrap();
            }
        }
        out
    }

    /// Runtime command channel: `io_cmd <type> <arg1> <arg2>`, always
    /// four tokens. Reserved extension point; no command is implemented,
    /// so every well-formed or malformed input is rejected.
    pub fn message(&self, args: &[&str]) -> Result<(), MessageError> {
        if args.len() != 4 || args[0] != "io_cmd" {
            warn!(
                target_name = %self.name,
                "invalid command or argument number (need 4 args)"
            );
            return Err(MessageError::InvalidArgument);
        }

        warn!(
            target_name = %self.name,
            "no command currently implemented via message"
        );
        Err(MessageError::InvalidArgument)
    }

    /// Visit the (single) backing device with its mapped span.
    pub fn iterate_devices<F, R>(&self, mut f: F) -> R
    where
        F: FnMut(&Arc<dyn BlockDevice>, u64, u64) -> R,
    {
        f(&self.dev, self.physical_start, self.target_len)
    }

    // ── Tuning hints & merge delegate ────────────────────────────────────

    /// Minimum and optimal I/O granularity, both one chunk.
    pub fn io_hints(&self) -> IoHints {
        let chunk_bytes = (self.map.chunk_size() << SECTOR_SHIFT) as u32;
        IoHints {
            io_min: chunk_bytes,
            io_opt: chunk_bytes,
        }
    }

    /// Largest request the host should submit without splitting, in
    /// sectors. More gets split at chunk boundaries.
    pub fn split_boundary(&self) -> u64 {
        self.map.chunk_size()
    }

    /// Merge-feasibility delegate: translate the candidate address, then
    /// let the backing device's own policy cap the size.
    pub fn merge(&self, sector: u64, max_bytes: u32) -> u32 {
        let mapped = self.map.map_sector(self.target_offset(sector)) + self.physical_start;
        match self.dev.merge_boundary(mapped, max_bytes) {
            Some(allowed) => max_bytes.min(allowed),
            None => max_bytes,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stripe_map(&self) -> &StripeMap {
        &self.map
    }

    pub fn physical_start(&self) -> u64 {
        self.physical_start
    }

    /// Backing capacity required by the whole stripe set, in sectors
    pub fn physical_size(&self) -> u64 {
        self.physical_size
    }

    /// Reported backing device capacity, in sectors
    pub fn physical_secs(&self) -> u64 {
        self.physical_secs
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn counters(&self) -> &IoCounters {
        &self.counters
    }
}

impl std::fmt::Debug for DestripeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestripeTarget")
            .field("name", &self.name)
            .field("map", &self.map)
            .field("dev", &self.dev_name)
            .field("physical_start", &self.physical_start)
            .field("physical_size", &self.physical_size)
            .finish_non_exhaustive()
    }
}

impl Drop for DestripeTarget {
    fn drop(&mut self) {
        info!(target_name = %self.name, "destripe target exiting");
        // The health event references this target; it must run (or be
        // observed absent) before the backing device handle is released.
        self.trigger.drain();
    }
}
