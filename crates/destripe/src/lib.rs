//! Destripe — reverse-striping block address mapping
//!
//! Presents a virtual linear block address space and translates every
//! logical sector into the physical sector it would have occupied had it
//! been one stripe of an N-way striped volume, then redirects the I/O to
//! the single real device holding that stripe. One stripe can thus be
//! extracted and accessed independently, as if the striped volume never
//! existed from that stripe's point of view.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   Host pipeline  │  (dispatches requests, drives lifecycle)
//! └────────┬─────────┘
//!          │ map() / end_io()
//! ┌────────▼─────────┐
//! │  DestripeTarget  │
//! │  - StripeMap     │  logical sector → physical sector
//! │  - IoCounters    │  live dispatch/completion accounting
//! │  - HealthTrigger │  coalesced device-health events
//! └────────┬─────────┘
//!          │ rewritten sector + device
//! ┌────────▼─────────┐
//! │  BlockDevice     │  (single backing device)
//! └──────────────────┘
//! ```
//!
//! This is not a RAID engine: there is no redundancy, no parity, no
//! rebuild, and no data movement — only address and request translation.

pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod map;
pub mod request;
pub mod stats;
pub mod target;

pub use config::{DestripeArgs, NAME_MAXLEN, TargetParams, parse_args};
pub use device::{BlockDevice, DeviceResolver};
pub use error::{ConstructError, IoError, MessageError};
pub use event::{EventSink, HealthTrigger, ThreadWorkqueue, Workqueue};
pub use map::StripeMap;
pub use request::{IoKind, IoRequest, MapDisposition};
pub use stats::{CounterSnapshot, IoCounters};
pub use target::{DestripeTarget, IoHints, StatusMode};

/// Sector size in bytes (standard 512-byte sectors)
pub const SECTOR_SIZE: u64 = 512;

/// log2 of the sector size
pub const SECTOR_SHIFT: u32 = 9;

/// Memory page size assumed when validating chunk sizes
pub const PAGE_SIZE: u64 = 4096;

/// Minimum chunk size in sectors (one page worth)
pub const MIN_CHUNK_SECTORS: u64 = PAGE_SIZE >> SECTOR_SHIFT;

/// Errors counted against a backing device before health-event
/// notifications are suppressed (the errors themselves keep counting
/// and keep being returned to the caller).
pub const IO_ERROR_THRESHOLD: u64 = 15;
