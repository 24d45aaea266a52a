//! I/O request model
//!
//! The host pipeline hands each request to [`DestripeTarget::map`] for
//! in-place rewriting of its target device and address, then either
//! forwards it to the backing device or completes it locally, depending
//! on the returned [`MapDisposition`].
//!
//! [`DestripeTarget::map`]: crate::target::DestripeTarget::map

use std::sync::Arc;

use crate::device::BlockDevice;

/// Request category, driving the dispatch state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Read,
    Write,
    /// Applies to the whole device; bypasses address translation
    Flush,
    /// Range-mapped; may complete without reaching the device
    Discard,
}

/// One block I/O request.
///
/// `sector`/`sectors` arrive in the virtual target's address space and
/// are rewritten in place to the backing device's address space;
/// `device` is set to the redirect destination at the same time.
pub struct IoRequest {
    pub kind: IoKind,
    /// Start sector; logical before `map()`, physical after
    pub sector: u64,
    /// Request length in sectors
    pub sectors: u64,
    /// Read-ahead requests get lenient error treatment on completion
    pub read_ahead: bool,
    /// Redirect destination, set by `map()`
    pub device: Option<Arc<dyn BlockDevice>>,
}

impl IoRequest {
    pub fn read(sector: u64, sectors: u64) -> Self {
        Self::new(IoKind::Read, sector, sectors)
    }

    pub fn write(sector: u64, sectors: u64) -> Self {
        Self::new(IoKind::Write, sector, sectors)
    }

    pub fn flush() -> Self {
        Self::new(IoKind::Flush, 0, 0)
    }

    pub fn discard(sector: u64, sectors: u64) -> Self {
        Self::new(IoKind::Discard, sector, sectors)
    }

    fn new(kind: IoKind, sector: u64, sectors: u64) -> Self {
        Self {
            kind,
            sector,
            sectors,
            read_ahead: false,
            device: None,
        }
    }

    pub fn with_read_ahead(mut self) -> Self {
        self.read_ahead = true;
        self
    }
}

/// What the dispatcher did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapDisposition {
    /// Rewritten in place; forward to the backing device
    Remapped,
    /// Completed here (successfully); do not forward
    Completed,
}
