//! Backing-device collaborator seams
//!
//! The host pipeline owns real device handles; the destripe core only
//! needs a name, a capacity query, and an optional merge policy from the
//! one device it redirects to. `DeviceResolver` models opening a device
//! identifier into an addressable handle.

use std::io;
use std::sync::Arc;

/// An addressable backing device.
///
/// The handle is released when the last `Arc` clone drops; the target
/// holds exactly one for its lifetime.
pub trait BlockDevice: Send + Sync {
    /// Stable identifier used in status output and error-source matching
    fn name(&self) -> &str;

    /// Device capacity in sectors
    fn capacity_sectors(&self) -> io::Result<u64>;

    /// Merge-feasibility policy of the device, if it has one: the most
    /// bytes a request ending at `sector` may grow to. `None` means the
    /// device imposes no boundary of its own.
    fn merge_boundary(&self, _sector: u64, _max_bytes: u32) -> Option<u32> {
        None
    }
}

/// Resolves a device identifier to an addressable handle.
pub trait DeviceResolver {
    fn open(&self, name: &str) -> io::Result<Arc<dyn BlockDevice>>;
}
