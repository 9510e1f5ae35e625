//! Memory statistics snapshot used to size accelerator placement.

use serde::{Deserialize, Serialize};

/// Point-in-time memory statistics, all in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Host memory not used by anything.
    pub host_free: u64,
    /// Host memory available to new allocations without swapping.
    pub host_available: u64,
    /// Reclaimable kernel buffers, when the platform reports them.
    pub host_buffers: Option<u64>,
    pub swap_free: u64,
    /// Free accelerator memory, `None` when there is no accelerator.
    pub accelerator_free: Option<u64>,
}

impl MemoryStats {
    pub fn has_accelerator(&self) -> bool {
        self.accelerator_free.is_some()
    }
}
