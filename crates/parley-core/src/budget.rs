//! Accelerator memory budget.
//!
//! The budget is computed once at startup from a [`MemoryStats`] snapshot and
//! never revisited. It bounds how many parameter bytes may be placed on the
//! accelerator and which catalog model is loaded.

use parley_types::memory::MemoryStats;

/// Byte budget for model placement.
///
/// - With an accelerator: whatever the accelerator can hold, provided host
///   memory plus swap could stage it.
/// - Without one, when the host reports reclaimable buffers: available memory
///   minus buffers, as long as swap can absorb them.
/// - Otherwise: keep half of available memory free, counting swap only up to
///   the size of available memory.
pub fn compute_budget(stats: &MemoryStats) -> u64 {
    let budget = match (stats.accelerator_free, stats.host_buffers) {
        (Some(accelerator_free), _) => stats
            .host_free
            .saturating_add(stats.swap_free)
            .min(accelerator_free),
        (None, Some(buffers)) => stats
            .host_available
            .saturating_sub(buffers)
            .saturating_add(stats.swap_free)
            .min(stats.host_available),
        (None, None) => {
            let swap = stats.swap_free.min(stats.host_available);
            stats.host_available.saturating_add(swap) / 2
        }
    };

    tracing::debug!(
        host_free = stats.host_free,
        host_available = stats.host_available,
        host_buffers = ?stats.host_buffers,
        swap_free = stats.swap_free,
        accelerator_free = ?stats.accelerator_free,
        budget,
        "computed memory budget"
    );

    budget
}
