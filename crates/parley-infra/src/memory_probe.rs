//! Host memory statistics for the startup budget.
//!
//! Free/available RAM and free swap come from `sysinfo`. Reclaimable buffers
//! are only exposed by Linux, through the `Buffers:` line of `/proc/meminfo`.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use parley_types::memory::MemoryStats;

const MEMINFO: &str = "/proc/meminfo";

pub struct SystemMemoryProbe {
    sys: System,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        let sys = System::new_with_specifics(
            RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
        );
        Self { sys }
    }

    /// Take a snapshot. `accelerator_free` comes from the model backend.
    pub fn snapshot(&mut self, accelerator_free: Option<u64>) -> MemoryStats {
        self.sys.refresh_memory();

        let stats = MemoryStats {
            host_free: self.sys.free_memory(),
            host_available: self.sys.available_memory(),
            host_buffers: read_buffers(),
            swap_free: self.sys.free_swap(),
            accelerator_free,
        };
        tracing::debug!(?stats, "memory snapshot");
        stats
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

fn read_buffers() -> Option<u64> {
    if !cfg!(target_os = "linux") {
        return None;
    }
    match std::fs::read_to_string(MEMINFO) {
        Ok(text) => parse_buffers(&text),
        Err(err) => {
            tracing::debug!("could not read {MEMINFO}: {err}");
            None
        }
    }
}

/// Value of the `Buffers:` line in bytes. `/proc/meminfo` reports kB.
pub fn parse_buffers(meminfo: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix("Buffers:")?;
        let mut parts = rest.split_whitespace();
        let value: u64 = parts.next()?.parse().ok()?;
        let scale = match parts.next() {
            Some("kB") | Some("KB") => 1024,
            None => 1,
            Some(_) => return None,
        };
        Some(value.saturating_mul(scale))
    })
}
