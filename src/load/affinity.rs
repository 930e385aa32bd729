//! Best-effort CPU pinning for load workers.

use core_affinity::{CoreId, get_core_ids, set_for_current};

pub trait AffinityControl: Send + Sync {
    /// Pins the calling thread to `core_index`. Returns `false` when the
    /// platform refuses or no cores are known.
    fn pin_current_thread(&self, core_index: usize) -> bool;
}

/// Pins through `core_affinity`. Out-of-range indices fall back to the last core.
#[derive(Debug, Clone, Default)]
pub struct CoreAffinity {
    cores: Vec<CoreId>,
}

impl CoreAffinity {
    pub fn detect() -> Self {
        Self {
            cores: get_core_ids().unwrap_or_default(),
        }
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }
}

impl AffinityControl for CoreAffinity {
    fn pin_current_thread(&self, core_index: usize) -> bool {
        let Some(last) = self.cores.len().checked_sub(1) else {
            return false;
        };
        set_for_current(self.cores[core_index.min(last)])
    }
}

/// Leaves scheduling entirely to the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAffinity;

impl AffinityControl for NoAffinity {
    fn pin_current_thread(&self, _core_index: usize) -> bool {
        false
    }
}
