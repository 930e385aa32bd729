//! Static host description: CPU model and core counts.

use sysinfo::System;

pub trait SystemInfo: Send + Sync {
    fn cpu_model_name(&self) -> String;
    fn logical_core_count(&self) -> usize;
    fn physical_core_count(&self) -> usize;
}

/// `"16 Threads (8 Cores)"`
pub fn cores_summary(info: &dyn SystemInfo) -> String {
    format!(
        "{} Threads ({} Cores)",
        info.logical_core_count(),
        info.physical_core_count()
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HostSystemInfo;

impl SystemInfo for HostSystemInfo {
    fn cpu_model_name(&self) -> String {
        let mut system = System::new();
        system.refresh_cpu_all();
        system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "N/A".to_string())
    }

    fn logical_core_count(&self) -> usize {
        num_cpus::get()
    }

    fn physical_core_count(&self) -> usize {
        num_cpus::get_physical()
    }
}

/// Fixed description, for pinning a run to a chosen worker count.
#[derive(Debug, Clone)]
pub struct FixedSystemInfo {
    pub model: String,
    pub logical: usize,
    pub physical: usize,
}

impl FixedSystemInfo {
    pub fn with_cores(logical: usize) -> Self {
        Self {
            model: "N/A".to_string(),
            logical,
            physical: logical,
        }
    }
}

impl SystemInfo for FixedSystemInfo {
    fn cpu_model_name(&self) -> String {
        self.model.clone()
    }

    fn logical_core_count(&self) -> usize {
        self.logical
    }

    fn physical_core_count(&self) -> usize {
        self.physical
    }
}
