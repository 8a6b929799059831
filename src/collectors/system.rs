use crate::snapshot::SystemInfo;
use sysinfo::{System, SystemExt};

/// Cheap, synchronous host facts. Never fails; missing values fall back.
pub trait HostProbe: Send + Sync {
    fn system_info(&self) -> SystemInfo;
}

#[derive(Debug, Clone, Default)]
pub struct SysinfoHost;

impl HostProbe for SysinfoHost {
    fn system_info(&self) -> SystemInfo {
        let mut system = System::new();
        system.refresh_memory();

        let load = system.load_average();
        let ram_total_bytes = system.total_memory();

        SystemInfo {
            hostname: system.host_name().unwrap_or_else(|| "unknown".to_string()),
            uptime_seconds: system.uptime(),
            load_average: [
                round_load(load.one),
                round_load(load.five),
                round_load(load.fifteen),
            ],
            ram_total_bytes,
            ram_free_bytes: system.available_memory().min(ram_total_bytes),
        }
    }
}

fn round_load(value: f64) -> f64 {
    if !value.is_finite() || value < 0.0 {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}
