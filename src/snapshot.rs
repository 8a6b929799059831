use serde::Serialize;
use std::time::SystemTime;

pub const MAX_SECURITY_PACKAGE_NAMES: usize = 20;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub cpu_percent: Option<u8>,
    pub pools: Vec<PoolInfo>,
    pub updates: UpdateInfo,
    pub system: SystemInfo,
    pub timestamp: String,
    #[serde(skip)]
    pub collected_at: SystemTime,
}

impl Snapshot {
    pub fn new(
        cpu_percent: Option<u8>,
        pools: Vec<PoolInfo>,
        updates: UpdateInfo,
        system: SystemInfo,
        collected_at: SystemTime,
    ) -> Self {
        Self {
            cpu_percent,
            pools,
            updates,
            system,
            timestamp: humantime::format_rfc3339_millis(collected_at).to_string(),
            collected_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub name: String,
    pub size_bytes: u64,
    pub allocated_bytes: u64,
    pub free_bytes: u64,
    pub capacity_percent: u32,
    pub health: String,
}

impl PoolInfo {
    pub fn is_online(&self) -> bool {
        self.health.eq_ignore_ascii_case("ONLINE")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub total_count: u64,
    pub security_count: u64,
    pub security_package_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub hostname: String,
    pub uptime_seconds: u64,
    pub load_average: [f64; 3],
    pub ram_total_bytes: u64,
    pub ram_free_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn system() -> SystemInfo {
        SystemInfo {
            hostname: "nas".to_string(),
            uptime_seconds: 42,
            load_average: [0.5, 0.25, 0.1],
            ram_total_bytes: 1024,
            ram_free_bytes: 512,
        }
    }

    #[test]
    fn serializes_camel_case_with_null_cpu() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        let snapshot = Snapshot::new(None, Vec::new(), UpdateInfo::default(), system(), at);
        let value = serde_json::to_value(&snapshot).unwrap();

        assert!(value["cpuPercent"].is_null());
        assert_eq!(value["pools"], serde_json::json!([]));
        assert_eq!(value["updates"]["totalCount"], 0);
        assert_eq!(value["updates"]["securityPackageNames"], serde_json::json!([]));
        assert_eq!(value["system"]["ramFreeBytes"], 512);
        assert_eq!(value["system"]["loadAverage"][0], 0.5);
        assert_eq!(value["timestamp"], "2023-11-14T22:13:20.123Z");
        assert!(value.get("collectedAt").is_none());
    }

    #[test]
    fn pool_fields_use_byte_suffixes() {
        let pool = PoolInfo {
            name: "tank".to_string(),
            size_bytes: 100,
            allocated_bytes: 40,
            free_bytes: 60,
            capacity_percent: 40,
            health: "ONLINE".to_string(),
        };
        let value = serde_json::to_value(&pool).unwrap();
        assert_eq!(value["sizeBytes"], 100);
        assert_eq!(value["allocatedBytes"], 40);
        assert_eq!(value["capacityPercent"], 40);
        assert!(pool.is_online());
    }
}
