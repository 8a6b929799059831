use crate::snapshot::Snapshot;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started_at: Instant,
    pub agent_stats_requests_total: Counter,
    pub agent_collect_errors_total: CounterVec,
    pub agent_collect_failures_total: Counter,
    pub agent_collect_duration_seconds: Gauge,
    pub agent_last_collect_timestamp_seconds: Gauge,
    pub agent_cpu_usage_percent: GaugeVec,
    pub agent_ram_total_bytes: Gauge,
    pub agent_ram_free_bytes: Gauge,
    pub agent_pool_size_bytes: GaugeVec,
    pub agent_pool_allocated_bytes: GaugeVec,
    pub agent_pool_free_bytes: GaugeVec,
    pub agent_pool_capacity_percent: GaugeVec,
    pub agent_pool_healthy: GaugeVec,
    pub agent_pool_count: Gauge,
    pub agent_updates_total: Gauge,
    pub agent_updates_security: Gauge,
    pub agent_uptime_seconds: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let agent_stats_requests_total = Counter::with_opts(opts!(
            "agent_stats_requests_total",
            "Number of /api/stats requests served"
        ))?;
        let agent_collect_errors_total = CounterVec::new(
            opts!(
                "agent_collect_errors_total",
                "Source failures by source, soft and strict"
            ),
            &["source"],
        )?;
        let agent_collect_failures_total = Counter::with_opts(opts!(
            "agent_collect_failures_total",
            "Snapshots that failed as a whole and were answered with HTTP 500"
        ))?;
        let agent_collect_duration_seconds = Gauge::with_opts(opts!(
            "agent_collect_duration_seconds",
            "Duration of the last snapshot collection in seconds"
        ))?;
        let agent_last_collect_timestamp_seconds = Gauge::with_opts(opts!(
            "agent_last_collect_timestamp_seconds",
            "Unix time of the last successful snapshot"
        ))?;
        // Unlabelled vec so the series can be dropped when the snapshot has no CPU value.
        let agent_cpu_usage_percent = GaugeVec::new(
            opts!(
                "agent_cpu_usage_percent",
                "CPU usage in percent (0..100) from the last snapshot"
            ),
            &[],
        )?;
        let agent_ram_total_bytes =
            Gauge::with_opts(opts!("agent_ram_total_bytes", "Total RAM in bytes"))?;
        let agent_ram_free_bytes =
            Gauge::with_opts(opts!("agent_ram_free_bytes", "Available RAM in bytes"))?;
        let agent_pool_size_bytes = GaugeVec::new(
            opts!("agent_pool_size_bytes", "Storage pool size in bytes"),
            &["pool"],
        )?;
        let agent_pool_allocated_bytes = GaugeVec::new(
            opts!(
                "agent_pool_allocated_bytes",
                "Storage pool allocated bytes"
            ),
            &["pool"],
        )?;
        let agent_pool_free_bytes = GaugeVec::new(
            opts!("agent_pool_free_bytes", "Storage pool free bytes"),
            &["pool"],
        )?;
        let agent_pool_capacity_percent = GaugeVec::new(
            opts!(
                "agent_pool_capacity_percent",
                "Storage pool capacity in percent"
            ),
            &["pool"],
        )?;
        let agent_pool_healthy = GaugeVec::new(
            opts!(
                "agent_pool_healthy",
                "1 if the pool reports ONLINE, 0 otherwise"
            ),
            &["pool", "health"],
        )?;
        let agent_pool_count =
            Gauge::with_opts(opts!("agent_pool_count", "Number of storage pools"))?;
        let agent_updates_total = Gauge::with_opts(opts!(
            "agent_updates_total",
            "Number of upgradable packages"
        ))?;
        let agent_updates_security = Gauge::with_opts(opts!(
            "agent_updates_security",
            "Number of upgradable packages from security suites"
        ))?;
        let agent_uptime_seconds =
            Gauge::with_opts(opts!("agent_uptime_seconds", "Agent uptime in seconds"))?;

        register(&registry, &agent_stats_requests_total)?;
        register(&registry, &agent_collect_errors_total)?;
        register(&registry, &agent_collect_failures_total)?;
        register(&registry, &agent_collect_duration_seconds)?;
        register(&registry, &agent_last_collect_timestamp_seconds)?;
        register(&registry, &agent_cpu_usage_percent)?;
        register(&registry, &agent_ram_total_bytes)?;
        register(&registry, &agent_ram_free_bytes)?;
        register(&registry, &agent_pool_size_bytes)?;
        register(&registry, &agent_pool_allocated_bytes)?;
        register(&registry, &agent_pool_free_bytes)?;
        register(&registry, &agent_pool_capacity_percent)?;
        register(&registry, &agent_pool_healthy)?;
        register(&registry, &agent_pool_count)?;
        register(&registry, &agent_updates_total)?;
        register(&registry, &agent_updates_security)?;
        register(&registry, &agent_uptime_seconds)?;

        Ok(Arc::new(Self {
            registry,
            started_at: Instant::now(),
            agent_stats_requests_total,
            agent_collect_errors_total,
            agent_collect_failures_total,
            agent_collect_duration_seconds,
            agent_last_collect_timestamp_seconds,
            agent_cpu_usage_percent,
            agent_ram_total_bytes,
            agent_ram_free_bytes,
            agent_pool_size_bytes,
            agent_pool_allocated_bytes,
            agent_pool_free_bytes,
            agent_pool_capacity_percent,
            agent_pool_healthy,
            agent_pool_count,
            agent_updates_total,
            agent_updates_security,
            agent_uptime_seconds,
        }))
    }

    pub fn update_from_snapshot(&self, snapshot: &Snapshot) {
        match snapshot.cpu_percent {
            Some(cpu) => self
                .agent_cpu_usage_percent
                .with_label_values(&[])
                .set(cpu as f64),
            None => self.agent_cpu_usage_percent.reset(),
        }
        self.agent_ram_total_bytes
            .set(snapshot.system.ram_total_bytes as f64);
        self.agent_ram_free_bytes
            .set(snapshot.system.ram_free_bytes as f64);
        self.agent_updates_total
            .set(snapshot.updates.total_count as f64);
        self.agent_updates_security
            .set(snapshot.updates.security_count as f64);
        let collected_unix = snapshot
            .collected_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.agent_last_collect_timestamp_seconds
            .set(collected_unix);

        self.agent_pool_size_bytes.reset();
        self.agent_pool_allocated_bytes.reset();
        self.agent_pool_free_bytes.reset();
        self.agent_pool_capacity_percent.reset();
        self.agent_pool_healthy.reset();
        self.agent_pool_count.set(snapshot.pools.len() as f64);

        for p in &snapshot.pools {
            self.agent_pool_size_bytes
                .with_label_values(&[&p.name])
                .set(p.size_bytes as f64);
            self.agent_pool_allocated_bytes
                .with_label_values(&[&p.name])
                .set(p.allocated_bytes as f64);
            self.agent_pool_free_bytes
                .with_label_values(&[&p.name])
                .set(p.free_bytes as f64);
            self.agent_pool_capacity_percent
                .with_label_values(&[&p.name])
                .set(p.capacity_percent as f64);
            self.agent_pool_healthy
                .with_label_values(&[&p.name, &p.health])
                .set(if p.is_online() { 1.0 } else { 0.0 });
        }
    }

    pub fn inc_stats_request(&self) {
        self.agent_stats_requests_total.inc();
    }

    pub fn inc_collect_error(&self, source: &str) {
        self.agent_collect_errors_total
            .with_label_values(&[source])
            .inc();
    }

    pub fn inc_collect_failure(&self) {
        self.agent_collect_failures_total.inc();
    }

    pub fn observe_collect_duration(&self, elapsed: Duration) {
        self.agent_collect_duration_seconds
            .set(elapsed.as_secs_f64());
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.agent_uptime_seconds
            .set(self.started_at.elapsed().as_secs() as f64);

        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{PoolInfo, SystemInfo, UpdateInfo};
    use std::time::SystemTime;

    fn snapshot(pools: Vec<PoolInfo>) -> Snapshot {
        snapshot_with_cpu(Some(37), pools)
    }

    fn snapshot_with_cpu(cpu_percent: Option<u8>, pools: Vec<PoolInfo>) -> Snapshot {
        Snapshot::new(
            cpu_percent,
            pools,
            UpdateInfo {
                total_count: 4,
                security_count: 1,
                security_package_names: vec!["openssl".to_string()],
            },
            SystemInfo {
                hostname: "nas".to_string(),
                uptime_seconds: 10,
                load_average: [0.0, 0.0, 0.0],
                ram_total_bytes: 2048,
                ram_free_bytes: 1024,
            },
            SystemTime::now(),
        )
    }

    fn text(metrics: &Metrics) -> String {
        String::from_utf8(metrics.encode_metrics().unwrap()).unwrap()
    }

    #[test]
    fn exports_snapshot_values() {
        let metrics = Metrics::new().expect("инициализация метрик");
        metrics.update_from_snapshot(&snapshot(vec![PoolInfo {
            name: "tank".to_string(),
            size_bytes: 100,
            allocated_bytes: 30,
            free_bytes: 70,
            capacity_percent: 30,
            health: "DEGRADED".to_string(),
        }]));

        let out = text(&metrics);
        assert!(out.contains("agent_cpu_usage_percent 37"));
        assert!(out.contains("agent_updates_security 1"));
        assert!(out.contains("agent_pool_capacity_percent{pool=\"tank\"} 30"));
        assert!(out.contains("agent_pool_healthy{health=\"DEGRADED\",pool=\"tank\"} 0"));
        assert!(out.contains("agent_uptime_seconds"));
    }

    #[test]
    fn vanished_pools_are_dropped() {
        let metrics = Metrics::new().expect("инициализация метрик");
        metrics.update_from_snapshot(&snapshot(vec![PoolInfo {
            name: "old".to_string(),
            size_bytes: 1,
            allocated_bytes: 0,
            free_bytes: 1,
            capacity_percent: 0,
            health: "ONLINE".to_string(),
        }]));
        metrics.update_from_snapshot(&snapshot(Vec::new()));

        let out = text(&metrics);
        assert!(!out.contains("pool=\"old\""));
        assert!(out.contains("agent_pool_count 0"));
    }

    #[test]
    fn missing_cpu_value_drops_series() {
        let metrics = Metrics::new().expect("инициализация метрик");
        metrics.update_from_snapshot(&snapshot(Vec::new()));
        assert!(text(&metrics).contains("agent_cpu_usage_percent 37"));

        metrics.update_from_snapshot(&snapshot_with_cpu(None, Vec::new()));
        let out = text(&metrics);
        assert!(
            !out.lines().any(|l| l.starts_with("agent_cpu_usage_percent")),
            "{out}"
        );
        assert!(out.contains("agent_updates_total 4"));
    }

    #[test]
    fn counts_errors_by_source() {
        let metrics = Metrics::new().expect("инициализация метрик");
        metrics.inc_collect_error("pools");
        metrics.inc_collect_error("pools");
        metrics.inc_collect_failure();

        let out = text(&metrics);
        assert!(out.contains("agent_collect_errors_total{source=\"pools\"} 2"));
        assert!(out.contains("agent_collect_failures_total 1"));
    }
}
