use crate::collectors::cpu::CpuSampler;
use crate::collectors::pools::PoolLister;
use crate::collectors::system::HostProbe;
use crate::collectors::updates::UpdateChecker;
use crate::collectors::{SourceError, SourceKind};
use crate::config::FailurePolicy;
use crate::metrics::Metrics;
use crate::snapshot::{PoolInfo, Snapshot, UpdateInfo};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug)]
pub struct SourceFailure {
    pub source: SourceKind,
    pub error: SourceError,
}

/// Every strict source that failed during one collection.
#[derive(Debug, Error)]
#[error("сбор метрик не удался: {}", describe(.failures))]
pub struct CollectError {
    pub failures: Vec<SourceFailure>,
}

fn describe(failures: &[SourceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.source, f.error.kind()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy)]
pub struct Policies {
    pub cpu: FailurePolicy,
    pub pools: FailurePolicy,
    pub updates: FailurePolicy,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            cpu: FailurePolicy::Strict,
            pools: FailurePolicy::Soft,
            updates: FailurePolicy::Soft,
        }
    }
}

pub struct SnapshotAggregator {
    cpu: CpuSampler,
    pools: Option<PoolLister>,
    updates: Option<UpdateChecker>,
    host: Arc<dyn HostProbe>,
    policies: Policies,
    metrics: Option<Arc<Metrics>>,
}

impl SnapshotAggregator {
    pub fn new(
        cpu: CpuSampler,
        pools: Option<PoolLister>,
        updates: Option<UpdateChecker>,
        host: Arc<dyn HostProbe>,
        policies: Policies,
    ) -> Self {
        Self {
            cpu,
            pools,
            updates,
            host,
            policies,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Collects one fresh snapshot.
    ///
    /// CPU, pools and updates run concurrently and are all awaited; the call
    /// takes at least the CPU quiescence interval. Failures of strict sources
    /// are returned together, soft failures become empty fields.
    pub async fn collect(&self) -> Result<Snapshot, CollectError> {
        let started = Instant::now();

        let (cpu, pools, updates) = tokio::join!(
            self.cpu.sample(),
            async {
                match &self.pools {
                    Some(lister) => lister.list().await,
                    None => Ok(Vec::new()),
                }
            },
            async {
                match &self.updates {
                    Some(checker) => checker.check().await,
                    None => Ok(UpdateInfo::default()),
                }
            },
        );

        let mut failures = Vec::new();
        let cpu_percent = self.settle(SourceKind::Cpu, self.policies.cpu, cpu, &mut failures);
        let pools: Vec<PoolInfo> = self
            .settle(SourceKind::Pools, self.policies.pools, pools, &mut failures)
            .unwrap_or_default();
        let updates = self
            .settle(SourceKind::Updates, self.policies.updates, updates, &mut failures)
            .unwrap_or_default();

        if let Some(metrics) = &self.metrics {
            metrics.observe_collect_duration(started.elapsed());
        }

        if !failures.is_empty() {
            let err = CollectError { failures };
            error!(error = %err, "сбор метрик завершился ошибкой");
            if let Some(metrics) = &self.metrics {
                metrics.inc_collect_failure();
            }
            return Err(err);
        }

        let system = self.host.system_info();
        let snapshot = Snapshot::new(cpu_percent, pools, updates, system, SystemTime::now());
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            pools = snapshot.pools.len(),
            updates = snapshot.updates.total_count,
            "snapshot collected"
        );
        if let Some(metrics) = &self.metrics {
            metrics.update_from_snapshot(&snapshot);
        }
        Ok(snapshot)
    }

    fn settle<T>(
        &self,
        source: SourceKind,
        policy: FailurePolicy,
        result: Result<T, SourceError>,
        failures: &mut Vec<SourceFailure>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_collect_error(source.as_str());
                }
                match policy {
                    FailurePolicy::Soft => {
                        warn!(source = %source, error = %err, "source failed, reporting empty value");
                    }
                    FailurePolicy::Strict => {
                        warn!(source = %source, error = %err, "source failed");
                        failures.push(SourceFailure { source, error: err });
                    }
                }
                None
            }
        }
    }
}
