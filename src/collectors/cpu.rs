use crate::collectors::SourceError;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Parses the aggregate `cpu` line of `/proc/stat`.
    ///
    /// Idle time is `idle + iowait`; total is the sum of every counter on the line.
    pub fn parse_stat_line(line: &str) -> Result<Self, SourceError> {
        let mut fields = line.split_whitespace();
        match fields.next() {
            Some("cpu") => {}
            _ => {
                return Err(SourceError::Parse {
                    what: "/proc/stat".to_string(),
                    reason: "нет агрегированной строки cpu".to_string(),
                })
            }
        }

        let values = fields
            .map(|v| {
                v.parse::<u64>().map_err(|_| SourceError::Parse {
                    what: "/proc/stat".to_string(),
                    reason: format!("нечисловой счётчик '{v}'"),
                })
            })
            .collect::<Result<Vec<u64>, _>>()?;
        if values.len() < 4 {
            return Err(SourceError::Parse {
                what: "/proc/stat".to_string(),
                reason: format!("ожидалось минимум 4 счётчика, получено {}", values.len()),
            });
        }

        let idle = values[3].saturating_add(values.get(4).copied().unwrap_or(0));
        let total = values.iter().fold(0_u64, |acc, v| acc.saturating_add(*v));
        Ok(Self { idle, total })
    }
}

/// Usage between two readings, rounded to a whole percent.
pub fn usage_percent(before: CpuTimes, after: CpuTimes) -> u8 {
    let total_delta = after.total.saturating_sub(before.total);
    if total_delta == 0 {
        return 0;
    }
    let idle_delta = after.idle.saturating_sub(before.idle).min(total_delta);
    let busy = 1.0 - (idle_delta as f64 / total_delta as f64);
    (busy * 100.0).round().clamp(0.0, 100.0) as u8
}

pub trait CpuCounters: Send + Sync {
    fn read(&self) -> Result<CpuTimes, SourceError>;
}

#[derive(Debug, Clone)]
pub struct ProcStat {
    path: PathBuf,
}

impl ProcStat {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from("/proc/stat"),
        }
    }
}

impl Default for ProcStat {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuCounters for ProcStat {
    fn read(&self) -> Result<CpuTimes, SourceError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let line = content.lines().next().unwrap_or_default();
        CpuTimes::parse_stat_line(line)
    }
}

/// Two-point CPU sampler.
///
/// Every call to [`CpuSampler::sample`] suspends for the whole quiescence
/// interval (500 ms by default) between the two counter reads; the wait is a
/// timer, so other collectors and requests keep running meanwhile.
#[derive(Clone)]
pub struct CpuSampler {
    counters: Arc<dyn CpuCounters>,
    interval: Duration,
}

impl CpuSampler {
    pub const MIN_LATENCY: Duration = Duration::from_millis(500);

    pub fn with_interval(counters: Arc<dyn CpuCounters>, interval: Duration) -> Self {
        Self { counters, interval }
    }

    pub async fn sample(&self) -> Result<u8, SourceError> {
        let before = self.counters.read()?;
        tokio::time::sleep(self.interval).await;
        let after = self.counters.read()?;

        let usage = usage_percent(before, after);
        debug!(
            idle_delta = after.idle.saturating_sub(before.idle),
            total_delta = after.total.saturating_sub(before.total),
            usage,
            "cpu sampled"
        );
        Ok(usage)
    }
}
