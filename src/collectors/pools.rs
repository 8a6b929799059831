use crate::collectors::command::CommandRunner;
use crate::collectors::SourceError;
use crate::snapshot::PoolInfo;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

pub const ZPOOL_PROGRAM: &str = "zpool";
pub const ZPOOL_ARGS: [&str; 5] = ["list", "-H", "-p", "-o", "name,size,alloc,free,cap,health"];

/// Lists storage pools through `zpool list` in scripted mode.
///
/// Empty output is a normal answer (no pools on this host). Whether a failed
/// command means "no pools" or an error is decided by the aggregator's policy;
/// `list` itself reports the failure.
#[derive(Clone)]
pub struct PoolLister {
    runner: Arc<dyn CommandRunner>,
}

impl PoolLister {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn list(&self) -> Result<Vec<PoolInfo>, SourceError> {
        let stdout = self.runner.run(ZPOOL_PROGRAM, &ZPOOL_ARGS).await?;
        Ok(parse_pool_list(&stdout))
    }
}

pub fn parse_pool_list(stdout: &str) -> Vec<PoolInfo> {
    let mut seen = HashSet::new();
    let mut pools = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let Some(pool) = parse_pool_line(line) else {
            debug!(line, "skipping malformed zpool line");
            continue;
        };
        if !seen.insert(pool.name.clone()) {
            debug!(pool = %pool.name, "skipping duplicate zpool entry");
            continue;
        }
        pools.push(pool);
    }
    pools
}

fn parse_pool_line(line: &str) -> Option<PoolInfo> {
    let parts: Vec<&str> = line.split('\t').map(str::trim).collect();
    let [name, size, alloc, free, cap, health] = parts.as_slice() else {
        return None;
    };
    if name.is_empty() || health.is_empty() {
        return None;
    }

    Some(PoolInfo {
        name: name.to_string(),
        size_bytes: size.parse().ok()?,
        allocated_bytes: alloc.parse().ok()?,
        free_bytes: free.parse().ok()?,
        capacity_percent: cap.trim_end_matches('%').trim().parse().ok()?,
        health: health.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::command::fake::FakeRunner;

    const TANK: &str = "tank\t3985729650688\t1189979262976\t2795750387712\t29\tONLINE";

    #[test]
    fn parses_scripted_output() {
        let out = format!("{TANK}\nbackup\t1000\t900\t100\t90\tDEGRADED\n");
        let pools = parse_pool_list(&out);
        assert_eq!(pools.len(), 2);
        assert_eq!(
            pools[0],
            PoolInfo {
                name: "tank".to_string(),
                size_bytes: 3_985_729_650_688,
                allocated_bytes: 1_189_979_262_976,
                free_bytes: 2_795_750_387_712,
                capacity_percent: 29,
                health: "ONLINE".to_string(),
            }
        );
        assert_eq!(pools[1].name, "backup");
        assert_eq!(pools[1].health, "DEGRADED");
    }

    #[test]
    fn empty_output_is_no_pools() {
        assert!(parse_pool_list("").is_empty());
        assert!(parse_pool_list("\n  \n").is_empty());
    }

    #[test]
    fn malformed_line_is_dropped() {
        let out = format!("{TANK}\nbroken\t100\t50\t50\tONLINE\n");
        let pools = parse_pool_list(&out);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].name, "tank");
    }

    #[test]
    fn non_numeric_fields_are_dropped() {
        let out = "a\t1.5T\t1\t1\t1\tONLINE\nb\t1\t1\t1\t-\tONLINE\nc\t1\t1\t1\t1\t\n";
        assert!(parse_pool_list(out).is_empty());
    }

    #[test]
    fn capacity_with_percent_sign_is_accepted() {
        let pools = parse_pool_list("tank\t100\t42\t58\t42%\tONLINE\n");
        assert_eq!(pools[0].capacity_percent, 42);
    }

    #[test]
    fn duplicate_names_keep_first() {
        let out = "tank\t1\t1\t0\t100\tONLINE\ntank\t2\t1\t1\t50\tFAULTED\n";
        let pools = parse_pool_list(out);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].health, "ONLINE");
    }

    #[tokio::test]
    async fn list_runs_zpool() {
        let runner = Arc::new(FakeRunner::new().with_stdout("zpool", &format!("{TANK}\n")));
        let lister = PoolLister::new(runner.clone());
        let pools = lister.list().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn list_reports_missing_tool() {
        let lister = PoolLister::new(Arc::new(FakeRunner::new().with_missing("zpool")));
        assert!(matches!(
            lister.list().await,
            Err(SourceError::Unavailable { .. })
        ));
    }
}
