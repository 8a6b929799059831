use crate::collectors::command::CommandRunner;
use crate::collectors::SourceError;
use crate::snapshot::{UpdateInfo, MAX_SECURITY_PACKAGE_NAMES};
use std::sync::Arc;

pub const APT_PROGRAM: &str = "apt";
pub const APT_ARGS: [&str; 2] = ["list", "--upgradable"];

const PACKAGE_SEPARATOR: char = '/';
const SECURITY_MARKER: &str = "security";

#[derive(Clone)]
pub struct UpdateChecker {
    runner: Arc<dyn CommandRunner>,
}

impl UpdateChecker {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn check(&self) -> Result<UpdateInfo, SourceError> {
        let stdout = self.runner.run(APT_PROGRAM, &APT_ARGS).await?;
        Ok(parse_upgradable(&stdout))
    }
}

/// Counts `apt list --upgradable` entries.
///
/// Package lines look like `name/suite version arch [upgradable from: ...]`;
/// the `Listing...` banner has no `/` and is ignored.
pub fn parse_upgradable(stdout: &str) -> UpdateInfo {
    let packages: Vec<&str> = stdout
        .lines()
        .filter(|l| l.contains(PACKAGE_SEPARATOR))
        .collect();
    let security: Vec<&str> = packages
        .iter()
        .copied()
        .filter(|l| l.contains(SECURITY_MARKER))
        .collect();

    let security_package_names = security
        .iter()
        .take(MAX_SECURITY_PACKAGE_NAMES)
        .filter_map(|l| l.split(PACKAGE_SEPARATOR).next())
        .map(|name| name.trim().to_string())
        .collect();

    UpdateInfo {
        total_count: packages.len() as u64,
        security_count: security.len() as u64,
        security_package_names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::command::fake::FakeRunner;

    const SAMPLE: &str = "Listing... Done
libssl3/jammy-security 3.0.2-0ubuntu1.15 amd64 [upgradable from: 3.0.2-0ubuntu1.14]
curl/jammy-updates 7.81.0-1ubuntu1.16 amd64 [upgradable from: 7.81.0-1ubuntu1.15]
openssl/jammy-security 3.0.2-0ubuntu1.15 amd64 [upgradable from: 3.0.2-0ubuntu1.14]
";

    #[test]
    fn counts_total_and_security() {
        let info = parse_upgradable(SAMPLE);
        assert_eq!(info.total_count, 3);
        assert_eq!(info.security_count, 2);
        assert_eq!(info.security_package_names, vec!["libssl3", "openssl"]);
    }

    #[test]
    fn empty_output_is_zero() {
        assert_eq!(parse_upgradable(""), UpdateInfo::default());
        assert_eq!(parse_upgradable("Listing... Done\n"), UpdateInfo::default());
    }

    #[test]
    fn security_names_are_capped_in_source_order() {
        let mut out = String::from("Listing... Done\n");
        for i in 0..25 {
            out.push_str(&format!("pkg{i}/stable-security 1.{i} amd64\n"));
        }
        out.push_str("other/stable 2.0 amd64\n");

        let info = parse_upgradable(&out);
        assert_eq!(info.total_count, 26);
        assert_eq!(info.security_count, 25);
        assert_eq!(info.security_package_names.len(), MAX_SECURITY_PACKAGE_NAMES);
        assert_eq!(info.security_package_names[0], "pkg0");
        assert_eq!(info.security_package_names[19], "pkg19");
    }

    #[tokio::test]
    async fn check_runs_apt() {
        let runner = Arc::new(FakeRunner::new().with_stdout("apt", SAMPLE));
        let info = UpdateChecker::new(runner).check().await.unwrap();
        assert_eq!(info.total_count, 3);
    }

    #[tokio::test]
    async fn check_reports_timeout() {
        let runner = Arc::new(FakeRunner::new().with_timeout("apt"));
        assert!(matches!(
            UpdateChecker::new(runner).check().await,
            Err(SourceError::Timeout { .. })
        ));
    }
}
