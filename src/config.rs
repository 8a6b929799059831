use crate::collectors::cpu::CpuSampler;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_cpu_sample_interval_ms")]
    pub cpu_sample_interval_ms: u64,
    #[serde(default)]
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    #[serde(default = "default_cpu_source")]
    pub cpu: CpuSourceConfig,
    #[serde(default)]
    pub pools: CommandSourceConfig,
    #[serde(default)]
    pub updates: CommandSourceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CpuSourceConfig {
    #[serde(default = "default_cpu_policy")]
    pub on_failure: FailurePolicy,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CommandSourceConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

/// What a source failure turns into.
///
/// `Soft` replaces the field with its empty value (null CPU, no pools, zero
/// updates); `Strict` fails the whole snapshot with a request error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Soft,
    Strict,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            public_dir: default_public_dir(),
            command_timeout_ms: default_command_timeout_ms(),
            cpu_sample_interval_ms: default_cpu_sample_interval_ms(),
            sources: SourcesConfig::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu_source(),
            pools: CommandSourceConfig::default(),
            updates: CommandSourceConfig::default(),
        }
    }
}

impl Default for CommandSourceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            on_failure: FailurePolicy::Soft,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        Self::from_yaml(&text, &path_display)
    }

    fn from_yaml(text: &str, path_display: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path_display.to_string(),
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле listen обязательно".to_string(),
            ));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "поле listen должно быть корректным адресом host:port".to_string(),
            ));
        }
        if self.public_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "поле public_dir не должно быть пустым".to_string(),
            ));
        }
        if !(1..=60_000).contains(&self.command_timeout_ms) {
            return Err(ConfigError::Validation(
                "command_timeout_ms должно быть в диапазоне 1..60000".to_string(),
            ));
        }
        if !(default_cpu_sample_interval_ms()..=5_000).contains(&self.cpu_sample_interval_ms) {
            return Err(ConfigError::Validation(
                "cpu_sample_interval_ms должно быть в диапазоне 500..5000".to_string(),
            ));
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        SocketAddr::from_str(&self.listen).map_err(|err| {
            ConfigError::Validation(format!("некорректный адрес listen '{}': {err}", self.listen))
        })
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn cpu_sample_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_sample_interval_ms)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("./public")
}

const fn default_command_timeout_ms() -> u64 {
    5_000
}

const fn default_cpu_sample_interval_ms() -> u64 {
    CpuSampler::MIN_LATENCY.as_millis() as u64
}

const fn default_enabled() -> bool {
    true
}

const fn default_cpu_policy() -> FailurePolicy {
    FailurePolicy::Strict
}

const fn default_cpu_source() -> CpuSourceConfig {
    CpuSourceConfig {
        on_failure: default_cpu_policy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().expect("конфигурация по умолчанию должна быть валидной");
        assert_eq!(cfg.listen, "0.0.0.0:3000");
        assert_eq!(cfg.cpu_sample_interval(), Duration::from_millis(500));
        assert_eq!(cfg.sources.cpu.on_failure, FailurePolicy::Strict);
        assert_eq!(cfg.sources.pools.on_failure, FailurePolicy::Soft);
        assert_eq!(cfg.sources.updates.on_failure, FailurePolicy::Soft);
        assert!(cfg.sources.pools.enabled);
    }

    #[test]
    fn example_yaml_parses() {
        let cfg = Config::from_yaml(Config::example_yaml(), "config.yaml.example")
            .expect("пример конфигурации должен разбираться");
        assert_eq!(cfg.listen, "0.0.0.0:3000");
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "listen: \"127.0.0.1:8080\"\nsources:\n  updates:\n    on_failure: strict\n";
        let cfg = Config::from_yaml(yaml, "inline").expect("разбор");
        assert_eq!(cfg.listen, "127.0.0.1:8080");
        assert_eq!(cfg.command_timeout_ms, 5_000);
        assert_eq!(cfg.sources.updates.on_failure, FailurePolicy::Strict);
        assert!(cfg.sources.updates.enabled);
        assert_eq!(cfg.sources.cpu.on_failure, FailurePolicy::Strict);
    }

    #[test]
    fn rejects_bad_listen() {
        let cfg = Config {
            listen: "localhost".to_string(),
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_out_of_range_timeouts() {
        let cfg = Config {
            command_timeout_ms: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            cpu_sample_interval_ms: 10,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_policy_is_parse_error() {
        let yaml = "sources:\n  pools:\n    on_failure: sometimes\n";
        assert!(matches!(
            Config::from_yaml(yaml, "inline"),
            Err(ConfigError::Parse { .. })
        ));
    }
}
