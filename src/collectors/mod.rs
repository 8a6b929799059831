pub mod command;
pub mod cpu;
pub mod pools;
pub mod updates;
pub mod system;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{program} недоступна: {reason}")]
    Unavailable { program: String, reason: String },
    #[error("{program} не завершилась за {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("ошибка чтения {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать вывод {what}: {reason}")]
    Parse { what: String, reason: String },
}

impl SourceError {
    /// Short label that is safe to show to HTTP clients.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Unavailable { .. } => "source unavailable",
            SourceError::Timeout { .. } => "timeout",
            SourceError::Io { .. } => "source unavailable",
            SourceError::Parse { .. } => "parse failure",
        }
    }
}

/// The three collected fields, used for labels in logs, metrics and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Cpu,
    Pools,
    Updates,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Cpu => "cpu",
            SourceKind::Pools => "pools",
            SourceKind::Updates => "updates",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
