use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StaticError {
    #[error("доступ запрещён")]
    Forbidden,
    #[error("файл не найден")]
    NotFound,
}

/// Public root resolved once at startup.
#[derive(Debug, Clone)]
pub struct PublicRoot {
    root: PathBuf,
}

impl PublicRoot {
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: dir.as_ref().canonicalize()?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Maps a request path to a file inside the root.
    ///
    /// `..` that climbs above the root and any canonical path (after symlinks)
    /// outside it are forbidden; containment is checked per component, so a
    /// sibling such as `public-old` never matches `public`.
    pub async fn resolve(&self, request_path: &str) -> Result<PathBuf, StaticError> {
        let decoded = urlencoding::decode(request_path).map_err(|_| StaticError::Forbidden)?;
        if decoded.contains('\0') {
            return Err(StaticError::Forbidden);
        }

        let relative = match decoded.trim_start_matches('/') {
            "" => "index.html",
            other => other,
        };

        let mut normalized = PathBuf::new();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(StaticError::Forbidden);
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(StaticError::Forbidden),
            }
        }

        let candidate = self.root.join(&normalized);
        let canonical = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(fs_error)?;
        if !canonical.starts_with(&self.root) {
            return Err(StaticError::Forbidden);
        }
        let metadata = tokio::fs::metadata(&canonical).await.map_err(fs_error)?;
        if !metadata.is_file() {
            return Err(StaticError::NotFound);
        }
        Ok(canonical)
    }

    pub async fn read(&self, request_path: &str) -> Result<(Vec<u8>, &'static str), StaticError> {
        let path = self.resolve(request_path).await?;
        let bytes = tokio::fs::read(&path).await.map_err(fs_error)?;
        Ok((bytes, content_type_for(&path)))
    }
}

fn fs_error(err: io::Error) -> StaticError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => StaticError::Forbidden,
        _ => StaticError::NotFound,
    }
}

pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") | Some("mjs") => "application/javascript",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "text/plain",
    }
}
