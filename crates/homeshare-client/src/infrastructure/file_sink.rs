//! Download directory: writes received files without ever overwriting.
//!
//! The sender controls the filename, so it is reduced to its last path
//! component before use.  `../../etc/passwd` becomes `passwd`, and a name
//! that reduces to nothing becomes `download`.  If the name is taken the
//! sink tries `name (1).ext`, `name (2).ext`, ... and creates the file with
//! `create_new`, so two concurrent saves can never pick the same path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::application::ports::{FileSink, SinkError};

/// How many numbered variants are tried before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A [`FileSink`] writing into one directory.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Reduces a sender-supplied name to a safe single file name.
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>();
    let trimmed = last.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The `attempt`-th candidate for `name`: `name` itself, then `stem (n).ext`.
pub fn numbered_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({attempt}){}", &name[..dot], &name[dot..]),
        _ => format!("{name} ({attempt})"),
    }
}

#[async_trait]
impl FileSink for DownloadDir {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, SinkError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SinkError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let name = sanitize_filename(filename);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(numbered_name(&name, attempt));
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(SinkError::Io { path, source }),
            };

            let written = async {
                file.write_all(bytes).await?;
                file.flush().await
            }
            .await;
            return match written {
                Ok(()) => Ok(path),
                Err(source) => Err(SinkError::Io { path, source }),
            };
        }
        Err(SinkError::NoFreeName(name))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
