//! Raw reply persistence for audit and debugging

use std::path::{Path, PathBuf};

use tokio::fs;

/// Writes one raw read reply per device into a directory
#[derive(Debug, Clone)]
pub struct AuditSink {
    dir: PathBuf,
}

impl AuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File the reply for `host` is stored in
    pub fn path_for(&self, host: &str) -> PathBuf {
        let name: String = host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}_running.xml", name))
    }

    /// Store `document`, replacing the previous reply for `host`.
    pub async fn record(&self, host: &str, document: &str) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(host);
        fs::write(&path, document).await?;
        Ok(path)
    }
}
