use crate::domain::ports::Storage;
use crate::utils::error::Result;
use chrono::NaiveDateTime;
use std::path::PathBuf;

/// Timestamp layout prefixed to saved uploads.
pub const SAVED_FILENAME_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&full_path, data).await?;
        tracing::debug!(path = %full_path.display(), bytes = data.len(), "Stored upload");
        Ok(())
    }
}

/// Builds the on-disk name for an upload: `YYYYMMDD_HHMMSS_<name>`.
///
/// Only the last path component of the client-supplied name is kept, so a
/// name like `../../etc/passwd` cannot escape the upload directory.
pub fn saved_filename(now: NaiveDateTime, original: &str) -> String {
    format!(
        "{}_{}",
        now.format(SAVED_FILENAME_TIMESTAMP),
        sanitize_filename(original)
    )
}

fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace("..", "");

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string();

    if cleaned.is_empty() || cleaned == "." {
        "upload".to_string()
    } else {
        cleaned
    }
}
