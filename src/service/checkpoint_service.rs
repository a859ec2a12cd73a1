use crate::prelude::*;
use crate::record::CommentRecord;
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, File},
    io::{AsyncWriteExt, BufWriter},
};

/// Overwrites one JSON file with the full record list on every save.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `records`, logging instead of failing. A lost checkpoint is not
    /// worth stopping the run for; the next one rewrites everything anyway.
    pub async fn save(&self, records: &[CommentRecord], is_final: bool) -> bool {
        match self.write(records).await {
            Ok(()) => {
                if is_final {
                    tracing::info!(
                        count = records.len(),
                        path = %self.path.display(),
                        "Saved comments"
                    );
                } else {
                    tracing::debug!(
                        count = records.len(),
                        path = %self.path.display(),
                        "Checkpointed comments"
                    );
                }
                true
            }
            Err(e) => {
                tracing::error!("Failed to save comments to {}: {:#}", self.path.display(), e);
                false
            }
        }
    }

    /// Write through a sibling temp file and rename it into place so the
    /// destination always holds a complete document.
    pub async fn write(&self, records: &[CommentRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("could not create {}", parent.display()))?;
        }

        let mut body = serde_json::to_vec_pretty(records)?;
        body.push(b'\n');

        let tmp_path = self.tmp_path()?;
        let mut file = BufWriter::new(
            File::create(&tmp_path)
                .await
                .with_context(|| format!("could not create {}", tmp_path.display()))?,
        );
        file.write_all(&body).await?;
        file.flush().await?;
        drop(file);

        fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("could not move checkpoint into {}", self.path.display()))?;

        Ok(())
    }

    pub async fn load(&self) -> Result<Vec<CommentRecord>> {
        let raw = fs::read(&self.path)
            .await
            .with_context(|| format!("could not open {}", self.path.display()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn tmp_path(&self) -> Result<PathBuf> {
        let mut name = match self.path.file_name() {
            Some(name) => name.to_os_string(),
            None => {
                let err = format!("Checkpoint path has no file name: {}", self.path.display());
                tracing::error!("{}", err);
                return Err(anyhow!(err));
            }
        };
        name.push(".tmp");
        Ok(self.path.with_file_name(name))
    }
}
