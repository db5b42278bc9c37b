//! The scratch store and per-job workspace.

use fabula_core::JobId;
use fabula_error::{FabulaResult, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the promoted final video.
pub const FINAL_VIDEO_NAME: &str = "final.mp4";

/// Factory for per-job scratch workspaces.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    scratch_base: PathBuf,
    videos_base: PathBuf,
}

impl ScratchStore {
    /// Create a store rooted at the given base directories.
    pub fn new(scratch_base: impl Into<PathBuf>, videos_base: impl Into<PathBuf>) -> Self {
        Self {
            scratch_base: scratch_base.into(),
            videos_base: videos_base.into(),
        }
    }

    /// Open (idempotently create) the workspace for a job.
    #[tracing::instrument(skip(self))]
    pub async fn open(&self, job_id: JobId) -> FabulaResult<JobScratch> {
        let root = self.scratch_base.join(job_id.to_string());
        for subtree in ["images", "audio", "temp"] {
            let dir = root.join(subtree);
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    dir.display(),
                    e
                )))
            })?;
        }
        let root = tokio::fs::canonicalize(&root).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                root.display(),
                e
            )))
        })?;
        tracing::debug!(root = %root.display(), "opened job scratch");
        Ok(JobScratch {
            job_id,
            root,
            videos_base: self.videos_base.clone(),
        })
    }
}

/// Filesystem workspace owned by exactly one job.
#[derive(Debug)]
pub struct JobScratch {
    job_id: JobId,
    root: PathBuf,
    videos_base: PathBuf,
}

impl JobScratch {
    /// The job this workspace belongs to.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Root of the scratch tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reserve a fresh path under `images/` without writing anything.
    pub fn image_file(&self, hint: &str, extension: &str) -> PathBuf {
        self.fresh_path("images", hint, extension)
    }

    /// Reserve a fresh path under `audio/`.
    pub fn audio_file(&self, hint: &str, extension: &str) -> PathBuf {
        self.fresh_path("audio", hint, extension)
    }

    /// Reserve a fresh path under `temp/`.
    pub fn temp_file(&self, hint: &str, extension: &str) -> PathBuf {
        self.fresh_path("temp", hint, extension)
    }

    /// Atomically persist image bytes; returns the absolute path.
    pub async fn save_image(&self, bytes: &[u8], hint: &str, extension: &str) -> FabulaResult<PathBuf> {
        self.save("images", bytes, hint, extension).await
    }

    /// Atomically persist audio bytes; returns the absolute path.
    pub async fn save_audio(&self, bytes: &[u8], hint: &str, extension: &str) -> FabulaResult<PathBuf> {
        self.save("audio", bytes, hint, extension).await
    }

    /// Atomically persist temp bytes; returns the absolute path.
    pub async fn save_temp(&self, bytes: &[u8], hint: &str, extension: &str) -> FabulaResult<PathBuf> {
        self.save("temp", bytes, hint, extension).await
    }

    fn fresh_path(&self, subtree: &str, hint: &str, extension: &str) -> PathBuf {
        let stem = sanitize(hint);
        let suffix = Uuid::new_v4().simple().to_string();
        self.root
            .join(subtree)
            .join(format!("{stem}_{}.{extension}", &suffix[..8]))
    }

    /// Write to a temp file in the destination subtree, then rename. The
    /// rename never crosses a filesystem boundary, so partially written
    /// blobs are never visible under their final name.
    async fn save(
        &self,
        subtree: &str,
        bytes: &[u8],
        hint: &str,
        extension: &str,
    ) -> FabulaResult<PathBuf> {
        let path = self.fresh_path(subtree, hint, extension);
        let staging = path.with_extension(format!("{extension}.part"));

        tokio::fs::write(&staging, bytes).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                staging.display(),
                e
            )))
        })?;
        tokio::fs::rename(&staging, &path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Rename(format!(
                "{} -> {}: {}",
                staging.display(),
                path.display(),
                e
            )))
        })?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "stored blob");
        Ok(path)
    }

    /// Move the final video out of scratch into the videos directory.
    ///
    /// The containing directory is fsynced so the promoted file survives a
    /// crash; cleanup of the scratch tree can then proceed safely.
    #[tracing::instrument(skip(self), fields(job_id = %self.job_id))]
    pub async fn promote(&self, path: &Path) -> FabulaResult<PathBuf> {
        let dest_dir = self.videos_base.join(self.job_id.to_string());
        tokio::fs::create_dir_all(&dest_dir).await.map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                dest_dir.display(),
                e
            )))
        })?;
        let dest = dest_dir.join(FINAL_VIDEO_NAME);

        match tokio::fs::rename(path, &dest).await {
            Ok(()) => {}
            // Rename fails across filesystems; fall back to copy + remove.
            Err(_) => {
                tokio::fs::copy(path, &dest).await.map_err(|e| {
                    StorageError::new(StorageErrorKind::Promote(format!(
                        "{} -> {}: {}",
                        path.display(),
                        dest.display(),
                        e
                    )))
                })?;
                let _ = tokio::fs::remove_file(path).await;
            }
        }

        let dir = dest_dir.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::File::open(&dir)?.sync_all()
        })
        .await
        .map_err(|e| StorageError::new(StorageErrorKind::Promote(format!("fsync join: {e}"))))?
        .map_err(|e| {
            StorageError::new(StorageErrorKind::Promote(format!(
                "fsync {}: {}",
                dest_dir.display(),
                e
            )))
        })?;

        tracing::info!(dest = %dest.display(), "promoted final video");
        Ok(dest)
    }

    /// Size in bytes of a file, for the final video descriptor.
    pub async fn file_size(&self, path: &Path) -> FabulaResult<u64> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::Metadata(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        Ok(meta.len())
    }

    /// Remove the scratch tree. Tolerates partial or already-removed trees.
    #[tracing::instrument(skip(self), fields(job_id = %self.job_id))]
    pub async fn cleanup(&self) -> FabulaResult<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                tracing::debug!(root = %self.root.display(), "removed scratch tree");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "cleanup {}: {}",
                self.root.display(),
                e
            )))
            .into()),
        }
    }
}

/// Keep hints filesystem-safe: alphanumerics, dash and underscore only.
fn sanitize(hint: &str) -> String {
    let cleaned: String = hint
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "blob".to_string()
    } else {
        cleaned
    }
}
