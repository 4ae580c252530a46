use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::DecodeError;
use crate::types::FileJob;

const WORKSPACE_PREFIX: &str = "autovot_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    #[default]
    Delete,
    Retain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub textgrid_list: PathBuf,
    pub wav_list: PathBuf,
    pub window_file: PathBuf,
    pub feature_list: PathBuf,
    pub labels: PathBuf,
    pub predictions: PathBuf,
    pub features_dir: PathBuf,
}

impl WorkspacePaths {
    fn new(root: &Path, stem: &str) -> Self {
        let file = |ext: &str| root.join(format!("{stem}.{ext}"));
        Self {
            textgrid_list: file("tg_list"),
            wav_list: file("wav_list"),
            window_file: file("input"),
            feature_list: file("feature_filelist"),
            labels: file("labels"),
            predictions: file("preds"),
            features_dir: root.join("features"),
        }
    }
}

/// Scratch directory owned by a single job.
///
/// Dropping it removes the directory tree unless the policy is
/// [`RetentionPolicy::Retain`].
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
    retention: RetentionPolicy,
    paths: WorkspacePaths,
}

impl Workspace {
    pub fn create(job: &FileJob, retention: RetentionPolicy) -> Result<Self, DecodeError> {
        Self::create_in(&std::env::temp_dir(), job, retention)
    }

    pub fn create_in(
        parent: &Path,
        job: &FileJob,
        retention: RetentionPolicy,
    ) -> Result<Self, DecodeError> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(parent)
            .map_err(|err| DecodeError::io("creating job workspace", err))?;
        let root = dir.path().to_path_buf();
        let paths = WorkspacePaths::new(&root, &job.stem());
        let workspace = Self {
            dir: Some(dir),
            root,
            retention,
            paths,
        };

        fs::create_dir_all(&workspace.paths.features_dir)
            .map_err(|err| DecodeError::io("creating features directory", err))?;
        write_manifest(&workspace.paths.wav_list, &job.audio)?;
        write_manifest(&workspace.paths.textgrid_list, &job.annotation)?;

        tracing::debug!(
            workspace = %workspace.root.display(),
            job = job.index,
            "workspace created"
        );
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        match self.retention {
            RetentionPolicy::Retain => {
                let kept = dir.keep();
                tracing::info!(workspace = %kept.display(), "keeping workspace for inspection");
            }
            RetentionPolicy::Delete => {
                if let Err(err) = dir.close() {
                    tracing::warn!(
                        workspace = %self.root.display(),
                        error = %err,
                        "failed to remove workspace"
                    );
                }
            }
        }
    }
}

/// The front end takes lists of files even for a single pair.
fn write_manifest(path: &Path, entry: &Path) -> Result<(), DecodeError> {
    fs::write(path, format!("{}\n", entry.display()))
        .map_err(|err| DecodeError::io(format!("writing manifest '{}'", path.display()), err))
}
