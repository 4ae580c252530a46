use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::annotation::merge::MergeOutcome;
use crate::annotation::AnnotationDocument;
use crate::error::DecodeError;

/// One WAV/TextGrid pair to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileJob {
    /// Position in the input lists, 0-based.
    pub index: usize,
    pub audio: PathBuf,
    pub annotation: PathBuf,
}

impl FileJob {
    pub fn new(index: usize, audio: impl Into<PathBuf>, annotation: impl Into<PathBuf>) -> Self {
        Self {
            index,
            audio: audio.into(),
            annotation: annotation.into(),
        }
    }

    /// Base name for the job's intermediate files, with whitespace replaced
    /// so that the names survive whitespace-separated list files.
    pub fn stem(&self) -> String {
        self.audio
            .file_stem()
            .and_then(|value| value.to_str())
            .filter(|value| !value.trim().is_empty())
            .map(|value| value.replace(char::is_whitespace, "_"))
            .unwrap_or_else(|| format!("job{}", self.index))
    }

    pub fn validate(&self) -> Result<(), DecodeError> {
        if !is_valid_wav(&self.audio) {
            return Err(DecodeError::invalid_input(format!(
                "'{}' is not a readable WAV file",
                self.audio.display()
            )));
        }
        if !self.annotation.is_file() {
            return Err(DecodeError::invalid_input(format!(
                "TextGrid '{}' does not exist",
                self.annotation.display()
            )));
        }
        AnnotationDocument::read(&self.annotation).map_err(|err| {
            DecodeError::invalid_input(format!(
                "'{}' is not a valid TextGrid: {err}",
                self.annotation.display()
            ))
        })?;
        Ok(())
    }
}

pub fn is_valid_wav(path: &Path) -> bool {
    path.is_file() && hound::WavReader::open(path).is_ok()
}

pub fn is_textgrid(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("TextGrid"))
}

/// Why a job did not produce an updated TextGrid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Problematic,
    ExternalTool,
    Reconstruction,
    Annotation,
    Io,
}

impl From<&DecodeError> for FailureKind {
    fn from(err: &DecodeError) -> Self {
        match err {
            DecodeError::InvalidInput { .. } | DecodeError::Config { .. } => Self::Validation,
            DecodeError::StageSpawn { .. }
            | DecodeError::StageFailed { .. }
            | DecodeError::StageTimeout { .. }
            | DecodeError::MissingOutput { .. } => Self::ExternalTool,
            DecodeError::Parse { .. }
            | DecodeError::Reconstruct { .. }
            | DecodeError::NoPredictions => Self::Reconstruction,
            DecodeError::Annotation { .. } => Self::Annotation,
            DecodeError::Io { .. } => Self::Io,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Written {
        predicted_vots: usize,
        merge: MergeOutcome,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub job: FileJob,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl JobOutcome {
    pub fn failed(job: FileJob, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            job,
            status: JobStatus::Failed {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, JobStatus::Failed { .. })
    }
}
