use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::traits::Stage;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("TextGrid error while {context}: {message}")]
    Annotation { context: String, message: String },
    #[error("malformed {context} line {line}: {message}")]
    Parse {
        context: &'static str,
        line: usize,
        message: String,
    },
    #[error("{stage} stage could not be started (`{command}`): {source}")]
    StageSpawn {
        stage: Stage,
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} stage failed with {status} (`{command}`){}", stderr_suffix(stderr))]
    StageFailed {
        stage: Stage,
        command: String,
        status: String,
        /// Captured stderr, trimmed; empty when the stage printed nothing.
        stderr: String,
    },
    #[error("{stage} stage did not finish within {}s (`{command}`)", timeout.as_secs())]
    StageTimeout {
        stage: Stage,
        command: String,
        timeout: Duration,
    },
    #[error("{stage} stage did not produce '{}'", path.display())]
    MissingOutput { stage: Stage, path: PathBuf },
    #[error("cannot rebuild AutoVOT tier: {message}")]
    Reconstruct { message: String },
    #[error("decoder produced no predictions")]
    NoPredictions,
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl DecodeError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn annotation(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Annotation {
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn parse(context: &'static str, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            context,
            line,
            message: message.into(),
        }
    }

    pub(crate) fn reconstruct(message: impl Into<String>) -> Self {
        Self::Reconstruct {
            message: message.into(),
        }
    }

    /// True for errors that must abort the whole batch instead of one job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}
