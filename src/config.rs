use std::path::PathBuf;
use std::time::Duration;

use crate::annotation::merge::CollisionPolicy;
use crate::error::DecodeError;
use crate::pipeline::workspace::RetentionPolicy;

/// Severity passed to the external tools and used to pick the log filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl Verbosity {
    /// Spelling understood by `VotFrontEnd2` and `InitialVotDecode`.
    pub fn as_tool_arg(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    pub fn tracing_level(self) -> tracing::Level {
        match self {
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    /// Scratch directories are kept for inspection when running at debug level.
    pub fn default_retention(self) -> RetentionPolicy {
        match self {
            Self::Debug => RetentionPolicy::Retain,
            _ => RetentionPolicy::Delete,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecodeConfig {
    pub model_path: PathBuf,
    pub front_end_bin: String,
    pub decoder_bin: String,
    pub min_vot_length_ms: u32,
    pub max_vot_length_ms: u32,
    pub max_onset_ms: u32,
    /// Cap on windows per file; `0` keeps every qualifying window.
    pub max_num_instances: usize,
    pub tier_name: String,
    pub collision_policy: CollisionPolicy,
    pub retention: RetentionPolicy,
    /// `None` lets a stage run for as long as it needs.
    pub stage_timeout: Option<Duration>,
    pub verbosity: Verbosity,
}

impl DecodeConfig {
    pub const DEFAULT_FRONT_END_BIN: &'static str = "VotFrontEnd2";
    pub const DEFAULT_DECODER_BIN: &'static str = "InitialVotDecode";
    pub const DEFAULT_TIER_NAME: &'static str = "AutoVOT";
    pub const DEFAULT_MIN_VOT_LENGTH_MS: u32 = 15;
    pub const DEFAULT_MAX_VOT_LENGTH_MS: u32 = 250;
    pub const DEFAULT_MAX_ONSET_MS: u32 = 200;
    pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(600);

    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.min_vot_length_ms > self.max_vot_length_ms {
            return Err(DecodeError::config(format!(
                "min VOT length ({} ms) exceeds max VOT length ({} ms)",
                self.min_vot_length_ms, self.max_vot_length_ms
            )));
        }
        if self.tier_name.trim().is_empty() {
            return Err(DecodeError::config("output tier name must not be empty"));
        }
        if !self.model_path.is_file() {
            return Err(DecodeError::config(format!(
                "classifier model '{}' does not exist",
                self.model_path.display()
            )));
        }
        Ok(())
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            front_end_bin: Self::DEFAULT_FRONT_END_BIN.to_string(),
            decoder_bin: Self::DEFAULT_DECODER_BIN.to_string(),
            min_vot_length_ms: Self::DEFAULT_MIN_VOT_LENGTH_MS,
            max_vot_length_ms: Self::DEFAULT_MAX_VOT_LENGTH_MS,
            max_onset_ms: Self::DEFAULT_MAX_ONSET_MS,
            max_num_instances: 0,
            tier_name: Self::DEFAULT_TIER_NAME.to_string(),
            collision_policy: CollisionPolicy::KeepExisting,
            retention: RetentionPolicy::Delete,
            stage_timeout: Some(Self::DEFAULT_STAGE_TIMEOUT),
            verbosity: Verbosity::Info,
        }
    }
}
