use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::DecodeError;
use crate::tier_spec::TierSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FrontEnd,
    Encode,
    Decode,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FrontEnd => "front-end",
            Self::Encode => "encoding",
            Self::Decode => "decoding",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files the front end reads and writes for one job.
#[derive(Debug, Clone, Copy)]
pub struct FrontEndRequest<'a> {
    pub textgrid_list: &'a Path,
    pub wav_list: &'a Path,
    pub window_file: &'a Path,
    pub feature_list: &'a Path,
    pub features_dir: &'a Path,
    pub tier_spec: &'a TierSpec,
    /// `0` keeps every window.
    pub max_num_instances: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrontEndOutcome {
    Ready { window_count: usize },
    /// Nothing usable was found; the job stops here without an error.
    Problematic { files: Vec<PathBuf>, reason: String },
}

pub trait FrontEnd: Send + Sync {
    fn extract(&self, request: &FrontEndRequest<'_>) -> Result<FrontEndOutcome, DecodeError>;
}

/// An external program invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageCommand {
    pub stage: Stage,
    pub program: String,
    pub args: Vec<OsString>,
}

impl StageCommand {
    pub fn new(stage: Stage, program: impl Into<String>) -> Self {
        Self {
            stage,
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&OsString> {
        self.args
            .iter()
            .position(|arg| arg == flag)
            .and_then(|idx| self.args.get(idx + 1))
    }

    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

pub trait StageRunner: Send + Sync {
    fn run(&self, command: &StageCommand) -> Result<(), DecodeError>;
}
