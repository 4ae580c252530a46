use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::{DecodeConfig, Verbosity};
use crate::error::DecodeError;
use crate::pipeline::traits::{
    FrontEnd, FrontEndOutcome, FrontEndRequest, Stage, StageCommand, StageRunner,
};
use crate::pipeline::workspace::{Workspace, WorkspacePaths};
use crate::tier_spec::TierSpec;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs external stages as child processes. Their stdout and stderr are
/// captured and logged at debug; stderr is attached to failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessStageRunner {
    timeout: Option<Duration>,
}

/// Reads a child pipe to the end on its own thread so the child never blocks
/// on a full pipe while we poll for exit.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(err) = pipe.read_to_end(&mut buf) {
                tracing::debug!(error = %err, "stage output pipe closed early");
            }
        }
        String::from_utf8_lossy(&buf).trim_end().to_string()
    })
}

fn collect(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

impl ProcessStageRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    fn wait(&self, child: &mut Child, command: &StageCommand) -> Result<ExitStatus, DecodeError> {
        let wait_error = |err: std::io::Error| {
            DecodeError::io(format!("waiting for {} stage", command.stage), err)
        };
        let Some(timeout) = self.timeout else {
            return child.wait().map_err(wait_error);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(wait_error)? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                if let Err(err) = child.kill() {
                    tracing::warn!(stage = %command.stage, error = %err, "failed to kill stage");
                }
                if let Err(err) = child.wait() {
                    tracing::warn!(stage = %command.stage, error = %err, "failed to reap stage");
                }
                return Err(DecodeError::StageTimeout {
                    stage: command.stage,
                    command: command.command_line(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl StageRunner for ProcessStageRunner {
    fn run(&self, command: &StageCommand) -> Result<(), DecodeError> {
        let command_line = command.command_line();
        tracing::debug!(stage = %command.stage, command = %command_line, "running stage");

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DecodeError::StageSpawn {
                stage: command.stage,
                command: command_line.clone(),
                source,
            })?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // On timeout the drain threads are left detached: a grandchild may
        // still hold the pipes open.
        let status = self.wait(&mut child, command)?;
        let (stdout, stderr) = (collect(stdout), collect(stderr));
        if !stdout.is_empty() || !stderr.is_empty() {
            tracing::debug!(stage = %command.stage, %stdout, %stderr, "stage output");
        }

        if !status.success() {
            tracing::error!(
                stage = %command.stage,
                command = %command_line,
                %status,
                %stderr,
                "stage failed"
            );
            return Err(DecodeError::StageFailed {
                stage: command.stage,
                command: command_line,
                status: status.to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

/// What the pipeline left in the workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    Predicted { window_count: usize },
    Problematic { files: Vec<PathBuf>, reason: String },
}

/// Front end, encoder and decoder, run in order against one workspace.
pub struct PipelineInvoker {
    front_end: Box<dyn FrontEnd>,
    runner: Box<dyn StageRunner>,
    front_end_bin: String,
    decoder_bin: String,
    model_path: PathBuf,
    min_vot_length_ms: u32,
    max_vot_length_ms: u32,
    max_onset_ms: u32,
    max_num_instances: usize,
    verbosity: Verbosity,
}

impl PipelineInvoker {
    pub fn new(
        config: &DecodeConfig,
        front_end: Box<dyn FrontEnd>,
        runner: Box<dyn StageRunner>,
    ) -> Self {
        Self {
            front_end,
            runner,
            front_end_bin: config.front_end_bin.clone(),
            decoder_bin: config.decoder_bin.clone(),
            model_path: config.model_path.clone(),
            min_vot_length_ms: config.min_vot_length_ms,
            max_vot_length_ms: config.max_vot_length_ms,
            max_onset_ms: config.max_onset_ms,
            max_num_instances: config.max_num_instances,
            verbosity: config.verbosity,
        }
    }

    pub fn run(
        &self,
        workspace: &Workspace,
        tier_spec: &TierSpec,
    ) -> Result<InvokeOutcome, DecodeError> {
        let paths = workspace.paths();

        let request = FrontEndRequest {
            textgrid_list: &paths.textgrid_list,
            wav_list: &paths.wav_list,
            window_file: &paths.window_file,
            feature_list: &paths.feature_list,
            features_dir: &paths.features_dir,
            tier_spec,
            max_num_instances: self.max_num_instances,
        };
        let window_count = match self.front_end.extract(&request)? {
            FrontEndOutcome::Ready { window_count } => window_count,
            FrontEndOutcome::Problematic { files, reason } => {
                return Ok(InvokeOutcome::Problematic { files, reason });
            }
        };
        require_output(Stage::FrontEnd, &paths.window_file)?;
        require_output(Stage::FrontEnd, &paths.feature_list)?;

        self.runner.run(&self.encode_command(paths))?;
        require_output(Stage::Encode, &paths.labels)?;

        self.runner.run(&self.decode_command(paths))?;
        require_output(Stage::Decode, &paths.predictions)?;

        Ok(InvokeOutcome::Predicted { window_count })
    }

    pub fn encode_command(&self, paths: &WorkspacePaths) -> StageCommand {
        StageCommand::new(Stage::Encode, &self.front_end_bin)
            .arg("-verbose")
            .arg(self.verbosity.as_tool_arg())
            .arg(&paths.window_file)
            .arg(&paths.feature_list)
            .arg(&paths.labels)
    }

    pub fn decode_command(&self, paths: &WorkspacePaths) -> StageCommand {
        StageCommand::new(Stage::Decode, &self.decoder_bin)
            .arg("-verbose")
            .arg(self.verbosity.as_tool_arg())
            .arg("-max_onset")
            .arg(self.max_onset_ms.to_string())
            .arg("-min_vot_length")
            .arg(self.min_vot_length_ms.to_string())
            .arg("-max_vot_length")
            .arg(self.max_vot_length_ms.to_string())
            .arg("-output_predictions")
            .arg(&paths.predictions)
            .arg(&paths.feature_list)
            .arg(&paths.labels)
            .arg(&self.model_path)
    }
}

fn require_output(stage: Stage, path: &Path) -> Result<(), DecodeError> {
    if path.is_file() {
        return Ok(());
    }
    Err(DecodeError::MissingOutput {
        stage,
        path: path.to_path_buf(),
    })
}
