use std::path::PathBuf;
use std::time::Duration;

use autovot_decode::{
    resolve_jobs, run_batch, BatchReport, CollisionPolicy, DecodeConfig, DecoderBuilder,
    JobStatus, RetentionPolicy, TierOptions, TierSpec, Verbosity,
};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

#[path = "auto_vot_decode/json_report_formatter.rs"]
mod json_report_formatter;

const EXIT_CONFIG_ERROR: i32 = 1;
const EXIT_JOB_FAILURES: i32 = 2;
const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}";

/// What a completed batch left behind.
struct RunOutcome {
    report: BatchReport,
    report_written: bool,
}

impl RunOutcome {
    /// 1 is kept for runs that stopped before any job; a batch that ran exits 0 or 2.
    fn exit_code(&self) -> i32 {
        if self.report.is_success() && self.report_written {
            0
        } else {
            EXIT_JOB_FAILURES
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LoggingLevel {
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "INFO")]
    Info,
    #[value(name = "WARNING", alias = "WARN")]
    Warning,
    #[value(name = "ERROR")]
    Error,
}

impl LoggingLevel {
    fn verbosity(self) -> Verbosity {
        match self {
            Self::Debug => Verbosity::Debug,
            Self::Info => Verbosity::Info,
            Self::Warning => Verbosity::Warning,
            Self::Error => Verbosity::Error,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "auto_vot_decode")]
#[command(
    about = "Use an existing classifier to measure VOT for stops in a set of TextGrids and corresponding WAV files"
)]
struct Args {
    /// WAV file, or text file listing WAV files.
    wav_filenames: PathBuf,
    /// TextGrid file, or text file listing the corresponding TextGrids.
    textgrid_filenames: PathBuf,
    /// Classifier used to measure VOT.
    model_filename: PathBuf,
    /// Tier with manually labeled VOTs; used to build windows when no window tier is given.
    #[arg(long, env = "AUTOVOT_DECODE_VOT_TIER")]
    vot_tier: Option<String>,
    /// Only intervals with this mark on the VOT tier are used ("*" for any).
    #[arg(long, env = "AUTOVOT_DECODE_VOT_MARK", default_value = "*")]
    vot_mark: String,
    /// Tier with windows to search for VOTs. Takes precedence over --vot-tier.
    #[arg(long, env = "AUTOVOT_DECODE_WINDOW_TIER")]
    window_tier: Option<String>,
    /// Only intervals with this mark on the window tier are searched ("*" for any).
    #[arg(long, env = "AUTOVOT_DECODE_WINDOW_MARK", default_value = "*")]
    window_mark: String,
    /// Left window boundary (ms) relative to the VOT interval's left boundary.
    #[arg(
        long,
        env = "AUTOVOT_DECODE_WINDOW_MIN",
        default_value_t = TierOptions::DEFAULT_WINDOW_MIN_MS,
        allow_hyphen_values = true
    )]
    window_min: f64,
    /// Right window boundary (ms) relative to the VOT interval's right boundary.
    #[arg(
        long,
        env = "AUTOVOT_DECODE_WINDOW_MAX",
        default_value_t = TierOptions::DEFAULT_WINDOW_MAX_MS,
        allow_hyphen_values = true
    )]
    window_max: f64,
    /// Minimum allowed length of a predicted VOT (ms).
    #[arg(
        long,
        env = "AUTOVOT_DECODE_MIN_VOT_LENGTH",
        default_value_t = DecodeConfig::DEFAULT_MIN_VOT_LENGTH_MS
    )]
    min_vot_length: u32,
    /// Maximum allowed length of a predicted VOT (ms).
    #[arg(
        long,
        env = "AUTOVOT_DECODE_MAX_VOT_LENGTH",
        default_value_t = DecodeConfig::DEFAULT_MAX_VOT_LENGTH_MS
    )]
    max_vot_length: u32,
    /// Latest allowed VOT onset within a window (ms).
    #[arg(
        long,
        env = "AUTOVOT_DECODE_MAX_ONSET",
        default_value_t = DecodeConfig::DEFAULT_MAX_ONSET_MS
    )]
    max_onset: u32,
    /// Maximum number of instances per file (0 uses everything).
    #[arg(long, env = "AUTOVOT_DECODE_MAX_NUM_INSTANCES", default_value_t = 0)]
    max_num_instances: usize,
    /// Add a new AutoVOT tier even if one already exists.
    #[arg(long, env = "AUTOVOT_DECODE_IGNORE_EXISTING_TIERS", default_value_t = false)]
    ignore_existing_tiers: bool,
    #[arg(
        long,
        env = "AUTOVOT_DECODE_LOGGING_LEVEL",
        value_enum,
        ignore_case = true,
        default_value_t = LoggingLevel::Info
    )]
    logging_level: LoggingLevel,
    /// Keep per-file scratch directories (always kept at DEBUG level).
    #[arg(long, env = "AUTOVOT_DECODE_KEEP_WORKSPACE", default_value_t = false)]
    keep_workspace: bool,
    #[arg(
        long,
        env = "AUTOVOT_DECODE_FRONT_END_BIN",
        default_value = DecodeConfig::DEFAULT_FRONT_END_BIN
    )]
    front_end_bin: String,
    #[arg(
        long,
        env = "AUTOVOT_DECODE_DECODER_BIN",
        default_value = DecodeConfig::DEFAULT_DECODER_BIN
    )]
    decoder_bin: String,
    /// Per-stage timeout in seconds (0 waits forever).
    #[arg(long, env = "AUTOVOT_DECODE_STAGE_TIMEOUT_SECS", default_value_t = 600)]
    stage_timeout_secs: u64,
    /// Write a JSON summary of every job to this path.
    #[arg(long, env = "AUTOVOT_DECODE_REPORT_OUT")]
    report_out: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.logging_level.verbosity());

    match run(args) {
        Ok(outcome) => match outcome.exit_code() {
            0 => {}
            code => std::process::exit(code),
        },
        Err(message) => {
            tracing::error!("{message}");
            std::process::exit(EXIT_CONFIG_ERROR);
        }
    }
}

fn init_tracing(verbosity: Verbosity) {
    let default_level = verbosity.tracing_level().as_str().to_ascii_lowercase();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: Args) -> Result<RunOutcome, String> {
    let tier_spec = TierSpec::resolve(&TierOptions {
        vot_tier: args.vot_tier.clone(),
        vot_mark: args.vot_mark.clone(),
        window_tier: args.window_tier.clone(),
        window_mark: args.window_mark.clone(),
        window_min_ms: args.window_min,
        window_max_ms: args.window_max,
    })
    .map_err(|err| err.to_string())?;

    let verbosity = args.logging_level.verbosity();
    let retention = if args.keep_workspace {
        RetentionPolicy::Retain
    } else {
        verbosity.default_retention()
    };
    let config = DecodeConfig {
        model_path: args.model_filename.clone(),
        front_end_bin: args.front_end_bin.clone(),
        decoder_bin: args.decoder_bin.clone(),
        min_vot_length_ms: args.min_vot_length,
        max_vot_length_ms: args.max_vot_length,
        max_onset_ms: args.max_onset,
        max_num_instances: args.max_num_instances,
        collision_policy: if args.ignore_existing_tiers {
            CollisionPolicy::AppendDuplicate
        } else {
            CollisionPolicy::KeepExisting
        },
        retention,
        stage_timeout: (args.stage_timeout_secs > 0)
            .then(|| Duration::from_secs(args.stage_timeout_secs)),
        verbosity,
        ..DecodeConfig::default()
    };
    let tier_name = config.tier_name.clone();

    let jobs = resolve_jobs(&args.wav_filenames, &args.textgrid_filenames)
        .map_err(|err| err.to_string())?;
    if jobs.is_empty() {
        return Err("No WAV/TextGrid pairs to process.".to_string());
    }
    let decoder = DecoderBuilder::new(config, tier_spec)
        .build()
        .map_err(|err| err.to_string())?;

    let progress = if jobs.len() > 1 {
        ProgressBar::new(jobs.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(
        ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let report = run_batch(&decoder, &jobs, |outcome| {
        let label = match &outcome.status {
            JobStatus::Written { predicted_vots, .. } => {
                format!("{}: {predicted_vots} VOT(s)", outcome.job.annotation.display())
            }
            JobStatus::Failed { kind, .. } => {
                format!("{}: {kind:?}", outcome.job.annotation.display())
            }
        };
        progress.set_message(label);
        progress.inc(1);
    });
    progress.finish_and_clear();
    report.log_summary();

    let report_written = match args.report_out.as_ref() {
        Some(path) => {
            let meta = json_report_formatter::Meta {
                generated_at: Utc::now().to_rfc3339(),
                model_path: args.model_filename.to_string_lossy().into_owned(),
                tier_name,
                job_count: report.outcomes.len(),
                written_count: report.written_count(),
                failed_count: report.failure_count(),
            };
            let document = json_report_formatter::ReportDocument::new(meta, &report);
            match json_report_formatter::write_report(path, &document) {
                Ok(()) => {
                    println!("{}", path.display());
                    true
                }
                Err(message) => {
                    tracing::error!(%message, "batch finished but the report was not written");
                    false
                }
            }
        }
        None => true,
    };

    Ok(RunOutcome {
        report,
        report_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use autovot_decode::{FailureKind, FileJob, JobOutcome, MergeOutcome};

    fn written(index: usize) -> JobOutcome {
        JobOutcome {
            job: FileJob::new(index, "a.wav", "a.TextGrid"),
            status: JobStatus::Written {
                predicted_vots: 1,
                merge: MergeOutcome::Appended,
            },
        }
    }

    #[test]
    fn clean_batch_exits_zero() {
        let outcome = RunOutcome {
            report: BatchReport {
                outcomes: vec![written(0)],
            },
            report_written: true,
        };
        assert_eq!(outcome.exit_code(), 0);
    }

    #[test]
    fn unwritten_report_is_not_a_configuration_error() {
        let outcome = RunOutcome {
            report: BatchReport {
                outcomes: vec![written(0)],
            },
            report_written: false,
        };
        assert_eq!(outcome.exit_code(), EXIT_JOB_FAILURES);
    }

    #[test]
    fn failed_job_exits_with_job_failure_code() {
        let outcome = RunOutcome {
            report: BatchReport {
                outcomes: vec![
                    written(0),
                    JobOutcome::failed(
                        FileJob::new(1, "b.wav", "b.TextGrid"),
                        FailureKind::Validation,
                        "missing",
                    ),
                ],
            },
            report_written: true,
        };
        assert_eq!(outcome.exit_code(), EXIT_JOB_FAILURES);
    }

    #[test]
    fn report_write_failure_is_returned() {
        let dir = tempfile::tempdir().expect("dir");
        let report = BatchReport::default();
        let meta = json_report_formatter::Meta {
            generated_at: Utc::now().to_rfc3339(),
            model_path: "vot.classifier".to_string(),
            tier_name: "AutoVOT".to_string(),
            job_count: 0,
            written_count: 0,
            failed_count: 0,
        };
        let document = json_report_formatter::ReportDocument::new(meta, &report);

        let err = json_report_formatter::write_report(dir.path(), &document)
            .expect_err("directory in the way");
        assert!(err.contains("Failed to create report file"), "{err}");
    }
}

