use std::fs;
use std::path::PathBuf;

use crate::annotation::merge::{merge_tier, CollisionPolicy, MergeOutcome};
use crate::annotation::AnnotationDocument;
use crate::error::DecodeError;
use crate::pipeline::invoker::{InvokeOutcome, PipelineInvoker};
use crate::pipeline::workspace::{RetentionPolicy, Workspace};
use crate::reconstruct::reconstruct_tier;
use crate::tier_spec::TierSpec;
use crate::types::{FailureKind, FileJob, JobOutcome, JobStatus};

/// Decodes one WAV/TextGrid pair at a time and writes the AutoVOT tier back.
pub struct VotDecoder {
    invoker: PipelineInvoker,
    tier_spec: TierSpec,
    tier_name: String,
    collision_policy: CollisionPolicy,
    retention: RetentionPolicy,
    scratch_root: Option<PathBuf>,
}

pub(crate) struct VotDecoderParts {
    pub invoker: PipelineInvoker,
    pub tier_spec: TierSpec,
    pub tier_name: String,
    pub collision_policy: CollisionPolicy,
    pub retention: RetentionPolicy,
    pub scratch_root: Option<PathBuf>,
}

enum Attempt {
    Written {
        predicted_vots: usize,
        merge: MergeOutcome,
    },
    Problematic {
        reason: String,
    },
}

impl VotDecoder {
    pub(crate) fn from_parts(parts: VotDecoderParts) -> Self {
        Self {
            invoker: parts.invoker,
            tier_spec: parts.tier_spec,
            tier_name: parts.tier_name,
            collision_policy: parts.collision_policy,
            retention: parts.retention,
            scratch_root: parts.scratch_root,
        }
    }

    pub fn tier_spec(&self) -> &TierSpec {
        &self.tier_spec
    }

    /// Never fails: every error is folded into the returned outcome.
    pub fn decode_job(&self, job: &FileJob) -> JobOutcome {
        let span = tracing::info_span!("job", index = job.index, wav = %job.audio.display());
        let _guard = span.enter();

        match self.attempt(job) {
            Ok(Attempt::Written {
                predicted_vots,
                merge,
            }) => {
                tracing::info!(
                    textgrid = %job.annotation.display(),
                    predicted_vots,
                    ?merge,
                    "job finished"
                );
                JobOutcome {
                    job: job.clone(),
                    status: JobStatus::Written {
                        predicted_vots,
                        merge,
                    },
                }
            }
            Ok(Attempt::Problematic { reason }) => {
                tracing::warn!(textgrid = %job.annotation.display(), %reason, "no usable windows");
                JobOutcome::failed(job.clone(), FailureKind::Problematic, reason)
            }
            Err(err) => {
                tracing::error!(
                    wav = %job.audio.display(),
                    textgrid = %job.annotation.display(),
                    error = %err,
                    "job failed"
                );
                JobOutcome::failed(job.clone(), FailureKind::from(&err), err.to_string())
            }
        }
    }

    fn attempt(&self, job: &FileJob) -> Result<Attempt, DecodeError> {
        job.validate()?;

        let workspace = match &self.scratch_root {
            Some(root) => Workspace::create_in(root, job, self.retention)?,
            None => Workspace::create(job, self.retention)?,
        };
        let paths = workspace.paths();

        match self.invoker.run(&workspace, &self.tier_spec)? {
            InvokeOutcome::Problematic { reason, .. } => {
                return Ok(Attempt::Problematic { reason });
            }
            InvokeOutcome::Predicted { window_count } => {
                tracing::debug!(window_count, "decoder finished");
            }
        }

        let window_file = fs::read_to_string(&paths.window_file)
            .map_err(|err| DecodeError::io("reading window file", err))?;
        let prediction_file = fs::read_to_string(&paths.predictions)
            .map_err(|err| DecodeError::io("reading prediction file", err))?;

        let mut document = AnnotationDocument::read(&job.annotation)?;
        let tier = reconstruct_tier(
            &self.tier_name,
            document.xmin(),
            document.xmax(),
            &window_file,
            &prediction_file,
        )?;
        let predicted_vots = tier.labeled().count();

        let merge = merge_tier(&mut document, tier, self.collision_policy, &job.annotation)?;
        if merge.document_changed() {
            document.write(&job.annotation)?;
        }

        Ok(Attempt::Written {
            predicted_vots,
            merge,
        })
    }
}
