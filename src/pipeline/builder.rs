use std::path::PathBuf;

use crate::config::DecodeConfig;
use crate::error::DecodeError;
use crate::pipeline::front_end::TextGridFrontEnd;
use crate::pipeline::invoker::{PipelineInvoker, ProcessStageRunner};
use crate::pipeline::runtime::{VotDecoder, VotDecoderParts};
use crate::pipeline::traits::{FrontEnd, StageRunner};
use crate::tier_spec::TierSpec;

pub struct DecoderBuilder {
    config: DecodeConfig,
    tier_spec: TierSpec,
    front_end: Option<Box<dyn FrontEnd>>,
    stage_runner: Option<Box<dyn StageRunner>>,
    scratch_root: Option<PathBuf>,
}

impl DecoderBuilder {
    pub fn new(config: DecodeConfig, tier_spec: TierSpec) -> Self {
        Self {
            config,
            tier_spec,
            front_end: None,
            stage_runner: None,
            scratch_root: None,
        }
    }

    pub fn with_front_end(mut self, front_end: Box<dyn FrontEnd>) -> Self {
        self.front_end = Some(front_end);
        self
    }

    pub fn with_stage_runner(mut self, stage_runner: Box<dyn StageRunner>) -> Self {
        self.stage_runner = Some(stage_runner);
        self
    }

    /// Parent directory for job workspaces; the system temp dir otherwise.
    pub fn with_scratch_root(mut self, scratch_root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(scratch_root.into());
        self
    }

    pub fn build(self) -> Result<VotDecoder, DecodeError> {
        self.config.validate()?;
        if let Some(root) = self.scratch_root.as_ref() {
            if !root.is_dir() {
                return Err(DecodeError::config(format!(
                    "scratch directory '{}' does not exist",
                    root.display()
                )));
            }
        }

        let front_end = self
            .front_end
            .unwrap_or_else(|| Box::new(TextGridFrontEnd));
        let stage_runner = self
            .stage_runner
            .unwrap_or_else(|| Box::new(ProcessStageRunner::new(self.config.stage_timeout)));
        let invoker = PipelineInvoker::new(&self.config, front_end, stage_runner);

        Ok(VotDecoder::from_parts(VotDecoderParts {
            invoker,
            tier_spec: self.tier_spec,
            tier_name: self.config.tier_name,
            collision_policy: self.config.collision_policy,
            retention: self.config.retention,
            scratch_root: self.scratch_root,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier_spec::TierOptions;

    fn tier_spec() -> TierSpec {
        TierSpec::resolve(&TierOptions {
            window_tier: Some("window".to_string()),
            ..TierOptions::default()
        })
        .expect("spec")
    }

    #[test]
    fn build_validates_config() {
        let result = DecoderBuilder::new(DecodeConfig::default(), tier_spec()).build();
        assert!(matches!(result, Err(DecodeError::Config { .. })));
    }

    #[test]
    fn build_rejects_missing_scratch_root() {
        let model = tempfile::NamedTempFile::new().expect("model");
        let config = DecodeConfig {
            model_path: model.path().to_path_buf(),
            ..DecodeConfig::default()
        };
        let result = DecoderBuilder::new(config, tier_spec())
            .with_scratch_root("/definitely/not/a/scratch/dir")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn build_with_defaults() {
        let model = tempfile::NamedTempFile::new().expect("model");
        let config = DecodeConfig {
            model_path: model.path().to_path_buf(),
            ..DecodeConfig::default()
        };
        let decoder = DecoderBuilder::new(config, tier_spec()).build().expect("decoder");
        assert_eq!(decoder.tier_spec(), &tier_spec());
    }
}
