pub mod annotation;
pub mod batch;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod reconstruct;
pub mod tier_spec;
pub mod types;

pub use annotation::merge::{merge_into_file, merge_tier, CollisionPolicy, MergeOutcome};
pub use annotation::{AnnotationDocument, Interval, IntervalTier};
pub use batch::{pair_lists, resolve_jobs, run_batch, BatchReport};
pub use config::{DecodeConfig, Verbosity};
pub use error::DecodeError;
pub use pipeline::builder::DecoderBuilder;
pub use pipeline::front_end::TextGridFrontEnd;
pub use pipeline::invoker::ProcessStageRunner;
pub use pipeline::runtime::VotDecoder;
pub use pipeline::traits::{
    FrontEnd, FrontEndOutcome, FrontEndRequest, Stage, StageCommand, StageRunner,
};
pub use pipeline::workspace::{RetentionPolicy, Workspace};
pub use tier_spec::{TierOptions, TierSpec};
pub use types::{FailureKind, FileJob, JobOutcome, JobStatus};
