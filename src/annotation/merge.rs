use std::path::Path;

use serde::Serialize;

use crate::annotation::{AnnotationDocument, IntervalTier};
use crate::error::DecodeError;

/// What to do when the document already has a tier with the output name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    #[default]
    KeepExisting,
    AppendDuplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    Appended,
    AppendedDuplicate,
    SkippedExisting,
}

impl MergeOutcome {
    pub fn document_changed(self) -> bool {
        !matches!(self, Self::SkippedExisting)
    }
}

/// Trimmed, case-insensitive tier name comparison.
pub fn same_tier_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

pub fn has_tier_named(document: &AnnotationDocument, name: &str) -> bool {
    document
        .tier_names()
        .any(|existing| same_tier_name(existing, name))
}

/// Appends `tier` unless a same-named tier exists and `policy` forbids duplicates.
/// `source` only names the document in warnings.
pub fn merge_tier(
    document: &mut AnnotationDocument,
    tier: IntervalTier,
    policy: CollisionPolicy,
    source: &Path,
) -> Result<MergeOutcome, DecodeError> {
    if !has_tier_named(document, tier.name()) {
        document.append_tier(tier)?;
        return Ok(MergeOutcome::Appended);
    }

    tracing::warn!(
        file = %source.display(),
        tier = tier.name(),
        "file already contains a tier with this name"
    );
    match policy {
        CollisionPolicy::AppendDuplicate => {
            tracing::warn!(
                file = %source.display(),
                "writing a new tier in addition to the existing one(s)"
            );
            document.append_tier(tier)?;
            Ok(MergeOutcome::AppendedDuplicate)
        }
        CollisionPolicy::KeepExisting => {
            tracing::warn!(
                file = %source.display(),
                "new tier is NOT written; use --ignore-existing-tiers to add it anyway"
            );
            Ok(MergeOutcome::SkippedExisting)
        }
    }
}

/// Reads `path`, merges `tier`, and rewrites the file only if the document changed.
pub fn merge_into_file(
    path: &Path,
    tier: IntervalTier,
    policy: CollisionPolicy,
) -> Result<MergeOutcome, DecodeError> {
    let mut document = AnnotationDocument::read(path)?;
    let outcome = merge_tier(&mut document, tier, policy, path)?;
    if outcome.document_changed() {
        document.write(path)?;
        tracing::debug!(file = %path.display(), ?outcome, "TextGrid updated");
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Interval;

    fn tier(name: &str) -> IntervalTier {
        IntervalTier::new(
            name,
            0.0,
            1.0,
            vec![
                Interval::empty(0.0, 0.2),
                Interval::new(0.2, 0.3, "0.93"),
                Interval::empty(0.3, 1.0),
            ],
        )
        .expect("valid tier")
    }

    fn document_with(names: &[&str]) -> AnnotationDocument {
        let mut document = AnnotationDocument::new(0.0, 1.0).expect("document");
        for name in names {
            document.append_tier(tier(name)).expect("append");
        }
        document
    }

    #[test]
    fn appends_when_no_collision() {
        let mut document = document_with(&["words"]);
        let outcome = merge_tier(
            &mut document,
            tier("AutoVOT"),
            CollisionPolicy::KeepExisting,
            Path::new("a.TextGrid"),
        )
        .expect("merge");

        assert_eq!(outcome, MergeOutcome::Appended);
        assert_eq!(
            document.tier_names().collect::<Vec<_>>(),
            vec!["words", "AutoVOT"]
        );
    }

    #[test]
    fn collision_without_override_leaves_document_unchanged() {
        let mut document = document_with(&["words", " autoVOT "]);
        let outcome = merge_tier(
            &mut document,
            tier("AutoVOT"),
            CollisionPolicy::KeepExisting,
            Path::new("a.TextGrid"),
        )
        .expect("merge");

        assert_eq!(outcome, MergeOutcome::SkippedExisting);
        assert!(!outcome.document_changed());
        assert_eq!(
            document.tier_names().collect::<Vec<_>>(),
            vec!["words", " autoVOT "]
        );
    }

    #[test]
    fn collision_with_override_appends_duplicate() {
        let mut document = document_with(&["AutoVOT"]);
        let outcome = merge_tier(
            &mut document,
            tier("AutoVOT"),
            CollisionPolicy::AppendDuplicate,
            Path::new("a.TextGrid"),
        )
        .expect("merge");

        assert_eq!(outcome, MergeOutcome::AppendedDuplicate);
        let autovot = document
            .tier_names()
            .filter(|name| *name == "AutoVOT")
            .count();
        assert_eq!(autovot, 2);
    }

    #[test]
    fn merge_into_file_does_not_rewrite_on_skip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("a.TextGrid");
        document_with(&[" AutoVOT "]).write(&path).expect("write");
        let before = std::fs::read(&path).expect("read before");

        let outcome = merge_into_file(&path, tier("AutoVOT"), CollisionPolicy::KeepExisting)
            .expect("merge");

        assert_eq!(outcome, MergeOutcome::SkippedExisting);
        assert_eq!(std::fs::read(&path).expect("read after"), before);
    }

    #[test]
    fn merge_into_file_persists_new_tier() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("a.TextGrid");
        document_with(&["words"]).write(&path).expect("write");

        merge_into_file(&path, tier("AutoVOT"), CollisionPolicy::KeepExisting).expect("merge");

        let reread = AnnotationDocument::read(&path).expect("reread");
        assert_eq!(
            reread.tier_names().collect::<Vec<_>>(),
            vec!["words", "AutoVOT"]
        );
    }

    #[test]
    fn name_comparison_trims_and_folds_case() {
        assert!(same_tier_name(" AutoVOT ", "autovot"));
        assert!(!same_tier_name("AutoVOT2", "AutoVOT"));
    }

    #[test]
    fn merges_into_praat_saved_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("praat.TextGrid");
        std::fs::write(
            &path,
            r#"File type = "ooTextFile"
Object class = "TextGrid"

xmin = 0 
xmax = 1 
tiers? <exists> 
size = 1 
item []: 
    item [1]:
        class = "IntervalTier" 
        name = "words" 
        xmin = 0 
        xmax = 1 
        intervals: size = 1 
        intervals [1]:
            xmin = 0 
            xmax = 1 
            text = "pa" 
"#,
        )
        .expect("praat file");

        let outcome =
            merge_into_file(&path, tier("AutoVOT"), CollisionPolicy::KeepExisting).expect("merge");

        assert_eq!(outcome, MergeOutcome::Appended);
        let reread = AnnotationDocument::read(&path).expect("reread");
        assert_eq!(
            reread.tier_names().collect::<Vec<_>>(),
            vec!["words", "AutoVOT"]
        );
    }
}
