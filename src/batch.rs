//! Input pairing and the per-file loop.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::DecodeError;
use crate::pipeline::runtime::VotDecoder;
use crate::types::{is_textgrid, is_valid_wav, FileJob, JobOutcome, JobStatus};

/// Turns the two positional arguments into jobs.
///
/// Either both arguments name a single WAV and TextGrid, or both are list
/// files with one path per line.
pub fn resolve_jobs(wav_arg: &Path, textgrid_arg: &Path) -> Result<Vec<FileJob>, DecodeError> {
    match (is_valid_wav(wav_arg), is_textgrid(textgrid_arg)) {
        (true, true) => {
            tracing::info!("input arguments are a single WAV/TextGrid pair");
            Ok(vec![FileJob::new(0, wav_arg, textgrid_arg)])
        }
        (true, false) => Err(DecodeError::config(format!(
            "'{}' is a valid WAV file while '{}' is not a valid TextGrid",
            wav_arg.display(),
            textgrid_arg.display()
        ))),
        (false, true) => Err(DecodeError::config(format!(
            "'{}' is not a valid WAV file while '{}' is a valid TextGrid",
            wav_arg.display(),
            textgrid_arg.display()
        ))),
        (false, false) => {
            let wav_list = read_list(wav_arg)?;
            let textgrid_list = read_list(textgrid_arg)?;
            pair_lists(&wav_list, &textgrid_list).map_err(|err| match err {
                DecodeError::Config { message } => DecodeError::config(format!(
                    "{message} ('{}' vs '{}')",
                    wav_arg.display(),
                    textgrid_arg.display()
                )),
                other => other,
            })
        }
    }
}

fn read_list(path: &Path) -> Result<String, DecodeError> {
    fs::read_to_string(path).map_err(|err| {
        DecodeError::config(format!("cannot read list file '{}': {err}", path.display()))
    })
}

/// Pairs two line-delimited lists. Lines where either side is blank are skipped,
/// but the line counts must match exactly.
pub fn pair_lists(wav_list: &str, textgrid_list: &str) -> Result<Vec<FileJob>, DecodeError> {
    let wavs: Vec<&str> = wav_list.lines().collect();
    let textgrids: Vec<&str> = textgrid_list.lines().collect();
    if wavs.len() != textgrids.len() {
        return Err(DecodeError::config(format!(
            "WAV list has {} lines but TextGrid list has {}; they should have the same number of lines",
            wavs.len(),
            textgrids.len()
        )));
    }

    Ok(wavs
        .iter()
        .zip(&textgrids)
        .enumerate()
        .filter_map(|(index, (wav, textgrid))| {
            let (wav, textgrid) = (wav.trim(), textgrid.trim());
            if wav.is_empty() || textgrid.is_empty() {
                return None;
            }
            Some(FileJob::new(index, wav, textgrid))
        })
        .collect())
}

/// Outcome of every job, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn push(&mut self, outcome: JobOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn written_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, JobStatus::Written { .. }))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn log_summary(&self) {
        if self.is_success() {
            tracing::info!(jobs = self.outcomes.len(), "All done.");
            return;
        }
        tracing::warn!("**********************************");
        tracing::warn!("Prediction made for all files except these ones, where something was wrong:");
        for outcome in self.failures() {
            if let JobStatus::Failed { kind, message } = &outcome.status {
                tracing::warn!(
                    wav = %outcome.job.audio.display(),
                    textgrid = %outcome.job.annotation.display(),
                    ?kind,
                    %message,
                    "failed"
                );
            }
        }
        tracing::warn!(
            "Look for lines beginning with WARN or ERROR in the program's output to see what went wrong."
        );
        tracing::warn!("**********************************");
    }
}

/// Runs `jobs` in order. `on_job` sees each outcome as soon as it is known.
pub fn run_batch(
    decoder: &VotDecoder,
    jobs: &[FileJob],
    mut on_job: impl FnMut(&JobOutcome),
) -> BatchReport {
    jobs.iter().fold(BatchReport::default(), |mut report, job| {
        let outcome = decoder.decode_job(job);
        on_job(&outcome);
        report.push(outcome);
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;

    #[test]
    fn pair_lists_checks_line_counts() {
        let err = pair_lists("a.wav\nb.wav\nc.wav\n", "a.TextGrid\nb.TextGrid\n")
            .expect_err("mismatch");
        assert!(err.is_fatal());
    }

    #[test]
    fn pair_lists_skips_blank_entries() {
        let jobs = pair_lists("a.wav\n\nc.wav\n", "a.TextGrid\nb.TextGrid\n c.TextGrid \n")
            .expect("pairs");

        assert_eq!(
            jobs,
            vec![
                FileJob::new(0, "a.wav", "a.TextGrid"),
                FileJob::new(2, "c.wav", "c.TextGrid"),
            ]
        );
    }

    #[test]
    fn resolve_jobs_rejects_half_single_pair() {
        let dir = tempfile::tempdir().expect("dir");
        let grid = dir.path().join("a.TextGrid");
        let list = dir.path().join("wavs.txt");
        fs::write(&grid, "").expect("grid");
        fs::write(&list, "a.wav\n").expect("list");

        let err = resolve_jobs(&list, &grid).expect_err("half pair");
        assert!(err.is_fatal());
    }

    #[test]
    fn resolve_jobs_reads_list_files() {
        let dir = tempfile::tempdir().expect("dir");
        let wavs = dir.path().join("wavs.txt");
        let grids = dir.path().join("grids.txt");
        fs::write(&wavs, "a.wav\nb.wav\n").expect("wavs");
        fs::write(&grids, "a.TextGrid\nb.TextGrid\n").expect("grids");

        let jobs = resolve_jobs(&wavs, &grids).expect("jobs");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].annotation, Path::new("b.TextGrid"));
    }

    #[test]
    fn report_counts_failures() {
        let mut report = BatchReport::default();
        report.push(JobOutcome::failed(
            FileJob::new(0, "a.wav", "a.TextGrid"),
            FailureKind::Problematic,
            "no windows",
        ));
        report.push(JobOutcome {
            job: FileJob::new(1, "b.wav", "b.TextGrid"),
            status: JobStatus::Written {
                predicted_vots: 2,
                merge: crate::annotation::merge::MergeOutcome::Appended,
            },
        });

        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.written_count(), 1);
        assert!(!report.is_success());
        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["outcomes"][0]["status"], "failed");
        assert_eq!(json["outcomes"][0]["kind"], "problematic");
        assert_eq!(json["outcomes"][1]["merge"], "appended");
    }
}
