use std::fs;
use std::path::{Path, PathBuf};

use crate::annotation::AnnotationDocument;
use crate::error::DecodeError;
use crate::pipeline::traits::{FrontEnd, FrontEndOutcome, FrontEndRequest};
use crate::tier_spec::{TierSelector, TierSpec, WindowSource};

/// A search window plus the VOT it was derived from (or the window itself when
/// no VOT is known).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchWindow {
    pub wav: PathBuf,
    pub xmin: f64,
    pub xmax: f64,
    pub vot_xmin: f64,
    pub vot_xmax: f64,
}

impl SearchWindow {
    /// The path is quoted so that spaces in it do not shift the numeric fields.
    fn to_line(&self) -> String {
        format!(
            "\"{}\" {:.6} {:.6} {:.6} {:.6}",
            self.wav.display().to_string().replace('"', "\"\""),
            self.xmin,
            self.xmax,
            self.vot_xmin,
            self.vot_xmax
        )
    }
}

/// Selects search windows from TextGrid tiers and writes the window and
/// feature-list files consumed by `VotFrontEnd2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextGridFrontEnd;

impl FrontEnd for TextGridFrontEnd {
    fn extract(&self, request: &FrontEndRequest<'_>) -> Result<FrontEndOutcome, DecodeError> {
        let textgrids = read_manifest(request.textgrid_list)?;
        let wavs = read_manifest(request.wav_list)?;
        if textgrids.len() != wavs.len() {
            return Err(DecodeError::invalid_input(format!(
                "manifests list {} TextGrids but {} WAV files",
                textgrids.len(),
                wavs.len()
            )));
        }

        let mut windows = Vec::new();
        let mut problematic = Vec::new();
        let mut reasons = Vec::new();
        for (textgrid, wav) in textgrids.iter().zip(&wavs) {
            match select_windows(wav, textgrid, request.tier_spec, request.max_num_instances) {
                Ok(found) => windows.extend(found),
                Err(reason) => {
                    tracing::warn!(textgrid = %textgrid.display(), %reason, "skipping file");
                    problematic.push(textgrid.clone());
                    reasons.push(reason);
                }
            }
        }

        if !problematic.is_empty() {
            return Ok(FrontEndOutcome::Problematic {
                files: problematic,
                reason: reasons.join("; "),
            });
        }
        if windows.is_empty() {
            return Ok(FrontEndOutcome::Problematic {
                files: textgrids,
                reason: "no windows to decode".to_string(),
            });
        }

        let window_lines: String = windows
            .iter()
            .map(|window| window.to_line() + "\n")
            .collect();
        let feature_lines: String = windows
            .iter()
            .enumerate()
            .map(|(idx, window)| {
                let stem = window
                    .wav
                    .file_stem()
                    .and_then(|value| value.to_str())
                    .unwrap_or("window")
                    .replace(char::is_whitespace, "_");
                format!(
                    "{}\n",
                    request.features_dir.join(format!("{stem}_{idx}.txt")).display()
                )
            })
            .collect();
        fs::write(request.window_file, window_lines)
            .map_err(|err| DecodeError::io("writing window file", err))?;
        fs::write(request.feature_list, feature_lines)
            .map_err(|err| DecodeError::io("writing feature list", err))?;

        tracing::debug!(windows = windows.len(), "front-end windows written");
        Ok(FrontEndOutcome::Ready {
            window_count: windows.len(),
        })
    }
}

pub fn read_manifest(path: &Path) -> Result<Vec<PathBuf>, DecodeError> {
    let contents = fs::read_to_string(path)
        .map_err(|err| DecodeError::io(format!("reading list '{}'", path.display()), err))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Windows for one WAV/TextGrid pair. `Err` carries the reason the pair is unusable.
pub fn select_windows(
    wav: &Path,
    textgrid: &Path,
    tier_spec: &TierSpec,
    max_num_instances: usize,
) -> Result<Vec<SearchWindow>, String> {
    let duration = wav_duration_seconds(wav)?;
    let document = AnnotationDocument::read(textgrid).map_err(|err| err.to_string())?;

    let mut windows = match &tier_spec.window {
        WindowSource::WindowTier(selector) => tier_intervals(&document, selector, textgrid)?
            .into_iter()
            .map(|(xmin, xmax)| SearchWindow {
                wav: wav.to_path_buf(),
                xmin: xmin.max(0.0),
                xmax: xmax.min(duration),
                vot_xmin: xmin,
                vot_xmax: xmax,
            })
            .collect::<Vec<_>>(),
        WindowSource::PaddedVot { vot, min_s, max_s } => {
            tier_intervals(&document, vot, textgrid)?
                .into_iter()
                .map(|(xmin, xmax)| SearchWindow {
                    wav: wav.to_path_buf(),
                    xmin: (xmin + min_s).max(0.0),
                    xmax: (xmax + max_s).min(duration),
                    vot_xmin: xmin,
                    vot_xmax: xmax,
                })
                .collect::<Vec<_>>()
        }
    };

    windows.retain(|window| {
        let usable = window.xmax > window.xmin;
        if !usable {
            tracing::warn!(
                textgrid = %textgrid.display(),
                xmin = window.xmin,
                xmax = window.xmax,
                "window is empty after clipping to the audio; skipped"
            );
        }
        usable
    });
    if max_num_instances > 0 && windows.len() > max_num_instances {
        tracing::info!(
            textgrid = %textgrid.display(),
            kept = max_num_instances,
            found = windows.len(),
            "limiting number of instances"
        );
        windows.truncate(max_num_instances);
    }
    if windows.is_empty() {
        return Err(format!(
            "no usable windows in '{}'",
            textgrid.display()
        ));
    }
    Ok(windows)
}

fn tier_intervals(
    document: &AnnotationDocument,
    selector: &TierSelector,
    textgrid: &Path,
) -> Result<Vec<(f64, f64)>, String> {
    let intervals = document.interval_tier(selector).ok_or_else(|| {
        format!(
            "no interval tier named '{}' in '{}'",
            selector.name,
            textgrid.display()
        )
    })?;
    let selected: Vec<(f64, f64)> = intervals
        .iter()
        .filter(|interval| selector.mark.matches(&interval.text))
        .map(|interval| (interval.xmin, interval.xmax))
        .collect();
    if selected.is_empty() {
        return Err(format!(
            "tier '{}' in '{}' has no intervals with the requested mark",
            selector.name,
            textgrid.display()
        ));
    }
    Ok(selected)
}

fn wav_duration_seconds(path: &Path) -> Result<f64, String> {
    let reader = hound::WavReader::open(path)
        .map_err(|err| format!("cannot read WAV '{}': {err}", path.display()))?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return Err(format!("WAV '{}' has a zero sample rate", path.display()));
    }
    Ok(reader.duration() as f64 / sample_rate as f64)
}
