//! Turns decoder output back into an interval tier.
//!
//! The decoder reports each VOT in milliseconds relative to the start of the
//! window it searched. A prediction whose onset comes after its offset is a
//! prevoiced (negative) VOT; its boundaries are swapped and its label gets a
//! `neg ` prefix.

use std::cmp::Ordering;

use crate::annotation::{Interval, IntervalTier, TIME_EPSILON_S};
use crate::error::DecodeError;

#[cfg(test)]
mod tests;

/// Prefix added to the label of prevoiced VOTs.
pub const NEGATIVE_VOT_PREFIX: &str = "neg ";

/// One line of the window-description file.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpan {
    pub id: usize,
    pub xmin: f64,
    pub xmax: f64,
}

/// One line of the decoder's prediction file.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub window_id: usize,
    /// Kept verbatim; it becomes the interval label.
    pub confidence: String,
    pub xmin_ms: f64,
    pub xmax_ms: f64,
}

impl PredictionRecord {
    pub fn is_negative(&self) -> bool {
        self.xmin_ms >= self.xmax_ms
    }
}

/// A prediction placed on the document timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedVot {
    pub window_id: usize,
    pub xmin: f64,
    pub xmax: f64,
    pub mark: String,
}

/// Reads the window-description file. Field 0 is the audio path, quoted when
/// written by [`TextGridFrontEnd`](crate::pipeline::front_end::TextGridFrontEnd);
/// the next two fields are the window bounds in seconds.
pub fn parse_windows(contents: &str) -> Result<Vec<WindowSpan>, DecodeError> {
    let mut windows = Vec::new();
    for (line_idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let rest = skip_path_field(line).ok_or_else(|| {
            DecodeError::parse("window file", line_idx + 1, "unterminated quoted path")
        })?;
        let fields: Vec<&str> = rest.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(DecodeError::parse(
                "window file",
                line_idx + 1,
                format!("expected at least 3 fields, found {}", fields.len() + 1),
            ));
        }
        let xmin = parse_number(fields[0], "window file", line_idx + 1)?;
        let xmax = parse_number(fields[1], "window file", line_idx + 1)?;
        windows.push(WindowSpan {
            id: windows.len(),
            xmin,
            xmax,
        });
    }
    Ok(windows)
}

/// Everything after the leading path field. Inside quotes, `""` is a literal quote.
fn skip_path_field(line: &str) -> Option<&str> {
    let Some(quoted) = line.strip_prefix('"') else {
        return Some(line.find(char::is_whitespace).map_or("", |end| &line[end..]));
    };
    let mut chars = quoted.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch != '"' {
            continue;
        }
        if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            continue;
        }
        return Some(&quoted[idx + 1..]);
    }
    None
}

pub fn parse_predictions(contents: &str) -> Result<Vec<PredictionRecord>, DecodeError> {
    let mut records = Vec::new();
    for (line_idx, line) in contents.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [] => continue,
            [confidence, xmin, xmax] => {
                parse_number(confidence, "prediction file", line_idx + 1)?;
                records.push(PredictionRecord {
                    window_id: records.len(),
                    confidence: (*confidence).to_string(),
                    xmin_ms: parse_number(xmin, "prediction file", line_idx + 1)?,
                    xmax_ms: parse_number(xmax, "prediction file", line_idx + 1)?,
                });
            }
            _ => {
                return Err(DecodeError::parse(
                    "prediction file",
                    line_idx + 1,
                    format!("expected 3 fields, found {}", fields.len()),
                ))
            }
        }
    }
    Ok(records)
}

fn parse_number(value: &str, context: &'static str, line: usize) -> Result<f64, DecodeError> {
    let parsed = value
        .parse::<f64>()
        .map_err(|err| DecodeError::parse(context, line, format!("'{value}': {err}")))?;
    if !parsed.is_finite() {
        return Err(DecodeError::parse(
            context,
            line,
            format!("'{value}' is not a finite number"),
        ));
    }
    Ok(parsed)
}

/// Converts relative millisecond offsets into absolute seconds.
///
/// Every window must have exactly one prediction and vice versa; each record is
/// joined to the window whose id it carries.
pub fn place_predictions(
    windows: &[WindowSpan],
    predictions: &[PredictionRecord],
) -> Result<Vec<PlacedVot>, DecodeError> {
    if windows.len() != predictions.len() {
        return Err(DecodeError::reconstruct(format!(
            "{} windows but {} predictions",
            windows.len(),
            predictions.len()
        )));
    }

    predictions
        .iter()
        .map(|record| {
            let window = windows
                .iter()
                .find(|window| window.id == record.window_id)
                .ok_or_else(|| {
                    DecodeError::reconstruct(format!(
                        "prediction refers to unknown window {}",
                        record.window_id
                    ))
                })?;
            Ok(place(window, record))
        })
        .collect()
}

fn place(window: &WindowSpan, record: &PredictionRecord) -> PlacedVot {
    let left = window.xmin;
    if record.is_negative() {
        PlacedVot {
            window_id: window.id,
            xmin: left + record.xmax_ms / 1000.0,
            xmax: left + record.xmin_ms / 1000.0,
            mark: format!("{NEGATIVE_VOT_PREFIX}{}", record.confidence),
        }
    } else {
        PlacedVot {
            window_id: window.id,
            xmin: left + record.xmin_ms / 1000.0,
            xmax: left + record.xmax_ms / 1000.0,
            mark: record.confidence.clone(),
        }
    }
}

/// Interleaves predictions with empty intervals so the tier covers
/// `[doc_xmin, doc_xmax]` without gaps.
pub fn build_tier(
    name: &str,
    doc_xmin: f64,
    doc_xmax: f64,
    mut placed: Vec<PlacedVot>,
) -> Result<IntervalTier, DecodeError> {
    if placed.is_empty() {
        return Err(DecodeError::NoPredictions);
    }
    placed.sort_by(|a, b| a.xmin.partial_cmp(&b.xmin).unwrap_or(Ordering::Equal));

    let mut intervals = Vec::with_capacity(placed.len() * 2 + 1);
    let mut cursor = doc_xmin;
    for vot in placed {
        if vot.xmin < cursor - TIME_EPSILON_S {
            return Err(DecodeError::reconstruct(if intervals.is_empty() {
                format!(
                    "VOT in window {} starts at {:.6}s, before the document start {doc_xmin:.6}s",
                    vot.window_id, vot.xmin
                )
            } else {
                format!(
                    "VOT in window {} starts at {:.6}s and overlaps the previous one ending at {cursor:.6}s",
                    vot.window_id, vot.xmin
                )
            }));
        }
        if vot.xmin - cursor > TIME_EPSILON_S {
            intervals.push(Interval::empty(cursor, vot.xmin));
        }
        let start = vot.xmin.max(cursor);
        cursor = vot.xmax;
        intervals.push(Interval::new(start, vot.xmax, vot.mark));
    }

    if cursor > doc_xmax + TIME_EPSILON_S {
        return Err(DecodeError::reconstruct(format!(
            "last VOT ends at {cursor:.6}s, after the document end {doc_xmax:.6}s"
        )));
    }
    if doc_xmax - cursor > TIME_EPSILON_S {
        intervals.push(Interval::empty(cursor, doc_xmax));
    }

    IntervalTier::new(name, doc_xmin, doc_xmax, intervals)
}

/// Parses both files and builds the output tier in one step.
pub fn reconstruct_tier(
    name: &str,
    doc_xmin: f64,
    doc_xmax: f64,
    window_file: &str,
    prediction_file: &str,
) -> Result<IntervalTier, DecodeError> {
    let windows = parse_windows(window_file)?;
    let predictions = parse_predictions(prediction_file)?;
    if predictions.is_empty() {
        return Err(DecodeError::NoPredictions);
    }
    let placed = place_predictions(&windows, &predictions)?;
    build_tier(name, doc_xmin, doc_xmax, placed)
}
