//! TextGrid documents as the decoder sees them.
//!
//! Documents are held as `textgrid` crate values and read or written as Praat
//! text by [`praat`]. Everything the decoder adds passes through
//! [`IntervalTier`], whose constructor enforces that the tier is ordered,
//! gap-free and spans its declared range.

pub mod merge;
mod praat;

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use textgrid::{Interval as GridInterval, TextGrid, Tier as GridTier, TierType};

use crate::error::DecodeError;
use crate::tier_spec::TierSelector;

/// Boundary tolerance in seconds when checking contiguity.
pub const TIME_EPSILON_S: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub xmin: f64,
    pub xmax: f64,
    pub text: String,
}

impl Interval {
    pub fn new(xmin: f64, xmax: f64, text: impl Into<String>) -> Self {
        Self {
            xmin,
            xmax,
            text: text.into(),
        }
    }

    pub fn empty(xmin: f64, xmax: f64) -> Self {
        Self::new(xmin, xmax, "")
    }

    pub fn duration(&self) -> f64 {
        self.xmax - self.xmin
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntervalTier {
    name: String,
    xmin: f64,
    xmax: f64,
    intervals: Vec<Interval>,
}

impl IntervalTier {
    pub fn new(
        name: impl Into<String>,
        xmin: f64,
        xmax: f64,
        intervals: Vec<Interval>,
    ) -> Result<Self, DecodeError> {
        let name = name.into();
        let invalid = |message: String| {
            DecodeError::annotation(format!("building tier '{name}'"), message)
        };

        if !xmin.is_finite() || !xmax.is_finite() || xmin > xmax {
            return Err(invalid(format!("invalid tier span [{xmin}, {xmax}]")));
        }
        let (Some(first), Some(last)) = (intervals.first(), intervals.last()) else {
            return Err(invalid("tier has no intervals".to_string()));
        };
        if (first.xmin - xmin).abs() > TIME_EPSILON_S {
            return Err(invalid(format!(
                "first interval starts at {} instead of {xmin}",
                first.xmin
            )));
        }
        if (last.xmax - xmax).abs() > TIME_EPSILON_S {
            return Err(invalid(format!(
                "last interval ends at {} instead of {xmax}",
                last.xmax
            )));
        }
        for (idx, interval) in intervals.iter().enumerate() {
            if !interval.xmin.is_finite() || !interval.xmax.is_finite() {
                return Err(invalid(format!("interval {idx} has a non-finite boundary")));
            }
            if interval.xmin > interval.xmax {
                return Err(invalid(format!(
                    "interval {idx} is reversed: [{}, {}]",
                    interval.xmin, interval.xmax
                )));
            }
        }
        for (idx, pair) in intervals.windows(2).enumerate() {
            let gap = pair[1].xmin - pair[0].xmax;
            if gap.abs() > TIME_EPSILON_S {
                let kind = if gap > 0.0 { "gap" } else { "overlap" };
                return Err(invalid(format!(
                    "{kind} of {:.6}s between intervals {idx} and {}",
                    gap.abs(),
                    idx + 1
                )));
            }
        }

        Ok(Self {
            name,
            xmin,
            xmax,
            intervals,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Intervals carrying a non-empty label.
    pub fn labeled(&self) -> impl Iterator<Item = &Interval> {
        self.intervals
            .iter()
            .filter(|interval| !interval.text.trim().is_empty())
    }

    fn into_grid_tier(self) -> GridTier {
        GridTier {
            name: self.name,
            tier_type: TierType::IntervalTier,
            xmin: self.xmin,
            xmax: self.xmax,
            intervals: self
                .intervals
                .into_iter()
                .map(|interval| GridInterval {
                    xmin: interval.xmin,
                    xmax: interval.xmax,
                    text: interval.text,
                })
                .collect(),
            points: Vec::new(),
        }
    }
}

/// A TextGrid loaded for decoding. Existing tiers are carried through untouched.
pub struct AnnotationDocument {
    grid: TextGrid,
}

impl AnnotationDocument {
    pub fn new(xmin: f64, xmax: f64) -> Result<Self, DecodeError> {
        let grid = TextGrid::new(xmin, xmax)
            .map_err(|err| DecodeError::annotation("creating TextGrid", err))?;
        Ok(Self { grid })
    }

    /// Reads a Praat text TextGrid (long or short layout, UTF-8 or UTF-16).
    pub fn read(path: &Path) -> Result<Self, DecodeError> {
        let context = || format!("reading '{}'", path.display());
        let bytes = fs::read(path).map_err(|err| DecodeError::io(context(), err))?;
        let grid = praat::decode_text(&bytes)
            .and_then(|text| praat::parse_text_grid(&text))
            .map_err(|err| DecodeError::annotation(context(), err))?;
        Ok(Self { grid })
    }

    /// Writes the long text layout next to `path` and renames it into place, so
    /// a failed write never leaves a truncated file behind.
    pub fn write(&self, path: &Path) -> Result<(), DecodeError> {
        let context = || format!("writing '{}'", path.display());
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut staged = tempfile::Builder::new()
            .prefix(".autovot_")
            .suffix(".TextGrid")
            .tempfile_in(parent)
            .map_err(|err| DecodeError::io(context(), err))?;
        staged
            .write_all(praat::to_long_text(&self.grid).as_bytes())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|err| DecodeError::io(context(), err))?;
        if let Ok(existing) = fs::metadata(path) {
            staged
                .as_file()
                .set_permissions(existing.permissions())
                .map_err(|err| DecodeError::io(context(), err))?;
        }
        staged
            .persist(path)
            .map_err(|err| DecodeError::io(context(), err.error))?;
        Ok(())
    }

    pub fn xmin(&self) -> f64 {
        self.grid.xmin
    }

    pub fn xmax(&self) -> f64 {
        self.grid.xmax
    }

    pub fn tier_count(&self) -> usize {
        self.grid.tiers.len()
    }

    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.grid.tiers.iter().map(|tier| tier.name.as_str())
    }

    /// First interval tier whose name matches `selector`.
    pub fn interval_tier(&self, selector: &TierSelector) -> Option<Vec<Interval>> {
        self.grid
            .tiers
            .iter()
            .find(|tier| {
                tier.tier_type == TierType::IntervalTier && selector.matches_name(&tier.name)
            })
            .map(|tier| {
                tier.intervals
                    .iter()
                    .map(|interval| {
                        Interval::new(interval.xmin, interval.xmax, interval.text.clone())
                    })
                    .collect()
            })
    }

    /// Points of the first point tier whose name matches `selector`.
    pub fn point_tier(&self, selector: &TierSelector) -> Option<Vec<(f64, String)>> {
        self.grid
            .tiers
            .iter()
            .find(|tier| tier.tier_type == TierType::PointTier && selector.matches_name(&tier.name))
            .map(|tier| {
                tier.points
                    .iter()
                    .map(|point| (point.time, point.mark.clone()))
                    .collect()
            })
    }

    /// Appends `tier` after the existing ones. The tier must span the document.
    ///
    /// Duplicate names are accepted here; collision handling belongs to
    /// [`merge::merge_tier`].
    pub fn append_tier(&mut self, tier: IntervalTier) -> Result<(), DecodeError> {
        if (tier.xmin - self.xmin()).abs() > TIME_EPSILON_S
            || (tier.xmax - self.xmax()).abs() > TIME_EPSILON_S
        {
            return Err(DecodeError::annotation(
                format!("appending tier '{}'", tier.name),
                format!(
                    "tier spans [{}, {}] but the document spans [{}, {}]",
                    tier.xmin,
                    tier.xmax,
                    self.xmin(),
                    self.xmax()
                ),
            ));
        }
        self.grid.tiers.push(tier.into_grid_tier());
        Ok(())
    }
}

impl fmt::Debug for AnnotationDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationDocument")
            .field("xmin", &self.xmin())
            .field("xmax", &self.xmax())
            .field("tiers", &self.tier_names().collect::<Vec<_>>())
            .finish()
    }
}
