use crate::error::DecodeError;

/// Mark filter value that accepts any non-empty mark.
pub const ANY_MARK: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkFilter {
    Any,
    Exact(String),
}

impl MarkFilter {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == ANY_MARK {
            Self::Any
        } else {
            Self::Exact(trimmed.to_string())
        }
    }

    /// Empty marks never match: they are the gaps between labeled intervals.
    pub fn matches(&self, mark: &str) -> bool {
        let mark = mark.trim();
        if mark.is_empty() {
            return false;
        }
        match self {
            Self::Any => true,
            Self::Exact(expected) => mark == expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierSelector {
    pub name: String,
    pub mark: MarkFilter,
}

impl TierSelector {
    /// Tier names compare case-insensitively after trimming.
    pub fn matches_name(&self, tier_name: &str) -> bool {
        tier_name.trim().eq_ignore_ascii_case(self.name.trim())
    }
}

/// Where the decoder should search for VOTs.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowSource {
    /// Intervals of a dedicated window tier.
    WindowTier(TierSelector),
    /// Labeled VOT intervals padded by `min_s` on the left and `max_s` on the right.
    PaddedVot {
        vot: TierSelector,
        min_s: f64,
        max_s: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierSpec {
    pub window: WindowSource,
    /// Manually labeled VOT tier, kept even when windows come from a window tier.
    pub vot: Option<TierSelector>,
}

/// Raw tier options as they arrive from the command line.
#[derive(Debug, Clone)]
pub struct TierOptions {
    pub vot_tier: Option<String>,
    pub vot_mark: String,
    pub window_tier: Option<String>,
    pub window_mark: String,
    pub window_min_ms: f64,
    pub window_max_ms: f64,
}

impl TierOptions {
    pub const DEFAULT_WINDOW_MIN_MS: f64 = -50.0;
    pub const DEFAULT_WINDOW_MAX_MS: f64 = 800.0;
}

impl Default for TierOptions {
    fn default() -> Self {
        Self {
            vot_tier: None,
            vot_mark: ANY_MARK.to_string(),
            window_tier: None,
            window_mark: ANY_MARK.to_string(),
            window_min_ms: Self::DEFAULT_WINDOW_MIN_MS,
            window_max_ms: Self::DEFAULT_WINDOW_MAX_MS,
        }
    }
}

impl TierSpec {
    pub fn resolve(options: &TierOptions) -> Result<Self, DecodeError> {
        let vot = non_blank(options.vot_tier.as_deref()).map(|name| TierSelector {
            name,
            mark: MarkFilter::parse(&options.vot_mark),
        });
        let window_tier = non_blank(options.window_tier.as_deref()).map(|name| TierSelector {
            name,
            mark: MarkFilter::parse(&options.window_mark),
        });

        let window = match (window_tier, vot.clone()) {
            (Some(window_tier), vot_tier) => {
                if vot_tier.is_some() {
                    tracing::info!(
                        window_tier = %window_tier.name,
                        "both window and VOT tiers given; window padding is ignored"
                    );
                }
                WindowSource::WindowTier(window_tier)
            }
            (None, Some(vot)) => {
                if !options.window_min_ms.is_finite() || !options.window_max_ms.is_finite() {
                    return Err(DecodeError::config(format!(
                        "window padding must be finite (got {} ms, {} ms)",
                        options.window_min_ms, options.window_max_ms
                    )));
                }
                WindowSource::PaddedVot {
                    vot,
                    min_s: options.window_min_ms / 1000.0,
                    max_s: options.window_max_ms / 1000.0,
                }
            }
            (None, None) => {
                return Err(DecodeError::config(
                    "either a window tier or a VOT tier must be specified",
                ))
            }
        };

        Ok(Self { window, vot })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
