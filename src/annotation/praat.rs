//! Praat text-format TextGrid files.
//!
//! Praat saves TextGrids in a long (labelled) or short text layout, in UTF-8 or
//! in UTF-16 with a byte-order mark. Once labels, `!` comments and `[n]` indices
//! are dropped, both layouts are the same sequence of values, so a single
//! tokenizer reads either. Files are written in the long layout Praat itself
//! produces, with embedded quotes doubled.

use textgrid::{Interval, Point, TextGrid, Tier, TierType};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Flag(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Number(value) => format!("number {value}"),
            Self::Text(value) => format!("string \"{value}\""),
            Self::Flag(value) => format!("flag <{value}>"),
        }
    }
}

/// Decodes file bytes, honouring a UTF-16 or UTF-8 byte-order mark.
pub(crate) fn decode_text(bytes: &[u8]) -> Result<String, String> {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => decode_utf8(rest),
        _ => decode_utf8(bytes),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err("UTF-16 text has an odd number of bytes".to_string());
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|err| format!("invalid UTF-16 text: {err}"))
}

fn decode_utf8(bytes: &[u8]) -> Result<String, String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|err| format!("invalid UTF-8 text: {err}"))
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        match ch {
            '"' => {
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '"')) => {
                            if matches!(chars.peek(), Some((_, '"'))) {
                                chars.next();
                                value.push('"');
                            } else {
                                break;
                            }
                        }
                        Some((_, other)) => value.push(other),
                        None => {
                            return Err(format!("unterminated string starting at byte {start}"))
                        }
                    }
                }
                tokens.push(Token::Text(value));
            }
            '!' => {
                for (_, skipped) in chars.by_ref() {
                    if skipped == '\n' {
                        break;
                    }
                }
            }
            '[' => {
                for (_, skipped) in chars.by_ref() {
                    if skipped == ']' {
                        break;
                    }
                }
            }
            '<' => {
                let mut flag = String::new();
                for (_, next) in chars.by_ref() {
                    if next == '>' {
                        break;
                    }
                    flag.push(next);
                }
                tokens.push(Token::Flag(flag));
            }
            c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => {
                let mut end = start + c.len_utf8();
                while let Some(&(idx, next)) = chars.peek() {
                    if next.is_whitespace() {
                        break;
                    }
                    end = idx + next.len_utf8();
                    chars.next();
                }
                let raw = &text[start..end];
                let value = raw
                    .parse::<f64>()
                    .map_err(|err| format!("invalid number '{raw}': {err}"))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() => {
                while chars
                    .peek()
                    .is_some_and(|&(_, next)| next.is_alphanumeric() || matches!(next, '_' | '?'))
                {
                    chars.next();
                }
            }
            _ => {}
        }
    }
    Ok(tokens)
}

struct Tokens {
    inner: std::vec::IntoIter<Token>,
}

impl Tokens {
    fn next(&mut self, what: &str) -> Result<Token, String> {
        self.inner
            .next()
            .ok_or_else(|| format!("file ends before {what}"))
    }

    fn number(&mut self, what: &str) -> Result<f64, String> {
        match self.next(what)? {
            Token::Number(value) if value.is_finite() => Ok(value),
            other => Err(format!("expected {what}, found {}", other.describe())),
        }
    }

    fn count(&mut self, what: &str) -> Result<usize, String> {
        let value = self.number(what)?;
        if value < 0.0 || value.fract() != 0.0 {
            return Err(format!("{what} must be a non-negative integer, found {value}"));
        }
        Ok(value as usize)
    }

    fn text(&mut self, what: &str) -> Result<String, String> {
        match self.next(what)? {
            Token::Text(value) => Ok(value),
            other => Err(format!("expected {what}, found {}", other.describe())),
        }
    }
}

/// Parses the long or short text layout.
pub(crate) fn parse_text_grid(text: &str) -> Result<TextGrid, String> {
    let mut tokens = Tokens {
        inner: tokenize(text)?.into_iter(),
    };

    let file_type = tokens.text("file type")?;
    if file_type != "ooTextFile" {
        return Err(format!("unsupported file type '{file_type}'"));
    }
    let object_class = tokens.text("object class")?;
    if object_class != "TextGrid" {
        return Err(format!("object class is '{object_class}', not 'TextGrid'"));
    }

    let xmin = tokens.number("xmin")?;
    let xmax = tokens.number("xmax")?;
    let tier_count = match tokens.next("tiers flag")? {
        Token::Flag(flag) if flag == "exists" => tokens.count("tier count")?,
        Token::Flag(flag) if flag == "absent" => 0,
        other => return Err(format!("expected tiers flag, found {}", other.describe())),
    };

    let mut grid = TextGrid::new(xmin, xmax).map_err(|err| err.to_string())?;
    for position in 1..=tier_count {
        let tier = parse_tier(&mut tokens).map_err(|err| format!("tier {position}: {err}"))?;
        grid.tiers.push(tier);
    }
    if let Some(extra) = tokens.inner.next() {
        return Err(format!(
            "unexpected {} after {tier_count} tiers",
            extra.describe()
        ));
    }
    Ok(grid)
}

fn parse_tier(tokens: &mut Tokens) -> Result<Tier, String> {
    let class = tokens.text("tier class")?;
    let name = tokens.text("tier name")?;
    let xmin = tokens.number("tier xmin")?;
    let xmax = tokens.number("tier xmax")?;
    let count = tokens.count("item count")?;

    match class.as_str() {
        "IntervalTier" => {
            let mut intervals = Vec::new();
            for _ in 0..count {
                intervals.push(Interval {
                    xmin: tokens.number("interval xmin")?,
                    xmax: tokens.number("interval xmax")?,
                    text: tokens.text("interval text")?,
                });
            }
            Ok(Tier {
                name,
                tier_type: TierType::IntervalTier,
                xmin,
                xmax,
                intervals,
                points: Vec::new(),
            })
        }
        "TextTier" => {
            let mut points = Vec::new();
            for _ in 0..count {
                points.push(Point {
                    time: tokens.number("point time")?,
                    mark: tokens.text("point mark")?,
                });
            }
            Ok(Tier {
                name,
                tier_type: TierType::PointTier,
                xmin,
                xmax,
                intervals: Vec::new(),
                points,
            })
        }
        other => Err(format!("unsupported tier class '{other}' ('{name}')")),
    }
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Renders `grid` in Praat's long text layout.
pub(crate) fn to_long_text(grid: &TextGrid) -> String {
    let mut out = String::from("File type = \"ooTextFile\"\nObject class = \"TextGrid\"\n\n");
    out.push_str(&format!("xmin = {}\nxmax = {}\n", grid.xmin, grid.xmax));
    if grid.tiers.is_empty() {
        out.push_str("tiers? <absent>\n");
        return out;
    }
    out.push_str(&format!("tiers? <exists>\nsize = {}\nitem []:\n", grid.tiers.len()));

    for (idx, tier) in grid.tiers.iter().enumerate() {
        let class = match tier.tier_type {
            TierType::IntervalTier => "IntervalTier",
            TierType::PointTier => "TextTier",
        };
        out.push_str(&format!("    item [{}]:\n", idx + 1));
        out.push_str(&format!("        class = {}\n", quoted(class)));
        out.push_str(&format!("        name = {}\n", quoted(&tier.name)));
        out.push_str(&format!("        xmin = {}\n", tier.xmin));
        out.push_str(&format!("        xmax = {}\n", tier.xmax));
        match tier.tier_type {
            TierType::IntervalTier => {
                out.push_str(&format!("        intervals: size = {}\n", tier.intervals.len()));
                for (n, interval) in tier.intervals.iter().enumerate() {
                    out.push_str(&format!("        intervals [{}]:\n", n + 1));
                    out.push_str(&format!("            xmin = {}\n", interval.xmin));
                    out.push_str(&format!("            xmax = {}\n", interval.xmax));
                    out.push_str(&format!("            text = {}\n", quoted(&interval.text)));
                }
            }
            TierType::PointTier => {
                out.push_str(&format!("        points: size = {}\n", tier.points.len()));
                for (n, point) in tier.points.iter().enumerate() {
                    out.push_str(&format!("        points [{}]:\n", n + 1));
                    out.push_str(&format!("            number = {}\n", point.time));
                    out.push_str(&format!("            mark = {}\n", quoted(&point.mark)));
                }
            }
        }
    }
    out
}
