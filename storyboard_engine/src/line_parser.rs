//! C2 — Format Detector & Line Parser (spec.md §4.2).

use std::sync::LazyLock;

use regex::Regex;
use storyboard_core::{ParsedLine, Scene};

static TIMESTAMPED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(\d{1,2}):(\d{2})(\.(\d{1,3}))?\](.*)$").unwrap());

static STRUCTURED_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\s+(.+)$").unwrap());

static BRACKET_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[(.+)\]$").unwrap());

static EXPLICIT_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[(\d+(?:\.\d+)?)s\]").unwrap());

/// The three lyric-input formats spec.md §4.2 auto-detects between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Timestamped,
    Structured,
    Plain,
}

/// Looks at the first 20 non-empty lines and classifies the input
/// the way `detect_format` in `storyboard.py` does: count `T`
/// timestamped-prefix lines and `S` `# Section` lines, then
/// `T > 0.3 * total -> Timestamped`, else `S > 0 -> Structured`, else
/// `Plain`.
#[must_use]
pub fn detect_format(text: &str) -> InputFormat {
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(20)
        .collect();

    if sample.is_empty() {
        return InputFormat::Plain;
    }

    let total = sample.len() as f64;
    let t = sample
        .iter()
        .filter(|l| TIMESTAMPED_LINE.is_match(l.trim()))
        .count() as f64;
    let s = sample
        .iter()
        .filter(|l| STRUCTURED_HEADER.is_match(l.trim()))
        .count();

    if t > 0.3 * total {
        InputFormat::Timestamped
    } else if s > 0 {
        InputFormat::Structured
    } else {
        InputFormat::Plain
    }
}

/// Strips a `[3.5s]`-style explicit duration marker from `text`
/// wherever it appears, returning the stripped text and the duration
/// in milliseconds if one was found.
fn extract_explicit_duration(text: &str) -> (String, Option<u32>) {
    if let Some(caps) = EXPLICIT_DURATION.captures(text) {
        let seconds: f64 = caps[1].parse().unwrap_or(0.0);
        let stripped = EXPLICIT_DURATION.replace(text, "").trim().to_string();
        (stripped, Some((seconds * 1000.0).round() as u32))
    } else {
        (text.to_string(), None)
    }
}

fn parse_timestamp(minutes: &str, seconds: &str, millis: Option<&str>) -> Option<u64> {
    let m: u64 = minutes.parse().ok()?;
    let s: u64 = seconds.parse().ok()?;
    let ms: u64 = match millis {
        Some(raw) => {
            let padded = format!("{raw:0<3}");
            padded.get(..3)?.parse().ok()?
        }
        None => 0,
    };
    Some((m * 60 + s) * 1000 + ms)
}

/// Detects the input format and parses `raw_text` into an ordered
/// `ParsedLine` sequence. `Tag`s are not resolved here — C1 runs
/// afterward on the returned lines' `text`.
#[must_use]
pub fn parse(raw_text: &str) -> Vec<ParsedLine> {
    match detect_format(raw_text) {
        InputFormat::Timestamped => parse_timestamped(raw_text),
        InputFormat::Structured => parse_structured(raw_text),
        InputFormat::Plain => parse_plain(raw_text),
    }
}

fn parse_timestamped(raw_text: &str) -> Vec<ParsedLine> {
    let mut lines = Vec::new();
    let mut line_number = 0u32;

    for raw_line in raw_text.lines() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        line_number += 1;

        let (timestamp_ms, remainder) = match TIMESTAMPED_LINE.captures(trimmed) {
            Some(caps) => {
                let ts = parse_timestamp(
                    &caps[1],
                    &caps[2],
                    caps.get(4).map(|m| m.as_str()),
                );
                (ts, caps[5].trim().to_string())
            }
            None => (None, trimmed.to_string()),
        };

        let (text, explicit_duration_ms) = extract_explicit_duration(&remainder);

        lines.push(ParsedLine {
            text,
            timestamp_ms,
            section: None,
            tags: Vec::new(),
            line_number,
            explicit_duration_ms,
        });
    }

    lines
}

fn parse_structured(raw_text: &str) -> Vec<ParsedLine> {
    let mut lines = Vec::new();
    let mut current_section: Option<String> = None;
    let mut line_number = 0u32;

    for raw_line in raw_text.lines() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        line_number += 1;

        if let Some(caps) = STRUCTURED_HEADER.captures(trimmed) {
            current_section = Some(caps[1].trim().to_string());
            continue;
        }

        let (text, explicit_duration_ms) = extract_explicit_duration(trimmed);

        lines.push(ParsedLine {
            text,
            timestamp_ms: None,
            section: current_section.clone(),
            tags: Vec::new(),
            line_number,
            explicit_duration_ms,
        });
    }

    lines
}

fn parse_plain(raw_text: &str) -> Vec<ParsedLine> {
    let mut lines = Vec::new();
    let mut line_number = 0u32;

    for raw_line in raw_text.lines() {
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        line_number += 1;

        if let Some(caps) = BRACKET_PLACEHOLDER.captures(trimmed)
            && !TIMESTAMPED_LINE.is_match(trimmed)
            && !EXPLICIT_DURATION.is_match(trimmed)
        {
            let contents = caps[1].trim();
            // "[Instrumental]" is not a section marker (spec.md §3) —
            // it's a real scene, same as the gap filler's synthetic
            // entries, so it becomes a normal text line carrying the
            // canonical instrumental source string instead of an
            // empty-text placeholder.
            if contents.eq_ignore_ascii_case("instrumental") {
                lines.push(ParsedLine {
                    text: Scene::INSTRUMENTAL_SOURCE.to_string(),
                    timestamp_ms: None,
                    section: Some("instrumental".to_string()),
                    tags: Vec::new(),
                    line_number,
                    explicit_duration_ms: None,
                });
                continue;
            }

            lines.push(ParsedLine {
                text: String::new(),
                timestamp_ms: None,
                section: Some(contents.to_string()),
                tags: Vec::new(),
                line_number,
                explicit_duration_ms: None,
            });
            continue;
        }

        let (text, explicit_duration_ms) = extract_explicit_duration(trimmed);

        lines.push(ParsedLine {
            text,
            timestamp_ms: None,
            section: None,
            tags: Vec::new(),
            line_number,
            explicit_duration_ms,
        });
    }

    lines
}
