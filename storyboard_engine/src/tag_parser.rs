//! C1 — Tag Parser (spec.md §4.1).
//!
//! Grammar: `{kind}` or `{kind:value}`, `kind` matching `[a-zA-Z_-]+`
//! case-insensitively and normalized to lowercase, `value` any run of
//! non-`}` characters trimmed of surrounding whitespace. Single-pass,
//! line-oriented; non-tag text is left untouched.

use std::str::FromStr;

use storyboard_core::{Tag, TagKind};

/// A non-fatal issue found while parsing tags out of a line.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line_number: u32,
    pub kind: DiagnosticKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// A `{...}` block whose kind isn't in the closed `TagKind` set.
    /// Left in the text verbatim; parsing continues.
    UnrecognizedTag { raw: String },
    /// A `{` with no matching `}` before end of line.
    UnterminatedTag,
    /// A `time` tag whose value didn't parse as `mm:ss(.mmm)` or plain
    /// seconds. The tag is kept, but `timestamp_ms` stays `None`.
    InvalidTimeValue { raw: String },
}

/// Strips every recognized `{tag}`/`{tag:value}` from `text`, returning
/// the stripped text, the tags found, a `time`-tag-derived timestamp
/// (if any and valid), and any diagnostics.
pub fn extract_tags(
    text: &str,
    line_number: u32,
) -> (String, Vec<Tag>, Option<u64>, Vec<Diagnostic>) {
    let mut out = String::with_capacity(text.len());
    let mut tags = Vec::new();
    let mut diagnostics = Vec::new();
    let mut timestamp_ms = None;

    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(rel_close) = text[i + 1..].find('}') {
                let close = i + 1 + rel_close;
                let inner = &text[i + 1..close];
                let char_offset = i as u32;

                match parse_tag_inner(inner) {
                    Some((kind, value)) => {
                        if kind == TagKind::Time
                            && let Some(raw) = &value
                        {
                            match parse_mm_ss(raw) {
                                Some(ms) => timestamp_ms = Some(ms),
                                None => diagnostics.push(Diagnostic {
                                    line_number,
                                    kind: DiagnosticKind::InvalidTimeValue { raw: raw.clone() },
                                }),
                            }
                        }
                        tags.push(Tag {
                            kind,
                            value,
                            line_index: line_number,
                            char_offset,
                        });
                    }
                    None => {
                        diagnostics.push(Diagnostic {
                            line_number,
                            kind: DiagnosticKind::UnrecognizedTag {
                                raw: inner.to_string(),
                            },
                        });
                        out.push_str(&text[i..=close]);
                    }
                }
                i = close + 1;
                continue;
            }
            diagnostics.push(Diagnostic {
                line_number,
                kind: DiagnosticKind::UnterminatedTag,
            });
            out.push_str(&text[i..]);
            break;
        }

        let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }

    (out, tags, timestamp_ms, diagnostics)
}

/// Splits `{kind}` / `{kind:value}` inner content into a known
/// `TagKind` and trimmed value, or `None` if `kind` isn't recognized.
fn parse_tag_inner(inner: &str) -> Option<(TagKind, Option<String>)> {
    let (kind_str, value) = match inner.split_once(':') {
        Some((k, v)) => (k, Some(v.trim().to_string())),
        None => (inner, None),
    };
    let kind = TagKind::from_str(&kind_str.trim().to_lowercase()).ok()?;
    Some((kind, value.filter(|v| !v.is_empty())))
}

/// Parses `mm:ss(.mmm)` or a plain-seconds string into milliseconds.
fn parse_mm_ss(raw: &str) -> Option<u64> {
    if let Some((m, rest)) = raw.split_once(':') {
        let minutes: u64 = m.trim().parse().ok()?;
        let (secs, millis) = match rest.split_once('.') {
            Some((s, ms)) => {
                let secs: u64 = s.trim().parse().ok()?;
                let ms_str = format!("{:0<3.3}", ms.trim());
                let millis: u64 = ms_str.get(..3)?.parse().ok()?;
                (secs, millis)
            }
            None => (rest.trim().parse().ok()?, 0),
        };
        Some((minutes * 60 + secs) * 1000 + millis)
    } else {
        let seconds: f64 = raw.trim().parse().ok()?;
        if seconds.is_finite() && seconds >= 0.0 {
            Some((seconds * 1000.0).round() as u64)
        } else {
            None
        }
    }
}

/// Runs C1 over an already-C2-parsed line in place: strips inline
/// tags out of `line.text`, fills `line.tags`, and overwrites
/// `line.timestamp_ms` if a valid `time` tag was found. This is how
/// the coordinator composes C2 (bracket grammar) with C1 (brace
/// grammar) per scene line.
pub fn apply_tags(line: &mut storyboard_core::ParsedLine) -> Vec<Diagnostic> {
    let (stripped, tags, timestamp_ms, diagnostics) = extract_tags(&line.text, line.line_number);
    line.text = stripped.trim().to_string();
    line.tags = tags;
    if let Some(ts) = timestamp_ms {
        line.timestamp_ms = Some(ts);
    }
    diagnostics
}

/// Parses raw multi-line text directly into tagged `ParsedLine`s,
/// independent of C2's format detection — one line per non-empty
/// input line, tags stripped, `section`/`explicit_duration_ms` left
/// unset (those are C2's concern).
pub fn parse(text: &str) -> (Vec<storyboard_core::ParsedLine>, Vec<Diagnostic>) {
    let mut lines = Vec::new();
    let mut diagnostics = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        if raw_line.trim().is_empty() {
            continue;
        }
        let line_number = idx as u32 + 1;
        let (stripped, tags, timestamp_ms, mut diags) = extract_tags(raw_line, line_number);
        diagnostics.append(&mut diags);

        lines.push(storyboard_core::ParsedLine {
            text: stripped.trim().to_string(),
            timestamp_ms,
            section: None,
            tags,
            line_number,
            explicit_duration_ms: None,
        });
    }

    (lines, diagnostics)
}

/// Inserts `{time: mm:ss.mmm}` tags into `text` at intervals derived
/// from `words`. When `at_line_starts`, a tag is injected before every
/// line whose first word falls at least `interval_ms` after the
/// previous injection point. Existing `time` tags are never
/// duplicated.
pub fn inject_timestamps(
    text: &str,
    words: &[storyboard_core::WordTiming],
    interval_ms: u64,
    at_line_starts: bool,
) -> String {
    if words.is_empty() {
        return text.to_string();
    }

    if !at_line_starts {
        return text.to_string();
    }

    let mut result = Vec::new();
    let mut word_iter = words.iter().peekable();
    let mut last_injected_ms: Option<u64> = None;

    for line in text.lines() {
        if line_has_time_tag(line) {
            result.push(line.to_string());
            continue;
        }

        let line_words: usize = line.split_whitespace().count();
        let first_word_ms = word_iter.peek().map(|w| w.span.start_ms);

        let should_inject = match (first_word_ms, last_injected_ms) {
            (Some(start), Some(last)) => start >= last + interval_ms,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if should_inject && let Some(start) = first_word_ms {
            result.push(format!("{{time:{}}}{}", format_mm_ss(start), line));
            last_injected_ms = Some(start);
        } else {
            result.push(line.to_string());
        }

        for _ in 0..line_words {
            word_iter.next();
        }
    }

    result.join("\n")
}

fn line_has_time_tag(line: &str) -> bool {
    let (_, tags, _, _) = extract_tags(line, 0);
    tags.iter().any(|t| t.kind == TagKind::Time)
}

fn format_mm_ss(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    let millis = ms % 1000;
    format!("{minutes:02}:{seconds:02}.{millis:03}")
}

/// Removes every recognized tag from `text`, leaving unrecognized
/// `{...}` blocks and all other text untouched.
pub fn remove_all_tags(text: &str) -> String {
    text.lines()
        .enumerate()
        .map(|(idx, line)| extract_tags(line, idx as u32 + 1).0)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_core::WordTiming;

    #[test]
    fn strips_known_tags() {
        let (text, tags, _, diags) = extract_tags("Hello {mood:happy} world", 1);
        assert_eq!(text, "Hello  world");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].kind, TagKind::Mood);
        assert_eq!(tags[0].value.as_deref(), Some("happy"));
        assert!(diags.is_empty());
    }

    #[test]
    fn keeps_unrecognized_tags_and_flags_them() {
        let (text, tags, _, diags) = extract_tags("Hi {bogus:1}", 1);
        assert_eq!(text, "Hi {bogus:1}");
        assert!(tags.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0].kind, DiagnosticKind::UnrecognizedTag { .. }));
    }

    #[test]
    fn unterminated_tag_is_left_as_literal() {
        let (text, tags, _, diags) = extract_tags("broken {mood", 1);
        assert_eq!(text, "broken {mood");
        assert!(tags.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0].kind, DiagnosticKind::UnterminatedTag));
    }

    #[test]
    fn time_tag_parses_mm_ss_millis() {
        let (_, tags, ts, diags) = extract_tags("{time:01:02.500} hi", 1);
        assert_eq!(ts, Some(62_500));
        assert_eq!(tags[0].kind, TagKind::Time);
        assert!(diags.is_empty());
    }

    #[test]
    fn invalid_time_value_keeps_tag_but_no_timestamp() {
        let (_, tags, ts, diags) = extract_tags("{time:not-a-time} hi", 1);
        assert_eq!(ts, None);
        assert_eq!(tags.len(), 1);
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0].kind, DiagnosticKind::InvalidTimeValue { .. }));
    }

    #[test]
    fn lipsync_is_boolean_with_no_value() {
        let (text, tags, _, _) = extract_tags("{lipsync} speak", 1);
        assert_eq!(text, " speak");
        assert_eq!(tags[0].kind, TagKind::Lipsync);
        assert_eq!(tags[0].value, None);
    }

    #[test]
    fn round_trip_remove_after_inject() {
        let original = "Line one\nLine two\nLine three";
        let words = vec![
            WordTiming {
                text: "Line".into(),
                span: storyboard_core::TimeSpan::new(0, 100),
                confidence: 1.0,
            },
            WordTiming {
                text: "one".into(),
                span: storyboard_core::TimeSpan::new(100, 200),
                confidence: 1.0,
            },
            WordTiming {
                text: "Line".into(),
                span: storyboard_core::TimeSpan::new(5000, 5100),
                confidence: 1.0,
            },
            WordTiming {
                text: "two".into(),
                span: storyboard_core::TimeSpan::new(5100, 5200),
                confidence: 1.0,
            },
        ];
        let injected = inject_timestamps(original, &words, 1000, true);
        assert_eq!(remove_all_tags(&injected), remove_all_tags(original));
    }
}
