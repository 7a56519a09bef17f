//! Timing-bearing types shared by the tag/line parser, the Whisper
//! alignment stage, and the timing solver (spec.md §3).

use serde::{Deserialize, Serialize};

use crate::tag::Tag;
use crate::time::TimeSpan;

/// A single line out of the tag parser / format detector, before
/// timing has been resolved. `explicit_duration_ms` is the sidecar
/// `[Xs]` duration spec.md §4.2 calls out; it is independent of
/// `timestamp_ms`, which comes from a leading `[mm:ss.mmm]` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLine {
    pub text: String,
    pub timestamp_ms: Option<u64>,
    pub section: Option<String>,
    pub tags: Vec<Tag>,
    pub line_number: u32,
    pub explicit_duration_ms: Option<u32>,
}

impl ParsedLine {
    /// A `[Verse 1]`/`[Chorus]`/... section marker is a line with
    /// empty text and a populated section, per spec.md §3.
    #[must_use]
    pub fn is_section_marker(&self) -> bool {
        self.text.is_empty() && self.section.is_some()
    }
}

/// Per-word timing out of an external transcriber (spec.md §3, §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub span: TimeSpan,
    pub confidence: f32,
}

/// The full result of an external transcription pass. Words are kept
/// sorted by `span.start_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub full_text: String,
    pub words: Vec<WordTiming>,
    pub language: String,
    pub duration_ms: u64,
    pub model: String,
}

impl TranscriptionResult {
    /// Words whose span falls entirely within `[start_ms, end_ms]`.
    ///
    /// Carried from `timing_models.py`'s `get_words_in_range`.
    #[must_use]
    pub fn words_in_range(&self, start_ms: u64, end_ms: u64) -> Vec<&WordTiming> {
        self.words
            .iter()
            .filter(|w| w.span.start_ms >= start_ms && w.span.end_ms <= end_ms)
            .collect()
    }

    /// Space-joined text of `words_in_range`.
    #[must_use]
    pub fn text_in_range(&self, start_ms: u64, end_ms: u64) -> String {
        self.words_in_range(start_ms, end_ms)
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Re-flows the flat word list into line-broken lyric text using
    /// inter-word pauses as line/stanza boundaries. A gap of at least
    /// `line_break_ms` starts a new line; a gap of at least
    /// `stanza_break_ms` additionally emits a blank line.
    ///
    /// Carried from `timing_models.py`'s `format_as_lyrics`: it is the
    /// natural bridge from a bare transcript into C2's plain-format
    /// input when no authored lyrics were provided.
    #[must_use]
    pub fn format_as_lyrics(&self, line_break_ms: u64, stanza_break_ms: u64) -> String {
        if self.words.is_empty() {
            return self.full_text.clone();
        }

        let mut lines = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for (i, word) in self.words.iter().enumerate() {
            current.push(word.text.as_str());

            if let Some(next) = self.words.get(i + 1) {
                let gap = next.span.start_ms.saturating_sub(word.span.end_ms);
                if gap >= stanza_break_ms {
                    lines.push(current.join(" "));
                    lines.push(String::new());
                    current.clear();
                } else if gap >= line_break_ms {
                    lines.push(current.join(" "));
                    current.clear();
                }
            }
        }

        if !current.is_empty() {
            lines.push(current.join(" "));
        }

        lines.join("\n")
    }
}

/// The informational "good match" threshold from spec.md §4.4.
pub const GOOD_MATCH_THRESHOLD: f32 = 0.7;

/// Result of reconciling provided lyrics against an extracted
/// transcript (spec.md §3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub matched: Vec<WordTiming>,
    pub unmatched_provided: Vec<String>,
    pub unmatched_extracted: Vec<String>,
    pub similarity: f32,
    pub aligned_text: String,
}

impl AlignmentResult {
    /// Whether `similarity` clears the informational "good match" bar.
    #[must_use]
    pub fn is_good_match(&self) -> bool {
        self.similarity >= GOOD_MATCH_THRESHOLD
    }
}

/// A lyric line with resolved timing, the handoff type between C4/C5
/// and C6/C7 (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedLyric {
    pub text: String,
    pub span: TimeSpan,
    pub section: Option<String>,
}
