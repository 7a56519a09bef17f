//! C4 — Whisper Alignment (spec.md §4.4).
//!
//! Pure and deterministic: no external calls. Reconciles
//! caller-provided lyrics against an already-extracted transcription
//! by normalizing both texts, tokenizing on whitespace, and computing
//! a longest-common-subsequence match between the token sequences.

use std::sync::LazyLock;

use regex::Regex;
use storyboard_core::{AlignmentResult, TranscriptionResult, WordTiming};

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[.*?\]").unwrap());
static NON_WORD_NON_APOSTROPHE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s']").unwrap());

/// Lowercases, strips `[bracketed]` asides, drops punctuation other
/// than apostrophes, and collapses whitespace — mirrors
/// `WhisperAnalyzer._normalize_text`.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let no_brackets = BRACKETED.replace_all(text, "");
    let no_punct = NON_WORD_NON_APOSTROPHE.replace_all(&no_brackets, "");
    no_punct.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reconciles `provided_lyrics` against `transcription`.
#[must_use]
pub fn verify_lyrics(transcription: &TranscriptionResult, provided_lyrics: &str) -> AlignmentResult {
    let provided_words: Vec<String> = normalize_text(provided_lyrics)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let extracted_words: Vec<String> = transcription
        .words
        .iter()
        .map(|w| normalize_text(&w.text))
        .collect();

    let pairs = lcs_pairs(&provided_words, &extracted_words);

    let mut matched = Vec::with_capacity(pairs.len());
    let mut matched_provided = vec![false; provided_words.len()];
    let mut matched_extracted = vec![false; extracted_words.len()];

    for &(p, e) in &pairs {
        matched_provided[p] = true;
        matched_extracted[e] = true;
        let timing = &transcription.words[e];
        matched.push(WordTiming {
            text: provided_words[p].clone(),
            span: timing.span,
            confidence: timing.confidence,
        });
    }

    let unmatched_provided = provided_words
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched_provided[*i])
        .map(|(_, w)| w.clone())
        .collect();
    let unmatched_extracted = extracted_words
        .iter()
        .enumerate()
        .filter(|(i, _)| !matched_extracted[*i])
        .map(|(_, w)| w.clone())
        .collect();

    let similarity = if provided_words.is_empty() && extracted_words.is_empty() {
        1.0
    } else {
        pairs.len() as f32 / provided_words.len().max(extracted_words.len()).max(1) as f32
    };

    let aligned_text = build_aligned_text(provided_lyrics, &matched);

    AlignmentResult {
        matched,
        unmatched_provided,
        unmatched_extracted,
        similarity,
        aligned_text,
    }
}

fn build_aligned_text(original_lyrics: &str, matched: &[WordTiming]) -> String {
    let (Some(first), Some(last)) = (matched.first(), matched.last()) else {
        return original_lyrics.to_string();
    };
    format!(
        "[{:.2}s - {:.2}s]\n{original_lyrics}",
        first.span.start_ms as f64 / 1000.0,
        last.span.end_ms as f64 / 1000.0
    )
}

/// Longest-common-subsequence alignment between two token sequences;
/// returns matched `(a_index, b_index)` pairs in order.
fn lcs_pairs(a: &[String], b: &[String]) -> Vec<(usize, usize)> {
    let n = a.len();
    let m = b.len();
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }

    let mut pairs = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        if a[i - 1] == b[j - 1] {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        } else if dp[i - 1][j] >= dp[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    pairs.reverse();
    pairs
}

/// Finds the `(start_ms, end_ms)` span of `segment_text` within
/// `transcription`'s word list: the first position where at least
/// `min(3, len(segment_tokens))` consecutive tokens match, else
/// `(0, 0)`.
#[must_use]
pub fn get_timing_for_text_segment(transcription: &TranscriptionResult, segment_text: &str) -> (u64, u64) {
    let segment_words: Vec<String> = normalize_text(segment_text)
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if segment_words.is_empty() || transcription.words.is_empty() {
        return (0, 0);
    }

    let required = segment_words.len().min(3);
    let all_words = &transcription.words;

    for (i, word) in all_words.iter().enumerate() {
        if normalize_text(&word.text) != segment_words[0] {
            continue;
        }

        let mut match_count = 1;
        for (j, seg_word) in segment_words.iter().enumerate().skip(1) {
            if let Some(candidate) = all_words.get(i + j) {
                if normalize_text(&candidate.text) == *seg_word {
                    match_count += 1;
                    continue;
                }
            }
            break;
        }

        if match_count >= required {
            let start_ms = word.span.start_ms;
            let end_idx = (i + segment_words.len() - 1).min(all_words.len() - 1);
            let end_ms = all_words[end_idx].span.end_ms;
            return (start_ms, end_ms);
        }
    }

    (0, 0)
}

/// Turns a bare transcript (no authored lyrics) into line-broken text
/// suitable for C2's plain-format input, using the pause-based
/// defaults carried from `timing_models.py::format_as_lyrics`: a
/// 500ms gap starts a new line, a 1500ms gap starts a new stanza.
#[must_use]
pub fn transcription_to_lyrics(transcription: &TranscriptionResult) -> String {
    transcription.format_as_lyrics(500, 1500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_core::TimeSpan;

    fn word(text: &str, start: u64, end: u64) -> WordTiming {
        WordTiming {
            text: text.to_string(),
            span: TimeSpan::new(start, end),
            confidence: 0.9,
        }
    }

    fn transcript(words: Vec<WordTiming>) -> TranscriptionResult {
        let full_text = words.iter().map(|w| w.text.clone()).collect::<Vec<_>>().join(" ");
        TranscriptionResult {
            full_text,
            words,
            language: "en".to_string(),
            duration_ms: 10_000,
            model: "test".to_string(),
        }
    }

    #[test]
    fn normalize_strips_brackets_and_punctuation() {
        assert_eq!(normalize_text("[Verse 1] Don't, stop! believing"), "don't stop believing");
    }

    #[test]
    fn verify_lyrics_matches_identical_text() {
        let t = transcript(vec![word("hello", 0, 500), word("world", 500, 1000)]);
        let result = verify_lyrics(&t, "hello world");
        assert_eq!(result.matched.len(), 2);
        assert!(result.is_good_match());
        assert!(result.unmatched_provided.is_empty());
    }

    #[test]
    fn verify_lyrics_reports_unmatched_words() {
        let t = transcript(vec![word("hello", 0, 500)]);
        let result = verify_lyrics(&t, "hello there friend");
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.unmatched_provided, vec!["there", "friend"]);
    }

    #[test]
    fn segment_lookup_requires_three_consecutive_matches() {
        let t = transcript(vec![
            word("walking", 0, 200),
            word("on", 200, 300),
            word("sunshine", 300, 800),
        ]);
        let (start, end) = get_timing_for_text_segment(&t, "walking on sunshine");
        assert_eq!((start, end), (0, 800));
    }

    #[test]
    fn segment_lookup_returns_zero_when_not_found() {
        let t = transcript(vec![word("nothing", 0, 100)]);
        assert_eq!(get_timing_for_text_segment(&t, "completely different"), (0, 0));
    }
}
