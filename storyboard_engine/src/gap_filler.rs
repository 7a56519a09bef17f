//! C6 — Instrumental Gap Filler (spec.md §4.6).

use storyboard_core::{TimeSpan, TimedLyric};

/// Walks `lyrics` in order and inserts a synthetic `"[Instrumental]"`
/// entry wherever the gap to the next (or to the start/end of the
/// track) is at least `gap_ms`. Input ordering and the original
/// entries are preserved.
#[must_use]
pub fn fill_gaps(lyrics: &[TimedLyric], audio_duration_ms: u64, gap_ms: u64) -> Vec<TimedLyric> {
    if lyrics.is_empty() {
        return Vec::new();
    }

    let mut filled = Vec::with_capacity(lyrics.len() + 2);

    if lyrics[0].span.start_ms >= gap_ms {
        filled.push(instrumental(0, lyrics[0].span.start_ms));
    }

    for (i, lyric) in lyrics.iter().enumerate() {
        filled.push(lyric.clone());

        if let Some(next) = lyrics.get(i + 1)
            && lyric.span.end_ms + gap_ms <= next.span.start_ms
        {
            filled.push(instrumental(lyric.span.end_ms, next.span.start_ms));
        }
    }

    let last_end = lyrics.last().unwrap().span.end_ms;
    if audio_duration_ms.saturating_sub(last_end) >= gap_ms {
        filled.push(instrumental(last_end, audio_duration_ms));
    }

    filled
}

fn instrumental(start_ms: u64, end_ms: u64) -> TimedLyric {
    TimedLyric {
        text: "[Instrumental]".to_string(),
        span: TimeSpan::new(start_ms, end_ms),
        section: Some("instrumental".to_string()),
    }
}
