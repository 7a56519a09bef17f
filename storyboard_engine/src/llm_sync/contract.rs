//! Wire shapes for the LLM sync bridge's reply (spec.md §4.5).

use serde::Deserialize;
use serde_json::Value;

/// "Strict Lyric Timing Output Contract v1.0" — one JSON object, one
/// entry per input line, in input order.
#[derive(Debug, Clone, Deserialize)]
pub struct StrictContract {
    pub version: String,
    pub units: String,
    pub line_count: usize,
    pub lyrics: Vec<StrictEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrictEntry {
    #[serde(default)]
    pub line_index: Option<u32>,
    pub text: String,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

/// One reconciled timing entry, in milliseconds, regardless of which
/// wire shape it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedFragment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// Strips a leading/trailing ``` fence, if present, the way
/// `llm_sync_v2.py` defensively handles models that ignore the
/// "no code fences" instruction.
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Which wire shape a reply parsed as, and the reconciliation
/// guarantee each one gives the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReply {
    /// One slot per `lyrics` entry, in the order the provider returned
    /// them (or, when `line_index` is present, reordered to it) —
    /// `None` where the entry was null-timed or invalid. Always the
    /// same length as the request's `lyrics`, so a positional zip
    /// against the original lines never shifts.
    Strict {
        entries: Vec<Option<TimedFragment>>,
        mismatch: Option<(usize, usize)>,
    },
    /// The legacy array/object shapes give no positional guarantee at
    /// all (providers are free to split or merge lines), so callers
    /// must match these back onto the original lines by content
    /// (`llm_sync::merge_fragments`).
    Legacy(Vec<TimedFragment>),
}

/// Tries Strict Contract v1.0 first, falling back to the legacy
/// array/object shapes.
#[must_use]
pub fn parse_reply(raw: &str) -> Option<ParsedReply> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned).ok()?;

    if let Ok(strict) = serde_json::from_value::<StrictContract>(value.clone())
        && strict.version == "1.0"
        && strict.units == "ms"
    {
        let len = strict.lyrics.len();
        let mut entries: Vec<Option<TimedFragment>> = vec![None; len];
        for (position, entry) in strict.lyrics.iter().enumerate() {
            // The contract asks for reply order to match input order,
            // but `line_index` (when the provider sends it) is the
            // authoritative slot — a dropped or reordered entry
            // elsewhere in the reply must not shift anything after it.
            let slot = entry
                .line_index
                .map(|idx| idx as usize)
                .filter(|&idx| idx < len)
                .unwrap_or(position);
            if let (Some(s), Some(end)) = (entry.start_ms, entry.end_ms)
                && s >= 0
                && end > s
            {
                entries[slot] = Some(TimedFragment {
                    text: entry.text.clone(),
                    start_ms: s as u64,
                    end_ms: end as u64,
                });
            }
        }
        let mismatch =
            (strict.line_count != strict.lyrics.len()).then_some((strict.line_count, strict.lyrics.len()));
        return Some(ParsedReply::Strict { entries, mismatch });
    }

    parse_legacy(&value).map(ParsedReply::Legacy)
}

fn parse_legacy(value: &Value) -> Option<Vec<TimedFragment>> {
    let items: &Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("captions") {
                items
            } else if let Some(Value::Array(items)) = map.get("lyrics") {
                items
            } else if let Some(Value::Array(items)) = map.get("lyrics_timing") {
                items
            } else {
                return None;
            }
        }
        _ => return None,
    };

    let fragments = items.iter().filter_map(parse_legacy_item).collect();
    Some(fragments)
}

fn parse_legacy_item(item: &Value) -> Option<TimedFragment> {
    let text = item.get("text")?.as_str()?.to_string();

    let (start_ms, end_ms) = if let (Some(s), Some(e)) = (item.get("startMs"), item.get("endMs"))
    {
        (s.as_f64()?, e.as_f64()?)
    } else if let (Some(s), Some(e)) = (item.get("start_ms"), item.get("end_ms")) {
        (s.as_f64()?, e.as_f64()?)
    } else if let (Some(s), Some(e)) = (item.get("start"), item.get("end")) {
        (s.as_f64()? * 1000.0, e.as_f64()? * 1000.0)
    } else if let (Some(s), Some(e)) = (item.get("start_time"), item.get("end_time")) {
        (s.as_f64()? * 1000.0, e.as_f64()? * 1000.0)
    } else {
        return None;
    };

    if end_ms <= start_ms || start_ms < 0.0 {
        return None;
    }

    Some(TimedFragment {
        text,
        start_ms: start_ms.round() as u64,
        end_ms: end_ms.round() as u64,
    })
}
