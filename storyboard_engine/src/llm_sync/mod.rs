//! C5 — LLM Sync Bridge (spec.md §4.5).
//!
//! A single capability is injected: "given a system message and a user
//! message, return the model's text reply". This module knows nothing
//! about network transport, API keys, or retries beyond what the
//! injected [`LlmClient`] provides.

pub mod contract;

use async_trait::async_trait;
use storyboard_core::error::LlmSyncError;

use contract::{ParsedReply, TimedFragment};

/// The capability C5 depends on. Hosts implement this once per
/// provider (OpenAI, Gemini, a local model, a recorded-response test
/// harness) and hand the engine a `&dyn LlmClient`.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends `system`/`user` messages and returns the raw text reply.
    /// Implementations map timeouts and transport failures to
    /// [`LlmSyncError::Timeout`]/[`LlmSyncError::Transport`]; this
    /// trait has no retry policy of its own.
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmSyncError>;
}

/// Builds the Strict Contract v1.0 system prompt, following the
/// wording `llm_sync_v2.py::_sync_with_openai` sends.
#[must_use]
pub fn strict_contract_system_prompt() -> String {
    "You are \"Lyric Timing Aligner — Strict v1.0\". Output must be a single JSON object \
     that conforms exactly to the \"Strict Lyric Timing Output Contract v1.0\". \
     Do not include any commentary or code fences. Do not split or merge lines. \
     Preserve input order. Use integer milliseconds (units=ms). Round to nearest millisecond."
        .to_string()
}

/// Builds the user message for a sync request.
#[must_use]
pub fn strict_contract_user_message(lines: &[String], total_duration_ms: Option<u64>) -> String {
    let mut msg = String::from(
        "TASK: Align each lyric line to the attached audio (MIDI optional). \
         Return exactly one JSON object per the Strict Lyric Timing Output Contract v1.0.\n\n",
    );
    msg.push_str(&format!(
        "lyrics_text_utf8 (already filtered; lines in [] were removed on client):\n{}\n\n",
        lines.join("\n")
    ));
    msg.push_str("CONSTRAINTS:\n");
    msg.push_str("- One JSON entry per input line, in exact order.\n");
    msg.push_str("- start_ms/end_ms integers in milliseconds (or null if truly unalignable).\n");
    msg.push_str(&format!(
        "- Ensure 0 <= start_ms < end_ms <= {} (if not null).\n\n",
        total_duration_ms.unwrap_or(300_000)
    ));
    msg.push_str(
        "OUTPUT:\n- Emit only the JSON object, with top-level keys [version, units, \
         line_count, lyrics]. Nothing else.",
    );
    msg
}

/// Requests timings for `lines` from the injected [`LlmClient`] and
/// reconciles the reply against `lines`, merging provider fragmentation
/// where needed.
///
/// Always returns exactly `lines.len()` slots, one per input line, in
/// order — a line the provider left unalignable (or that
/// fragment-merging couldn't match) is `None` at its own position
/// rather than simply missing, so callers can zip the result against
/// `lines` positionally without ever shifting a later line into an
/// earlier one's slot.
pub async fn sync_lines(
    client: &dyn LlmClient,
    lines: &[String],
    total_duration_ms: Option<u64>,
) -> Result<Vec<Option<TimedFragment>>, LlmSyncError> {
    let system = strict_contract_system_prompt();
    let user = strict_contract_user_message(lines, total_duration_ms);

    let raw = client.complete(&system, &user).await?;

    let excerpt = || raw.chars().take(200).collect::<String>();
    let reply = contract::parse_reply(&raw).ok_or_else(|| LlmSyncError::Unparseable { excerpt: excerpt() })?;

    match reply {
        ParsedReply::Strict { mut entries, mismatch } => {
            if let Some((expected, got)) = mismatch {
                tracing::warn!("[LlmSync] line count mismatch: expected {expected}, got {got}");
            }
            entries.resize_with(lines.len(), || None);
            Ok(entries)
        }
        ParsedReply::Legacy(fragments) if fragments.len() <= lines.len() => {
            Ok(fragments.into_iter().map(Some).collect())
        }
        ParsedReply::Legacy(fragments) => {
            tracing::info!(
                "[LlmSync] legacy format with fragmentation detected ({} fragments for {} lines)",
                fragments.len(),
                lines.len()
            );
            Ok(merge_fragments(&fragments, lines, 0.6))
        }
    }
}

/// Matches fragmented timed entries back onto `original_lines`
/// (spec.md §4.5 "Fragment merging"): for each original line, greedily
/// grow a run of 1-4 consecutive unused fragments and keep the best
/// scoring combination; accept it if its similarity clears
/// `threshold`. Always returns exactly `original_lines.len()` slots —
/// a line with no match above `threshold` is `None` at its own
/// position rather than dropped, preserving positional correspondence
/// with `original_lines`.
#[must_use]
pub fn merge_fragments(
    fragments: &[TimedFragment],
    original_lines: &[String],
    threshold: f64,
) -> Vec<Option<TimedFragment>> {
    let mut used = vec![false; fragments.len()];
    let mut merged = Vec::with_capacity(original_lines.len());

    for original in original_lines {
        let mut best: Option<(Vec<usize>, f64, String)> = None;

        for start in 0..fragments.len() {
            if used[start] {
                continue;
            }

            let mut combined = fragments[start].text.clone();
            let mut indices = vec![start];

            let score = lcs_ratio(&combined, original);
            if best.as_ref().is_none_or(|(_, s, _)| score > *s) {
                best = Some((indices.clone(), score, combined.clone()));
            }

            for next in (start + 1)..fragments.len().min(start + 4) {
                if used[next] {
                    break;
                }
                combined = format!("{combined} {}", fragments[next].text);
                indices.push(next);

                let score = lcs_ratio(&combined, original);
                if best.as_ref().is_none_or(|(_, s, _)| score > *s) {
                    best = Some((indices.clone(), score, combined.clone()));
                }
                if score > 0.95 {
                    break;
                }
            }
        }

        match best {
            Some((indices, score, _)) if score >= threshold => {
                for &idx in &indices {
                    used[idx] = true;
                }
                let start_ms = fragments[indices[0]].start_ms;
                let end_ms = fragments[*indices.last().unwrap()].end_ms;
                merged.push(Some(TimedFragment {
                    text: original.clone(),
                    start_ms,
                    end_ms,
                }));
            }
            _ => {
                tracing::warn!("[LlmSync] no fragment match found for line: {original}");
                merged.push(None);
            }
        }
    }

    merged
}

/// `len(longest_common_subsequence(a, b)) / max(len(a), len(b))`, the
/// similarity measure spec.md §4.5 defines for fragment merging.
fn lcs_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut dp = vec![vec![0u32; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }

    let lcs = dp[a.len()][b.len()] as f64;
    lcs / a.len().max(b.len()) as f64
}
