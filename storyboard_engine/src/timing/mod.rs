//! C3 — Timing Solver (spec.md §4.3).
//!
//! Selects exactly one of five strategies, in priority order, and
//! produces one duration per input line (including section-marker
//! placeholders, which the coordinator drops before building scenes
//! but which still need a slot so weight distribution stays aligned).

pub mod weight;

use std::collections::BTreeMap;

use storyboard_core::{ParsedLine, TimeSpan};

use crate::config::PipelineConfig;
use crate::llm_sync::LlmClient;

/// Pacing preset selecting a per-line base duration (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Fast,
    Medium,
    Slow,
}

/// Per-section time ranges derived from a MIDI file, keyed by the same
/// section labels C2 attaches to lyric lines.
pub type MidiSections = BTreeMap<String, Vec<TimeSpan>>;

/// Which of the five strategies `solve` actually ran — surfaced so
/// callers/tests can assert on it without re-deriving the selection
/// logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyUsed {
    AllExplicit,
    MixedExplicitLlm,
    FromTimestamps,
    MidiSectionWeighted,
    PresetPacing,
}

/// Selects a strategy and returns one duration (ms) per line in
/// `lines`, plus which strategy ran.
pub async fn solve(
    lines: &[ParsedLine],
    midi_sections: Option<&MidiSections>,
    target_ms: Option<u64>,
    preset: Preset,
    match_target: bool,
    llm: Option<&dyn LlmClient>,
    config: &PipelineConfig,
) -> storyboard_core::Result<(Vec<u64>, StrategyUsed)> {
    if lines.is_empty() {
        return Ok((Vec::new(), StrategyUsed::PresetPacing));
    }

    let any_explicit = lines.iter().any(|l| l.explicit_duration_ms.is_some());
    let all_explicit = lines.iter().all(|l| l.explicit_duration_ms.is_some());
    let any_timestamped = lines.iter().any(|l| l.timestamp_ms.is_some());

    if all_explicit {
        return Ok((all_explicit_strategy(lines, target_ms), StrategyUsed::AllExplicit));
    }

    if any_explicit {
        match mixed_strategy(lines, target_ms, match_target, llm, config).await {
            Ok(durations) => return Ok((durations, StrategyUsed::MixedExplicitLlm)),
            Err(err) => {
                tracing::warn!("[TimingSolver] LLM estimate failed, falling back to preset pacing: {err}");
                return Ok((
                    preset_pacing_strategy(lines, target_ms, preset, match_target, config),
                    StrategyUsed::PresetPacing,
                ));
            }
        }
    }

    if any_timestamped {
        return Ok((
            from_timestamps_strategy(lines, config),
            StrategyUsed::FromTimestamps,
        ));
    }

    if let Some(sections) = midi_sections
        && lines.iter().any(|l| l.section.is_some())
    {
        return Ok((
            midi_weighted_strategy(lines, sections, config),
            StrategyUsed::MidiSectionWeighted,
        ));
    }

    Ok((
        preset_pacing_strategy(lines, target_ms, preset, match_target, config),
        StrategyUsed::PresetPacing,
    ))
}

fn all_explicit_strategy(lines: &[ParsedLine], target_ms: Option<u64>) -> Vec<u64> {
    let durations: Vec<u64> = lines
        .iter()
        .map(|l| u64::from(l.explicit_duration_ms.unwrap()))
        .collect();

    if let Some(target) = target_ms {
        let sum: u64 = durations.iter().sum();
        if sum.abs_diff(target) > 1000 {
            tracing::warn!(
                "[TimingSolver] all-explicit durations sum to {sum}ms, target was {target}ms"
            );
        }
    }

    durations
}

async fn mixed_strategy(
    lines: &[ParsedLine],
    target_ms: Option<u64>,
    match_target: bool,
    llm: Option<&dyn LlmClient>,
    config: &PipelineConfig,
) -> Result<Vec<u64>, storyboard_core::error::LlmSyncError> {
    let Some(client) = llm else {
        return Err(storyboard_core::error::LlmSyncError::Transport {
            inner: "mixed explicit+LLM strategy selected but no LlmClient was provided".into(),
        });
    };

    let non_explicit_indices: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.explicit_duration_ms.is_none())
        .map(|(i, _)| i)
        .collect();
    let non_explicit_texts: Vec<String> = non_explicit_indices
        .iter()
        .map(|&i| lines[i].text.clone())
        .collect();

    let fragments = crate::llm_sync::sync_lines(client, &non_explicit_texts, target_ms).await?;

    // `sync_lines` guarantees one slot per `non_explicit_texts` entry,
    // in order, with `None` standing in for a line the provider left
    // unalignable — a plain positional zip is safe precisely because
    // a dropped entry no longer compacts the vector and shifts
    // everything after it.
    let mut estimated = vec![u64::from(config.default_scene_ms); non_explicit_indices.len()];
    for (slot, fragment) in estimated.iter_mut().zip(fragments.iter()) {
        if let Some(fragment) = fragment {
            *slot = fragment.end_ms.saturating_sub(fragment.start_ms);
        }
    }

    if match_target && let Some(target) = target_ms {
        let explicit_sum: u64 = lines
            .iter()
            .filter_map(|l| l.explicit_duration_ms)
            .map(u64::from)
            .sum();
        let residual = target.saturating_sub(explicit_sum);
        let estimated_sum: u64 = estimated.iter().sum();
        if estimated_sum > 0 {
            let scale = residual as f64 / estimated_sum as f64;
            for d in &mut estimated {
                *d = ((*d as f64) * scale).round() as u64;
            }
        }
    }

    let mut durations = vec![0u64; lines.len()];
    for (i, line) in lines.iter().enumerate() {
        durations[i] = line.explicit_duration_ms.map(u64::from).unwrap_or(0);
    }
    for (slot_idx, &line_idx) in non_explicit_indices.iter().enumerate() {
        durations[line_idx] = estimated[slot_idx];
    }

    Ok(durations)
}

fn from_timestamps_strategy(lines: &[ParsedLine], config: &PipelineConfig) -> Vec<u64> {
    let min = u64::from(config.min_scene_ms);
    let max = u64::from(config.max_scene_ms);

    let mut effective_ts = Vec::with_capacity(lines.len());
    let mut last_ts = 0u64;
    for line in lines {
        if let Some(ts) = line.timestamp_ms {
            last_ts = ts;
        }
        effective_ts.push(last_ts);
    }

    let mut durations = Vec::with_capacity(lines.len());
    for i in 0..lines.len() {
        if i + 1 < lines.len() {
            let raw = effective_ts[i + 1].saturating_sub(effective_ts[i]);
            durations.push(raw.clamp(min, max));
        } else {
            durations.push(u64::from(config.default_scene_ms));
        }
    }
    durations
}

fn midi_weighted_strategy(
    lines: &[ParsedLine],
    sections: &MidiSections,
    config: &PipelineConfig,
) -> Vec<u64> {
    let weights = weight::line_weights(lines);
    let mut durations = vec![u64::from(config.default_scene_ms); lines.len()];

    let mut by_section: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(section) = &line.section {
            by_section.entry(section.clone()).or_default().push(i);
        }
    }

    for (section, indices) in &by_section {
        let Some(spans) = sections.get(section) else {
            continue;
        };
        let section_total: u64 = spans.iter().map(TimeSpan::duration_ms).sum();
        let total_weight: f64 = indices.iter().map(|&i| weights[i]).sum();
        if total_weight <= 0.0 || section_total == 0 {
            continue;
        }
        for &i in indices {
            let share = weights[i] / total_weight;
            durations[i] = ((share * section_total as f64).round() as u64)
                .clamp(u64::from(config.min_scene_ms), u64::from(config.max_scene_ms));
        }
    }

    durations
}

fn preset_pacing_strategy(
    lines: &[ParsedLine],
    target_ms: Option<u64>,
    preset: Preset,
    match_target: bool,
    config: &PipelineConfig,
) -> Vec<u64> {
    let base = match preset {
        Preset::Fast => config.pacing_presets.fast_ms,
        Preset::Medium => config.pacing_presets.medium_ms,
        Preset::Slow => config.pacing_presets.slow_ms,
    };

    let weights = weight::line_weights(lines);
    let mut durations: Vec<f64> = weights.iter().map(|w| f64::from(base) * w).collect();

    if match_target
        && let Some(target) = target_ms
    {
        let sum: f64 = durations.iter().sum();
        if sum > 0.0 {
            let scale = target as f64 / sum;
            for d in &mut durations {
                *d *= scale;
            }
        }
    }

    durations
        .into_iter()
        .map(|d| {
            (d.round() as u64).clamp(u64::from(config.min_scene_ms), u64::from(config.max_scene_ms))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_core::ParsedLine;

    fn explicit_line(text: &str, ms: u32) -> ParsedLine {
        ParsedLine {
            text: text.to_string(),
            timestamp_ms: None,
            section: None,
            tags: Vec::new(),
            line_number: 1,
            explicit_duration_ms: Some(ms),
        }
    }

    fn plain_line(text: &str) -> ParsedLine {
        ParsedLine {
            text: text.to_string(),
            timestamp_ms: None,
            section: None,
            tags: Vec::new(),
            line_number: 1,
            explicit_duration_ms: None,
        }
    }

    #[tokio::test]
    async fn all_explicit_uses_durations_verbatim() {
        let lines = vec![explicit_line("a", 1000), explicit_line("b", 2000)];
        let config = PipelineConfig::default();
        let (durations, strategy) = solve(&lines, None, None, Preset::Medium, false, None, &config)
            .await
            .unwrap();
        assert_eq!(durations, vec![1000, 2000]);
        assert_eq!(strategy, StrategyUsed::AllExplicit);
    }

    #[tokio::test]
    async fn from_timestamps_computes_gaps() {
        let mut lines = vec![plain_line("a"), plain_line("b"), plain_line("c")];
        lines[0].timestamp_ms = Some(0);
        lines[1].timestamp_ms = Some(3000);
        lines[2].timestamp_ms = Some(7000);
        let config = PipelineConfig::default();
        let (durations, strategy) = solve(&lines, None, None, Preset::Medium, false, None, &config)
            .await
            .unwrap();
        assert_eq!(durations, vec![3000, 4000, config.default_scene_ms as u64]);
        assert_eq!(strategy, StrategyUsed::FromTimestamps);
    }

    #[tokio::test]
    async fn preset_pacing_falls_back_with_no_signal() {
        let lines = vec![plain_line("a medium length line of text")];
        let config = PipelineConfig::default();
        let (durations, strategy) = solve(&lines, None, None, Preset::Fast, false, None, &config)
            .await
            .unwrap();
        assert_eq!(durations.len(), 1);
        assert_eq!(strategy, StrategyUsed::PresetPacing);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_result() {
        let config = PipelineConfig::default();
        let (durations, _) = solve(&[], None, None, Preset::Medium, false, None, &config)
            .await
            .unwrap();
        assert!(durations.is_empty());
    }
}
