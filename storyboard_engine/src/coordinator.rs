//! C9 — Storyboard Coordinator (spec.md §4.9).
//!
//! Orchestrates C1-C7 in one `build_storyboard` call.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use storyboard_core::{ParsedLine, Scene, TimeSpan, TimedLyric, TranscriptionResult};

use crate::config::PipelineConfig;
use crate::llm_sync::LlmClient;
use crate::timing::{MidiSections, Preset};
use crate::{alignment, gap_filler, line_parser, scenes, tag_parser, timing};

/// Cooperative cancellation (spec.md §5): checked at every suspension
/// point and between `C3->C6`, `C6->C7-split`, `C7-split->C7-batch`.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> storyboard_core::Result<()> {
        if self.is_cancelled() {
            Err(storyboard_core::Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// The two mutually-exclusive auto-link policies `attach_references`
/// implements (spec.md §4.9), modeled as a 3-way enum rather than two
/// independent booleans so the exclusion is a type-level invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoLinkMode {
    #[default]
    Disabled,
    /// Previous scene's end frame becomes the next scene's reference
    /// image (slot 0).
    ReferenceImage,
    /// Previous scene's end frame becomes the next scene's start-frame
    /// reference.
    StartFrame,
}

/// Everything `build_storyboard` needs, gathered into one value the
/// way `lyrics_helper_rs`'s provider calls take a single options
/// struct rather than a long parameter list.
#[derive(Debug, Clone, Default)]
pub struct BuildInput {
    pub raw_text: String,
    pub word_timestamps: Option<TranscriptionResult>,
    pub midi_timing: Option<MidiSections>,
    pub target_ms: Option<u64>,
    pub preset: PresetOrDefault,
    pub match_target: bool,
    pub audio_duration_ms: Option<u64>,
    pub style: Option<String>,
    pub auto_link_mode: AutoLinkMode,
}

/// Wrapper so `Preset` (which has no natural "unset" value) can live in
/// a `Default`-able `BuildInput`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresetOrDefault(pub Preset);

impl Default for PresetOrDefault {
    fn default() -> Self {
        Self(Preset::Medium)
    }
}

/// Runs C1-C7 and produces a complete, invariant-satisfying
/// `Storyboard` (spec.md §4.9).
pub async fn build_storyboard(
    input: &BuildInput,
    llm: Option<&dyn LlmClient>,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> storyboard_core::Result<storyboard_core::Storyboard> {
    cancel.check()?;

    let mut lines: Vec<ParsedLine> = line_parser::parse(&input.raw_text);
    for line in &mut lines {
        let diagnostics = tag_parser::apply_tags(line);
        for diag in diagnostics {
            tracing::debug!("[Coordinator] tag diagnostic on line {}: {:?}", line.line_number, diag);
        }
    }

    if let Some(words) = &input.word_timestamps {
        align_timestamps_from_words(&mut lines, words);
    }

    cancel.check()?;

    let (durations, strategy) = timing::solve(
        &lines,
        input.midi_timing.as_ref(),
        input.target_ms,
        input.preset.0,
        input.match_target,
        llm,
        config,
    )
    .await?;
    tracing::info!("[Coordinator] timing solver selected {strategy:?}");

    // `has_explicit_timing`/`llm_timing_used` are per-line facts the
    // splitter/batcher need (spec.md §4.7) but `TimedLyric` has no
    // room for them; key them by span and look them back up once
    // scenes are built, since gap-filling may insert new spans.
    let llm_mixed = matches!(strategy, timing::StrategyUsed::MixedExplicitLlm);
    let mut timing_flags: std::collections::HashMap<TimeSpan, (bool, bool)> = std::collections::HashMap::new();

    let mut timed: Vec<TimedLyric> = Vec::with_capacity(lines.len());
    let mut cursor_ms = 0u64;
    for (line, duration_ms) in lines.iter().zip(durations.iter()) {
        let end_ms = cursor_ms + duration_ms.max(&1).to_owned();
        let span = TimeSpan::new(cursor_ms, end_ms);
        let has_explicit_timing = line.explicit_duration_ms.is_some();
        let llm_timing_used = llm_mixed && !has_explicit_timing;
        timing_flags.insert(span, (has_explicit_timing, llm_timing_used));
        timed.push(TimedLyric {
            text: line.text.clone(),
            span,
            section: line.section.clone(),
        });
        cursor_ms = end_ms;
    }

    cancel.check()?;

    if let Some(audio_duration_ms) = input.audio_duration_ms {
        timed = gap_filler::fill_gaps(&timed, audio_duration_ms, config.instrumental_gap_ms);
    }

    cancel.check()?;

    let style = input.style.as_deref();
    let mut scenes0: Vec<Scene> = timed
        .iter()
        .filter(|t| !t.text.is_empty())
        .enumerate()
        .map(|(i, t)| {
            let mut scene = Scene::new(i as u32, t.text.clone(), t.text.clone(), t.span);
            scene.metadata.section = t.section.clone();
            scene.metadata.is_instrumental = t.text == Scene::INSTRUMENTAL_SOURCE;
            if let Some(&(has_explicit_timing, llm_timing_used)) = timing_flags.get(&t.span) {
                scene.metadata.has_explicit_timing = has_explicit_timing;
                scene.metadata.llm_timing_used = llm_timing_used;
            }
            scene.prompt = apply_style_prefix(&scene.prompt, style, scene.metadata.is_instrumental);
            scene
        })
        .collect();

    cancel.check()?;

    scenes0 = scenes::split::split(scenes0, config.split_max_ms);

    cancel.check()?;

    let mut scenes1 = scenes::batch::batch(scenes0, config.batch_target_ms);

    attach_references(&mut scenes1, input.auto_link_mode);

    let mut storyboard = storyboard_core::Storyboard {
        scenes: scenes1,
        total_duration_ms: 0,
        tempo_bpm: None,
        audio: None,
        midi: None,
    };
    storyboard.recompute_total_duration();

    Ok(storyboard)
}

/// For lines with no timestamp of their own, tries to recover one from
/// an aligned transcription via C4's segment lookup, bridging "only a
/// transcript" inputs into the timestamp-driven strategy.
fn align_timestamps_from_words(lines: &mut [ParsedLine], words: &TranscriptionResult) {
    for line in lines {
        if line.timestamp_ms.is_some() || line.text.is_empty() {
            continue;
        }
        let (start_ms, end_ms) = alignment::get_timing_for_text_segment(words, &line.text);
        if end_ms > start_ms {
            line.timestamp_ms = Some(start_ms);
        }
    }
}

/// Prepends `"<style> style: "` to `prompt` unless it already begins
/// with the style token (case-insensitively) or the scene is an
/// instrumental placeholder. Forbidding double-application by always
/// checking the existing prefix first (rather than a one-shot flag)
/// is the fix spec.md §9 calls for.
#[must_use]
pub fn apply_style_prefix(prompt: &str, style: Option<&str>, is_instrumental: bool) -> String {
    let Some(style) = style else {
        return prompt.to_string();
    };
    if is_instrumental {
        return prompt.to_string();
    }

    let prefix_token = format!("{style} style:");
    if prompt.to_lowercase().starts_with(&prefix_token.to_lowercase()) {
        return prompt.to_string();
    }

    format!("{style} style: {prompt}")
}

/// Implements the two mutually-exclusive auto-link policies (spec.md
/// §4.9). Never applied to scene 0.
pub fn attach_references(scenes: &mut [Scene], mode: AutoLinkMode) {
    if mode == AutoLinkMode::Disabled || scenes.len() < 2 {
        return;
    }

    for i in 1..scenes.len() {
        let Some(prev_end_frame) = scenes[i - 1].end_frame.clone() else {
            continue;
        };
        match mode {
            AutoLinkMode::ReferenceImage => {
                let mut link = prev_end_frame;
                link.auto_linked = true;
                link.kind = storyboard_core::RefKind::Reference;
                scenes[i].reference_images[0] = Some(link);
            }
            AutoLinkMode::StartFrame => {
                let mut link = prev_end_frame;
                link.auto_linked = true;
                link.kind = storyboard_core::RefKind::StartFrame;
                scenes[i].start_frame = Some(link);
            }
            AutoLinkMode::Disabled => unreachable!(),
        }
    }
}
