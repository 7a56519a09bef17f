//! The storyboard atom and its surrounding types (spec.md §3).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::TimeSpan;

/// The maximum length of a single scene, in milliseconds. No scene
/// produced by `build_storyboard` may exceed this.
pub const MAX_SCENE_DURATION_MS: u32 = 8000;

/// The batcher's target length for a merged scene. Policy, not law —
/// unlike `MAX_SCENE_DURATION_MS` a batch may end up shorter than this
/// if there aren't enough short scenes left to fill it.
pub const TARGET_SCENE_DURATION_MS: u32 = 8000;

/// Policy minimum scene length (spec.md §3 invariant 3: "minimum is
/// policy, not law").
pub const MIN_SCENE_DURATION_MS: u32 = 1000;

/// What an image artifact is being referenced *as*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    /// The first frame of a scene's generated clip.
    StartFrame,
    /// The last frame of a scene's generated clip.
    EndFrame,
    /// A free-standing reference image (one of the three reference slots).
    Reference,
}

/// A relation to an image artifact on disk. The core never generates
/// pixels; it only tracks which path plays which role for a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLink {
    pub path: PathBuf,
    pub auto_linked: bool,
    pub kind: RefKind,
}

/// Alias used for `start_frame`/`end_frame`: a `ReferenceLink` scoped
/// to `RefKind::StartFrame`/`RefKind::EndFrame`.
pub type FrameRef = ReferenceLink;

/// Which split group a scene belongs to, set only when it was produced
/// by the splitter (spec.md §3 invariant 5, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitPart {
    pub index: u32,
    pub total: u32,
}

/// A single member's relative span inside a batched scene (spec.md §3
/// invariant 4, §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricTiming {
    pub text: String,
    pub span: TimeSpan,
}

/// Closed, typed metadata bag. Deliberately not string-keyed — see
/// spec.md §9's "Scene objects as mutable bags" redesign flag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub section: Option<String>,
    pub is_instrumental: bool,
    pub has_explicit_timing: bool,
    pub llm_timing_used: bool,
    pub batched_count: u32,
    pub lyric_timings: Vec<LyricTiming>,
    pub split_part: Option<SplitPart>,
    pub wrapped: bool,
    pub reference_links: Vec<ReferenceLink>,
}

impl SceneMetadata {
    #[must_use]
    pub fn new() -> Self {
        Self {
            batched_count: 1,
            ..Default::default()
        }
    }
}

/// The storyboard atom (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: Uuid,
    pub order: u32,
    pub source: String,
    pub prompt: String,
    pub environment: Option<String>,
    pub span: TimeSpan,
    pub duration_ms: u32,
    pub metadata: SceneMetadata,
    pub start_frame: Option<FrameRef>,
    pub end_frame: Option<FrameRef>,
    pub reference_images: [Option<ReferenceLink>; 3],
}

impl Scene {
    /// The literal source text the gap filler inserts for silence.
    pub const INSTRUMENTAL_SOURCE: &'static str = "[Instrumental]";

    /// Builds a scene from a span and source text; `duration_ms` is
    /// derived from the span so the two can never disagree.
    #[must_use]
    pub fn new(order: u32, source: String, prompt: String, span: TimeSpan) -> Self {
        let duration_ms = span.duration_ms() as u32;
        Self {
            id: Uuid::new_v4(),
            order,
            source,
            prompt,
            environment: None,
            span,
            duration_ms,
            metadata: SceneMetadata::new(),
            start_frame: None,
            end_frame: None,
            reference_images: [None, None, None],
        }
    }
}

/// A reference to the audio track a storyboard was built against; the
/// core never decodes or plays audio, it only remembers where it came
/// from and how long it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackRef {
    pub path: PathBuf,
    pub duration_ms: u64,
}

/// A reference to the MIDI file a storyboard's section weighting was
/// derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiTimingRef {
    pub path: PathBuf,
    pub tempo_bpm: Option<f32>,
}

/// The final, ordered output of `build_storyboard` (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    pub scenes: Vec<Scene>,
    pub total_duration_ms: u64,
    pub tempo_bpm: Option<f32>,
    pub audio: Option<AudioTrackRef>,
    pub midi: Option<MidiTimingRef>,
}

impl Storyboard {
    /// Recomputes `total_duration_ms` as the max `span.end_ms` over all
    /// scenes (spec.md §3 invariant 6) — not the sum, since scenes may
    /// be back-to-back but never overlapping after batching.
    pub fn recompute_total_duration(&mut self) {
        self.total_duration_ms = self.scenes.iter().map(|s| s.span.end_ms).max().unwrap_or(0);
    }
}
