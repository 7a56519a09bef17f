//! Tag parsing, timing solving, Whisper alignment, LLM sync, gap
//! filling, and scene splitting/batching for the storyboard-construction
//! pipeline (spec.md §4). `storyboard_core` owns the data model;
//! this crate owns the behavior that turns raw lyric text (plus
//! optional audio/MIDI/transcript signals) into a `Storyboard`.

pub mod alignment;
pub mod config;
pub mod coordinator;
pub mod gap_filler;
pub mod line_parser;
pub mod llm_sync;
pub mod scenes;
pub mod tag_parser;
pub mod timing;

pub use config::{PacingPresets, PipelineConfig};
pub use coordinator::{build_storyboard, AutoLinkMode, BuildInput, CancellationToken, PresetOrDefault};
pub use line_parser::InputFormat;
pub use llm_sync::LlmClient;
pub use timing::{MidiSections, Preset, StrategyUsed};
