//! C8 — Suno multi-stem package preprocessor (spec.md §4.8).
//!
//! Detects a multi-stem zip, extracts it to a scope-bound temp
//! directory, classifies files by stem name, and merges selected
//! audio stems (equal-weight `amix`) and MIDI tracks (one per stem)
//! into single files.

pub mod audio;
pub mod discovery;
pub mod midi;

pub use audio::{merge_audio_stems, AudioMuxer, FfmpegMuxer};
pub use discovery::detect_package;
pub use midi::{ensure_permissive_midi_loader, merge_midi_files};
