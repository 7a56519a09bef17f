//! The error taxonomy shared by every stage of the pipeline
//! (spec.md §7). Kinds, not implementation details: each variant below
//! is what a caller branches on, not what any one crate happens to
//! throw internally.

use thiserror::Error;

/// Why the LLM sync bridge (C5) could not produce usable timings.
/// The coordinator recovers from every variant automatically by
/// falling back to preset-pacing timing (spec.md §4.5, §7); hosts that
/// want visibility into *why* can still match on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmSyncError {
    /// The reply didn't parse as Strict Contract v1.0 or any
    /// recognized legacy shape.
    #[error("could not parse LLM reply as a known timing shape: {excerpt}")]
    Unparseable { excerpt: String },

    /// Strict Contract v1.0 parsed, but `line_count` didn't match the
    /// number of entries actually returned.
    #[error("LLM reply line count mismatch: expected {expected}, got {got}")]
    LineCountMismatch { expected: usize, got: usize },

    /// The injected LLM capability timed out.
    #[error("LLM call timed out")]
    Timeout,

    /// The injected LLM capability failed below the parsing layer
    /// (network, auth, rate limit, ...).
    #[error("LLM transport error: {inner}")]
    Transport { inner: String },
}

/// Errors from loading or merging MIDI assets (C8).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MidiError {
    #[error("invalid MIDI file: {0}")]
    InvalidFile(String),

    #[error("no input MIDI file yielded a note-bearing track")]
    NoNoteTracks,

    #[error("MIDI library unavailable")]
    LibraryUnavailable,
}

/// Errors from merging audio stems (C8).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AudioMergeError {
    #[error("audio muxer executable not found")]
    MuxerMissing,

    #[error("audio muxer failed: {stderr_excerpt}")]
    MuxerFailed { stderr_excerpt: String },

    #[error("no stems selected for merge")]
    NoStemsSelected,
}

/// Errors from discovering/validating a Suno package (C8).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PackageError {
    #[error("not a valid zip archive")]
    InvalidZip,

    #[error("zip contained no recognized Suno stems")]
    NoRecognizedStems,
}

/// The top-level error type returned by `storyboard_engine` and
/// `suno_stems` public APIs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed user input the core could localize to a line. Never
    /// fatal to sibling lines — callers see this only when they asked
    /// for strict parsing.
    #[error("input error on line {line:?}: {message}")]
    Input {
        message: String,
        line: Option<u32>,
    },

    #[error(transparent)]
    LlmSync(#[from] LlmSyncError),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error(transparent)]
    AudioMerge(#[from] AudioMergeError),

    #[error(transparent)]
    Package(#[from] PackageError),

    /// The core refused to emit a `Storyboard` that would violate one
    /// of spec.md §3's invariants. A bug, not a user-input problem.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Cooperative cancellation fired (spec.md §5).
    #[error("build cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
