//! Shared data model and error taxonomy for the storyboard-construction
//! pipeline. No I/O, no business logic — this crate only defines the
//! types that `storyboard_engine` and `suno_stems` pass between each
//! other and hand back to the host.

pub mod error;
pub mod scene;
pub mod suno;
pub mod tag;
pub mod time;
pub mod timing;

pub use error::{Error, Result};
pub use scene::{
    AudioTrackRef, FrameRef, MidiTimingRef, RefKind, ReferenceLink, Scene, SceneMetadata,
    SplitPart, Storyboard,
};
pub use suno::{StemName, SunoPackage};
pub use tag::{Tag, TagKind};
pub use time::TimeSpan;
pub use timing::{AlignmentResult, ParsedLine, TimedLyric, TranscriptionResult, WordTiming};
