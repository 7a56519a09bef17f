//! Inline `{tag:value}` annotations (spec.md §3, §4.1).

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// The closed set of recognized tag kinds. Matched case-insensitively
/// in the parser and normalized to lowercase on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TagKind {
    Scene,
    Camera,
    Mood,
    Focus,
    Transition,
    Style,
    Tempo,
    Time,
    Lipsync,
}

/// A single parsed tag, attributed to the line and character offset it
/// was found at. `Lipsync` carries no value (boolean presence);
/// `Time` carries `mm:ss(.mmm)`; the rest carry free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub kind: TagKind,
    pub value: Option<String>,
    pub line_index: u32,
    pub char_offset: u32,
}
