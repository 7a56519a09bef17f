//! Suno multi-stem package types (spec.md §3, §4.8).

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// The closed, case-insensitively-matched set of recognized Suno stem
/// names (spec.md §3).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    EnumString, Display, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum StemName {
    Vocals,
    Drums,
    Bass,
    Guitar,
    Synth,
    Piano,
    Strings,
    Brass,
    #[strum(serialize = "FX", serialize = "Fx")]
    Fx,
    #[strum(serialize = "Backing Vocals", serialize = "Backing_Vocals")]
    BackingVocals,
    Lead,
    Rhythm,
    Percussion,
    Keys,
}

/// A detected and extracted Suno multi-stem package (spec.md §3, §4.8).
///
/// `extract_dir` is a `tempfile::TempDir`, which already gives us the
/// scoped-resource semantics spec.md §4.8/§5 ask for: the directory is
/// removed when the `SunoPackage` (or whoever holds the `TempDir`) is
/// dropped, on success, on error, and best-effort on process exit.
#[derive(Debug)]
pub struct SunoPackage {
    pub source_zip: PathBuf,
    pub audio_stems: BTreeMap<StemName, PathBuf>,
    pub midi_files: BTreeMap<StemName, PathBuf>,
    pub extract_dir: tempfile::TempDir,
}

/// Human-readable summary for a host building a "select/link stems" UI.
///
/// Carried from `suno_package.py`'s `get_package_info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunoPackageSummary {
    pub audio_stems: Vec<StemName>,
    pub midi_files: Vec<StemName>,
    pub linked: Vec<StemName>,
}

impl SunoPackage {
    /// Stem names present in both `audio_stems` and `midi_files` — the
    /// "linked stems" convenience spec.md §4.8 describes. Metadata
    /// only; the core never enforces the link.
    #[must_use]
    pub fn linked_stems(&self) -> Vec<StemName> {
        self.audio_stems
            .keys()
            .filter(|name| self.midi_files.contains_key(*name))
            .copied()
            .collect()
    }

    #[must_use]
    pub fn summary(&self) -> SunoPackageSummary {
        SunoPackageSummary {
            audio_stems: self.audio_stems.keys().copied().collect(),
            midi_files: self.midi_files.keys().copied().collect(),
            linked: self.linked_stems(),
        }
    }
}
