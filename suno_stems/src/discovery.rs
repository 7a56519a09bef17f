//! C8, pass 1 — Suno package discovery (spec.md §4.8).
//!
//! Extracts a zip to a scope-bound temp directory and classifies
//! every file whose name matches `...(StemName).(wav|mp3|m4a|ogg|mid|midi)`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use storyboard_core::error::PackageError;
use storyboard_core::{StemName, SunoPackage};

static STEM_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(([^)]+)\)\.(wav|mp3|m4a|ogg|mid|midi)$").unwrap());

/// Extracts `zip_path` into a fresh `tempfile::TempDir`, walks every
/// extracted file, and buckets recognized stem files into
/// `audio_stems`/`midi_files`. A zip with zero recognized audio stems
/// is rejected and its temp directory released immediately.
pub fn detect_package(zip_path: &Path) -> storyboard_core::Result<SunoPackage> {
    let file = File::open(zip_path).map_err(|_| PackageError::InvalidZip)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|_| PackageError::InvalidZip)?;

    let extract_dir = tempfile::Builder::new()
        .prefix("suno_package_")
        .tempdir()
        .map_err(|_| PackageError::InvalidZip)?;

    let mut audio_stems = BTreeMap::new();
    let mut midi_files = BTreeMap::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|_| PackageError::InvalidZip)?;
        if entry.is_dir() {
            continue;
        }

        let Some(enclosed) = entry.enclosed_name().map(std::path::Path::to_path_buf) else {
            continue;
        };
        let Some(file_name) = enclosed.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let Some((stem, extension)) = classify_filename(file_name) else {
            continue;
        };

        let dest = extract_dir.path().join(&enclosed);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|_| PackageError::InvalidZip)?;
        }
        let mut out = File::create(&dest).map_err(|_| PackageError::InvalidZip)?;
        std::io::copy(&mut entry, &mut out).map_err(|_| PackageError::InvalidZip)?;

        match extension.to_lowercase().as_str() {
            "wav" | "mp3" | "m4a" | "ogg" => {
                audio_stems.insert(stem, dest);
            }
            "mid" | "midi" => {
                midi_files.insert(stem, dest);
            }
            _ => {}
        }
    }

    if audio_stems.is_empty() {
        tracing::debug!("[SunoStems] no recognizable audio stems in {}", zip_path.display());
        return Err(PackageError::NoRecognizedStems.into());
    }

    tracing::info!(
        "[SunoStems] detected package: {} audio stems, {} MIDI files",
        audio_stems.len(),
        midi_files.len()
    );

    Ok(SunoPackage {
        source_zip: zip_path.to_path_buf(),
        audio_stems,
        midi_files,
        extract_dir,
    })
}

/// Matches `...(StemName).ext`, validates `StemName` against the
/// closed recognized set, and returns `(stem, lowercase extension)`.
fn classify_filename(file_name: &str) -> Option<(StemName, String)> {
    let caps = STEM_FILENAME.captures(file_name)?;
    let stem = StemName::from_str(caps[1].trim()).ok()?;
    Some((stem, caps[2].to_lowercase()))
}

/// Reads an entire extracted file into memory. Small helper so
/// `midi.rs` doesn't need to know about `discovery.rs`'s layout.
pub(crate) fn read_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_audio_stem() {
        let (stem, ext) = classify_filename("Ice Ice Baby (Heavy Metal) v2-2 (Vocals).wav").unwrap();
        assert_eq!(stem, StemName::Vocals);
        assert_eq!(ext, "wav");
    }

    #[test]
    fn classifies_known_midi_stem_case_insensitively() {
        let (stem, ext) = classify_filename("song (drums).MID").unwrap();
        assert_eq!(stem, StemName::Drums);
        assert_eq!(ext, "mid");
    }

    #[test]
    fn classifies_backing_vocals_with_space() {
        let (stem, _) = classify_filename("song (Backing Vocals).wav").unwrap();
        assert_eq!(stem, StemName::BackingVocals);
    }

    #[test]
    fn rejects_unrecognized_stem_name() {
        assert!(classify_filename("song (Whistles).wav").is_none());
    }

    #[test]
    fn rejects_files_with_no_parenthetical() {
        assert!(classify_filename("song.wav").is_none());
    }
}
