//! C8, pass 3 — audio stem merge (spec.md §4.8, §6).
//!
//! The muxer contract is "given N input audio paths and an output
//! path, produce a stereo mix equal to `amix(inputs=N, duration=longest)`,
//! no per-stem gain" — spec.md §6 allows this to be injected or
//! invoked as a subprocess, mirroring C5's `LlmClient` capability
//! split. `FfmpegMuxer` is the subprocess default; hosts that already
//! embed an audio engine can implement `AudioMuxer` directly instead.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use storyboard_core::error::AudioMergeError;
use storyboard_core::StemName;
use tokio::process::Command;

/// The injectable audio-mixing capability.
#[async_trait]
pub trait AudioMuxer: Send + Sync {
    async fn mix(&self, inputs: &[PathBuf], output: &Path) -> Result<(), AudioMergeError>;
}

/// Shells out to an `ffmpeg`-compatible binary on `PATH`.
pub struct FfmpegMuxer {
    pub binary: String,
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }
}

#[async_trait]
impl AudioMuxer for FfmpegMuxer {
    async fn mix(&self, inputs: &[PathBuf], output: &Path) -> Result<(), AudioMergeError> {
        if inputs.is_empty() {
            return Err(AudioMergeError::NoStemsSelected);
        }

        if inputs.len() == 1 {
            std::fs::copy(&inputs[0], output).map_err(|err| AudioMergeError::MuxerFailed {
                stderr_excerpt: format!("failed to copy single stem: {err}"),
            })?;
            return Ok(());
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-y");
        for input in inputs {
            cmd.arg("-i").arg(input);
        }

        let labels: String = (0..inputs.len()).map(|i| format!("[{i}:a]")).collect();
        let filter = format!("{labels}amix=inputs={}:duration=longest", inputs.len());
        cmd.args(["-filter_complex", &filter, "-ac", "2"]).arg(output);

        let result = cmd.output().await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                AudioMergeError::MuxerMissing
            } else {
                AudioMergeError::MuxerFailed {
                    stderr_excerpt: err.to_string(),
                }
            }
        })?;

        if !result.status.success() {
            let stderr_excerpt = String::from_utf8_lossy(&result.stderr)
                .chars()
                .take(500)
                .collect();
            return Err(AudioMergeError::MuxerFailed { stderr_excerpt });
        }

        Ok(())
    }
}

/// Selects the stems to merge (all, or `selected` if given), filters
/// to the existing audio stem paths, and calls `muxer.mix`.
pub async fn merge_audio_stems(
    muxer: &dyn AudioMuxer,
    audio_stems: &BTreeMap<StemName, PathBuf>,
    selected: Option<&BTreeSet<StemName>>,
    output_path: &Path,
) -> storyboard_core::Result<PathBuf> {
    let inputs: Vec<PathBuf> = audio_stems
        .iter()
        .filter(|(name, _)| selected.is_none_or(|s| s.contains(name)))
        .map(|(_, path)| path.clone())
        .collect();

    if inputs.is_empty() {
        return Err(AudioMergeError::NoStemsSelected.into());
    }

    tracing::info!("[SunoStems] merging {} audio stems into {}", inputs.len(), output_path.display());
    muxer.mix(&inputs, output_path).await?;
    Ok(output_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMuxer {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl AudioMuxer for RecordingMuxer {
        async fn mix(&self, inputs: &[PathBuf], _output: &Path) -> Result<(), AudioMergeError> {
            self.calls.lock().unwrap().push(inputs.len());
            Ok(())
        }
    }

    #[tokio::test]
    async fn merges_selected_stems_only() {
        let mut audio_stems = BTreeMap::new();
        audio_stems.insert(StemName::Vocals, PathBuf::from("vocals.wav"));
        audio_stems.insert(StemName::Drums, PathBuf::from("drums.wav"));
        audio_stems.insert(StemName::Bass, PathBuf::from("bass.wav"));

        let mut selected = BTreeSet::new();
        selected.insert(StemName::Vocals);
        selected.insert(StemName::Drums);

        let muxer = RecordingMuxer::default();
        merge_audio_stems(&muxer, &audio_stems, Some(&selected), Path::new("out.wav"))
            .await
            .unwrap();

        assert_eq!(muxer.calls.lock().unwrap().as_slice(), &[2]);
    }

    #[tokio::test]
    async fn errors_when_nothing_selected() {
        let audio_stems = BTreeMap::new();
        let muxer = RecordingMuxer::default();
        let result = merge_audio_stems(&muxer, &audio_stems, None, Path::new("out.wav")).await;
        assert!(result.is_err());
    }
}
