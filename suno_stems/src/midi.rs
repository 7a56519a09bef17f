//! C8, pass 2 — permissive MIDI loading and multi-track merge
//! (spec.md §4.8).
//!
//! Suno MIDI files frequently carry invalid key signatures (e.g. 19
//! sharps). `midly` parses the raw meta-event bytes without validating
//! them, so nothing needs to be "registered" to load such a file — but
//! we still need a lazily-installed, process-wide, idempotent switch so
//! that this crate's one piece of shared state (spec.md §4.8: "the
//! repository's only piece of process-wide state") has somewhere to
//! live, and so every code path that filters key signatures agrees on
//! what "invalid" means.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use midly::{Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use storyboard_core::error::MidiError;
use storyboard_core::StemName;

static PERMISSIVE_MIDI_INIT: Once = Once::new();
static PERMISSIVE_MIDI_ENABLED: AtomicBool = AtomicBool::new(false);

/// Installs the permissive key-signature filter once, idempotently.
/// Never torn down for the life of the process, per spec.md §4.8.
pub fn ensure_permissive_midi_loader() {
    PERMISSIVE_MIDI_INIT.call_once(|| {
        PERMISSIVE_MIDI_ENABLED.store(true, Ordering::SeqCst);
        tracing::info!("[SunoStems] installed permissive MIDI key-signature handler");
    });
}

/// A `key_signature` sharps/flats count outside standard notation
/// (`-7..=7`) is what Suno exports for an "unknown" key. Anything
/// outside that range is filtered rather than propagated.
fn is_valid_key_signature(sharps: i8) -> bool {
    (-7..=7).contains(&sharps)
}

fn is_key_signature_event(kind: &TrackEventKind<'_>) -> Option<i8> {
    match kind {
        TrackEventKind::Meta(MetaMessage::KeySignature(sharps, _minor)) => Some(*sharps),
        _ => None,
    }
}

fn has_notes(track: &Track<'_>) -> bool {
    track.iter().any(|event| {
        matches!(
            event.kind,
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. },
                ..
            }
        )
    })
}

/// Copies a track's events, dropping any event for which `keep`
/// returns `false` while preserving absolute tick positions by folding
/// a dropped event's delta into the next kept event.
fn filter_track_preserving_deltas<'a>(
    track: &Track<'a>,
    mut keep: impl FnMut(&TrackEventKind<'a>) -> bool,
) -> Vec<TrackEvent<'a>> {
    let mut out = Vec::new();
    let mut pending_delta: u32 = 0;

    for event in track {
        if keep(&event.kind) {
            out.push(TrackEvent {
                delta: (pending_delta + event.delta.as_int()).into(),
                kind: event.kind,
            });
            pending_delta = 0;
        } else {
            pending_delta += event.delta.as_int();
        }
    }

    out
}

/// Builds the multi-track merged MIDI file described in spec.md §4.8:
/// track 0 is a tempo map copied from the first valid input (only
/// `set_tempo`/`time_signature`), then one track per selected stem
/// (alphabetical), each prefixed with a synthesized `track_name`.
pub fn merge_midi_files(
    midi_files: &BTreeMap<StemName, PathBuf>,
    selected: Option<&BTreeSet<StemName>>,
    output_path: &Path,
) -> storyboard_core::Result<PathBuf> {
    ensure_permissive_midi_loader();

    // `BTreeMap<StemName, _>` orders by `StemName`'s derived `Ord`,
    // which follows enum declaration order (Vocals, Drums, Bass, ...),
    // not the alphabetical-by-name order spec.md §4.8 requires for
    // track layout, so sort explicitly by display string here.
    let mut files_to_merge: Vec<(StemName, &PathBuf)> = midi_files
        .iter()
        .filter(|(name, _)| selected.is_none_or(|s| s.contains(name)))
        .map(|(name, path)| (*name, path))
        .collect();
    files_to_merge.sort_by_key(|(name, _)| name.to_string());

    if files_to_merge.is_empty() {
        return Err(MidiError::NoNoteTracks.into());
    }

    let buffers: Vec<(StemName, Vec<u8>)> = files_to_merge
        .iter()
        .filter_map(|(name, path)| match crate::discovery::read_file(path) {
            Ok(bytes) => Some((*name, bytes)),
            Err(err) => {
                tracing::warn!("[SunoStems] could not read {}: {err}", path.display());
                None
            }
        })
        .collect();

    let parsed: Vec<(StemName, Smf<'_>)> = buffers
        .iter()
        .filter_map(|(name, bytes)| match Smf::parse(bytes) {
            Ok(smf) => Some((*name, smf)),
            Err(err) => {
                tracing::warn!("[SunoStems] could not parse MIDI for {name}: {err}");
                None
            }
        })
        .collect();

    let Some((_, first)) = parsed.first() else {
        return Err(MidiError::InvalidFile("no input MIDI file could be parsed".into()).into());
    };
    let timing = first.header.timing;

    let mut track_name_bufs: Vec<Vec<u8>> = Vec::new();
    let mut tracks: Vec<Track<'_>> = Vec::new();

    let tempo_track = first
        .tracks
        .first()
        .map(|track| {
            filter_track_preserving_deltas(track, |kind| {
                matches!(
                    kind,
                    TrackEventKind::Meta(MetaMessage::Tempo(_))
                        | TrackEventKind::Meta(MetaMessage::TimeSignature(..))
                )
            })
        })
        .unwrap_or_default();
    tracks.push(tempo_track);

    for (stem_name, smf) in &parsed {
        let Some(note_track) = smf.tracks.iter().find(|t| has_notes(t)) else {
            tracing::debug!("[SunoStems] {stem_name} MIDI file has no note-bearing track");
            continue;
        };

        let mut body = filter_track_preserving_deltas(note_track, |kind| {
            !matches!(kind, TrackEventKind::Meta(MetaMessage::TrackName(_)))
                && is_key_signature_event(kind).is_none_or(is_valid_key_signature)
        });

        track_name_bufs.push(stem_name.to_string().into_bytes());
        let name_bytes: &[u8] = track_name_bufs.last().unwrap();
        let mut new_track = vec![TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(name_bytes)),
        }];
        new_track.append(&mut body);
        tracks.push(new_track);
    }

    if tracks.len() <= 1 {
        return Err(MidiError::NoNoteTracks.into());
    }

    for track in &mut tracks {
        track.push(TrackEvent {
            delta: 0.into(),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });
    }

    let merged = Smf {
        header: Header {
            format: midly::Format::Parallel,
            timing,
        },
        tracks,
    };

    merged
        .save(output_path)
        .map_err(|err| MidiError::InvalidFile(format!("failed to write merged MIDI: {err}")))?;

    tracing::info!(
        "[SunoStems] merged {} MIDI tracks into {}",
        tracks_len_minus_tempo(&merged),
        output_path.display()
    );

    Ok(output_path.to_path_buf())
}

fn tracks_len_minus_tempo(smf: &Smf<'_>) -> usize {
    smf.tracks.len().saturating_sub(1)
}
