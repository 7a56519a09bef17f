//! C7 — Scene Splitter/Batcher (spec.md §4.7), run as two ordered
//! passes: split first so nothing downstream has to reason about an
//! overlong scene, then batch the (now policy-conformant) scenes.

pub mod batch;
pub mod split;
