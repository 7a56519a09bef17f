//! C7, pass 2 — Scene Batcher (spec.md §4.7).

use storyboard_core::{LyricTiming, Scene, TimeSpan};

/// A scene only ever enters a batch if its own duration is well under
/// the target — the summary table and glossary both describe this
/// pass as batching "short" consecutive scenes, not packing any
/// combination of normally-paced scenes up to the target (spec.md §8
/// Scenario A: two ~half-target scenes stay separate). A quarter of
/// the target is short enough to need a neighbor to reach a
/// comfortable on-screen duration without absorbing scenes that are
/// already a reasonable length on their own.
fn is_batch_candidate(scene: &Scene, target_ms: u32) -> bool {
    scene.source != Scene::INSTRUMENTAL_SOURCE
        && !(scene.metadata.section.is_some() && scene.source.is_empty())
        && !scene.metadata.has_explicit_timing
        && !scene.metadata.llm_timing_used
        && scene.duration_ms < target_ms / 4
}

/// Scans consecutive scenes left to right, starting a new batch
/// whenever the next scene would push the running total above
/// `target_ms`. Only scenes short enough to need packing
/// (`is_batch_candidate`) are ever merged; everything else — including
/// section-marker placeholders, `[Instrumental]` scenes, and scenes
/// carrying `has_explicit_timing` or `llm_timing_used` — stands alone
/// as a single-member batch. Re-densifies `order` afterward.
#[must_use]
pub fn batch(scenes: Vec<Scene>, target_ms: u32) -> Vec<Scene> {
    let mut batches: Vec<Vec<Scene>> = Vec::new();
    let mut current: Vec<Scene> = Vec::new();
    let mut accum_ms: u64 = 0;

    for scene in scenes {
        if !is_batch_candidate(&scene, target_ms) {
            if !current.is_empty() {
                batches.push(std::mem::take(&mut current));
                accum_ms = 0;
            }
            batches.push(vec![scene]);
            continue;
        }

        if !current.is_empty() && accum_ms + u64::from(scene.duration_ms) > u64::from(target_ms) {
            batches.push(std::mem::take(&mut current));
            accum_ms = 0;
        }

        accum_ms += u64::from(scene.duration_ms);
        current.push(scene);
    }
    if !current.is_empty() {
        batches.push(current);
    }

    let mut out: Vec<Scene> = batches.into_iter().map(merge_batch).collect();
    for (i, scene) in out.iter_mut().enumerate() {
        scene.order = i as u32;
    }
    out
}

fn merge_batch(mut members: Vec<Scene>) -> Scene {
    if members.len() == 1 {
        return members.pop().unwrap();
    }

    let source = members.iter().map(|s| s.source.as_str()).collect::<Vec<_>>().join("\n");
    let prompt = members.iter().map(|s| s.prompt.as_str()).collect::<Vec<_>>().join("\n");
    let span = TimeSpan::new(
        members.first().unwrap().span.start_ms,
        members.last().unwrap().span.end_ms,
    );

    let lyric_timings: Vec<LyricTiming> = members
        .iter()
        .map(|s| LyricTiming {
            text: s.source.clone(),
            span: s.span,
        })
        .collect();

    let mut scene = Scene::new(members[0].order, source, prompt, span);
    scene.metadata.section = members[0].metadata.section.clone();
    scene.metadata.batched_count = members.len() as u32;
    scene.metadata.lyric_timings = lyric_timings;
    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_core::Scene;

    fn scene(order: u32, source: &str, start: u64, end: u64) -> Scene {
        Scene::new(order, source.to_string(), source.to_string(), TimeSpan::new(start, end))
    }

    #[test]
    fn batches_consecutive_short_scenes() {
        // Each under target_ms/4 = 2000, so all three are candidates;
        // the third would push accum (1500+1500=3000) to 4500, still
        // under the 8000 target, so all three merge into one batch.
        let scenes = vec![
            scene(0, "a", 0, 1500),
            scene(1, "b", 1500, 3000),
            scene(2, "c", 3000, 4500),
        ];
        let out = batch(scenes, 8000);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].metadata.batched_count, 3);
        assert_eq!(out[0].source, "a\nb\nc");
        assert_eq!(out[0].span, TimeSpan::new(0, 4500));
        assert_eq!(out[0].metadata.lyric_timings.len(), 3);
    }

    #[test]
    fn half_target_scenes_never_merge() {
        // spec.md §8 Scenario A: two scenes at roughly half the
        // target stay separate — "short" means well under target, not
        // merely summing to at-or-under it.
        let scenes = vec![scene(0, "a", 0, 4000), scene(1, "b", 4000, 8000)];
        let out = batch(scenes, 8000);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.metadata.batched_count == 1));
    }

    #[test]
    fn instrumental_scenes_never_merge() {
        let mut instrumental = scene(1, Scene::INSTRUMENTAL_SOURCE, 1500, 2000);
        instrumental.metadata.is_instrumental = true;
        let scenes = vec![scene(0, "a", 0, 1500), instrumental, scene(2, "b", 2000, 3500)];
        let out = batch(scenes, 8000);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|s| s.metadata.batched_count == 1));
    }

    #[test]
    fn explicit_timing_scenes_stand_alone() {
        let mut explicit = scene(1, "b", 1500, 3000);
        explicit.metadata.has_explicit_timing = true;
        let scenes = vec![
            scene(0, "a", 0, 1500),
            explicit,
            scene(2, "c", 3000, 4500),
            scene(3, "d", 4500, 6000),
        ];
        let out = batch(scenes, 8000);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].metadata.batched_count, 1);
        assert_eq!(out[0].source, "a");
        assert_eq!(out[1].metadata.batched_count, 1);
        assert_eq!(out[2].metadata.batched_count, 2);
        assert_eq!(out[2].source, "c\nd");
    }

    #[test]
    fn order_is_densified_after_batch() {
        let scenes = vec![scene(0, "a", 0, 1500), scene(1, "b", 1500, 3000)];
        let out = batch(scenes, 8000);
        for (i, s) in out.iter().enumerate() {
            assert_eq!(s.order, i as u32);
        }
    }
}
