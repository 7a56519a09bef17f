//! C7, pass 1 — Scene Splitter (spec.md §4.7).

use storyboard_core::{Scene, SplitPart, TimeSpan};

/// Splits every scene whose `duration_ms` exceeds `max_ms` into
/// `floor(duration_ms / max_ms) + 1` equal-ish parts, with
/// `split_part = {k, n}` on each part. The 8-second ceiling (spec.md
/// §8: "every scene has `duration_ms ≤ 8000`") binds unconditionally —
/// `has_explicit_timing`/`llm_timing_used` scenes split too (spec.md
/// §8 Scenario C splits a 10s explicit-duration scene into two 5s
/// parts); those flags instead make a scene's *sum* authoritative
/// against target-duration scaling (C3) and keep it out of cross-
/// boundary batching (C7 batch). Re-densifies `order` afterward.
#[must_use]
pub fn split(scenes: Vec<Scene>, max_ms: u32) -> Vec<Scene> {
    let mut out = Vec::with_capacity(scenes.len());

    for scene in scenes {
        if scene.duration_ms <= max_ms {
            out.push(scene);
            continue;
        }

        let n = scene.duration_ms / max_ms + 1;
        out.extend(split_into(scene, n));
    }

    for (i, scene) in out.iter_mut().enumerate() {
        scene.order = i as u32;
    }

    out
}

fn split_into(scene: Scene, n: u32) -> Vec<Scene> {
    let total_ms = scene.span.duration_ms();
    let start = scene.span.start_ms;

    (0..n)
        .map(|k| {
            let part_start = start + (total_ms * u64::from(k)) / u64::from(n);
            let part_end = start + (total_ms * u64::from(k + 1)) / u64::from(n);
            let span = TimeSpan::new(part_start, part_end);

            let mut part = scene.clone();
            part.span = span;
            part.duration_ms = span.duration_ms() as u32;
            part.metadata.split_part = Some(SplitPart { index: k + 1, total: n });
            part
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_core::Scene;

    fn scene(duration_ms: u32) -> Scene {
        Scene::new(
            0,
            "a long line".to_string(),
            "a long line".to_string(),
            TimeSpan::new(0, u64::from(duration_ms)),
        )
    }

    #[test]
    fn splits_overlong_scene_into_equal_parts() {
        let s = scene(17_000);
        let parts = split(vec![s], 8000);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].metadata.split_part, Some(SplitPart { index: 1, total: 3 }));
        assert_eq!(parts[2].metadata.split_part, Some(SplitPart { index: 3, total: 3 }));
        assert_eq!(parts[0].span.start_ms, 0);
        assert_eq!(parts.last().unwrap().span.end_ms, 17_000);
        for w in parts.windows(2) {
            assert_eq!(w[0].span.end_ms, w[1].span.start_ms);
        }
    }

    #[test]
    fn leaves_short_scenes_untouched() {
        let s = scene(3000);
        let parts = split(vec![s], 8000);
        assert_eq!(parts.len(), 1);
        assert!(parts[0].metadata.split_part.is_none());
    }

    #[test]
    fn splits_explicit_timing_scenes_too() {
        let mut s = scene(20_000);
        s.metadata.has_explicit_timing = true;
        let parts = split(vec![s], 8000);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.metadata.has_explicit_timing));
        assert!(parts.iter().all(|p| p.duration_ms <= 8000));
    }

    #[test]
    fn order_is_densified_after_split() {
        let scenes = vec![scene(17_000), scene(2000)];
        let out = split(scenes, 8000);
        for (i, s) in out.iter().enumerate() {
            assert_eq!(s.order, i as u32);
        }
    }
}
