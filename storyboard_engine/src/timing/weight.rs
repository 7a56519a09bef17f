//! The line-weight function shared by strategies 4 and 5 (spec.md
//! §4.3 "Weight function"), carried from `calculate_line_weights` in
//! `storyboard.py`.

use storyboard_core::ParsedLine;

/// Relative weight for a single line. Section-marker placeholder lines
/// get `base * 0.3`; everything else starts at `1.0` and is adjusted
/// by length and section label.
#[must_use]
pub fn line_weight(line: &ParsedLine) -> f64 {
    if line.is_section_marker() {
        return 0.3;
    }

    let mut weight = 1.0;

    let len = line.text.chars().count();
    weight *= if len > 100 {
        1.3
    } else if len > 50 {
        1.1
    } else if len < 20 {
        0.8
    } else {
        1.0
    };

    if let Some(section) = &line.section {
        let lower = section.to_lowercase();
        if lower.contains("chorus") {
            weight *= 1.2;
        } else if lower.contains("bridge") {
            weight *= 1.1;
        } else if lower.contains("intro") || lower.contains("outro") {
            weight *= 0.9;
        }
    }

    if !weight.is_finite() {
        panic!("non-finite line weight computed for line {}", line.line_number);
    }

    if weight <= 0.0 { 1.0 } else { weight }
}

/// Weight for every line in `lines`, in order.
#[must_use]
pub fn line_weights(lines: &[ParsedLine]) -> Vec<f64> {
    lines.iter().map(line_weight).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard_core::ParsedLine;

    fn line(text: &str, section: Option<&str>) -> ParsedLine {
        ParsedLine {
            text: text.to_string(),
            timestamp_ms: None,
            section: section.map(str::to_string),
            tags: Vec::new(),
            line_number: 1,
            explicit_duration_ms: None,
        }
    }

    #[test]
    fn short_line_is_downweighted() {
        assert!((line_weight(&line("hi", None)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn long_line_is_upweighted() {
        let text = "x".repeat(120);
        assert!((line_weight(&line(&text, None)) - 1.3).abs() < 1e-9);
    }

    #[test]
    fn chorus_section_multiplies_weight() {
        let w = line_weight(&line("medium length line here", Some("Chorus")));
        assert!((w - 1.2).abs() < 1e-9);
    }

    #[test]
    fn section_marker_gets_base_times_point_three() {
        let marker = ParsedLine {
            text: String::new(),
            timestamp_ms: None,
            section: Some("Verse 1".to_string()),
            tags: Vec::new(),
            line_number: 1,
            explicit_duration_ms: None,
        };
        assert!((line_weight(&marker) - 0.3).abs() < 1e-9);
    }
}
