//! Aligns an existing translation draft to the chunk boundaries of its
//! source manuscript, for `fix` mode.
//!
//! There is no guarantee a draft was produced with the same chunker (or
//! any chunker at all), so the draft is realigned by proportional
//! character length against the reference chunks, then every split point
//! is snapped to the nearest sentence or line boundary so a cut never
//! lands mid-word.

use crate::core::Chunk;

const SNAP_WINDOW: usize = 120;

/// Splits `draft` into as many pieces as `reference` has chunks, sized
/// proportionally to each reference chunk's character length.
#[must_use]
pub fn align_translation_by_reference_chunks(reference: &[Chunk], draft_sections: &[String]) -> Vec<String> {
    if reference.is_empty() {
        return Vec::new();
    }
    let lengths: Vec<usize> = reference.iter().map(|c| c.original.chars().count().max(1)).collect();
    let draft_text = draft_sections.join("\n\n");
    split_text_by_reference_lengths(&draft_text, &lengths)
}

fn split_text_by_reference_lengths(text: &str, reference_lengths: &[usize]) -> Vec<String> {
    if reference_lengths.is_empty() {
        return Vec::new();
    }
    if text.is_empty() {
        return reference_lengths.iter().map(|_| String::new()).collect();
    }

    let chars: Vec<char> = text.chars().collect();
    let total_chars = chars.len();
    let total_reference: usize = reference_lengths.iter().sum();

    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut consumed_reference = 0usize;

    for &length in &reference_lengths[..reference_lengths.len() - 1] {
        consumed_reference += length;
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target = ((consumed_reference as f64 / total_reference as f64) * total_chars as f64).round() as usize;
        let split_idx = snap_split_index(&chars, target, start);
        segments.push(chars[start..split_idx].iter().collect::<String>().trim().to_string());
        start = split_idx;
    }
    segments.push(chars[start..].iter().collect::<String>().trim().to_string());
    segments
}

fn snap_split_index(chars: &[char], target: usize, start: usize) -> usize {
    if start >= chars.len() {
        return chars.len();
    }
    let min_idx = start + 1;
    let max_idx = chars.len().saturating_sub(1);
    if min_idx > max_idx {
        return chars.len();
    }
    let target = target.clamp(min_idx, max_idx);

    for radius in 0..=SNAP_WINDOW {
        let left = target.checked_sub(radius);
        let right = target + radius;
        if let Some(left) = left {
            if left >= min_idx && is_natural_break(chars, left) {
                return left;
            }
        }
        if right <= max_idx && is_natural_break(chars, right) {
            return right;
        }
    }
    target
}

fn is_natural_break(chars: &[char], idx: usize) -> bool {
    let prev = if idx > 0 { chars.get(idx - 1) } else { None };
    let curr = chars.get(idx);

    if prev == Some(&'\n') {
        return true;
    }
    if let Some(p) = prev {
        if matches!(p, '.' | '?' | '!' | ';' | ':') {
            return curr.is_none_or(|c| c.is_whitespace());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str) -> Chunk {
        Chunk::new(0, text.to_string(), 0, 1)
    }

    #[test]
    fn empty_reference_yields_no_segments() {
        assert!(align_translation_by_reference_chunks(&[], &["draft".to_string()]).is_empty());
    }

    #[test]
    fn splits_proportionally_by_reference_length() {
        let reference = vec![chunk(&"a".repeat(10)), chunk(&"b".repeat(30))];
        let draft = vec!["x".repeat(4) + ". " + &"y".repeat(36)];
        let aligned = align_translation_by_reference_chunks(&reference, &draft);
        assert_eq!(aligned.len(), 2);
        assert!(aligned[0].len() < aligned[1].len());
    }

    #[test]
    fn empty_draft_yields_empty_strings_for_each_reference_chunk() {
        let reference = vec![chunk("one"), chunk("two")];
        let aligned = align_translation_by_reference_chunks(&reference, &[]);
        assert_eq!(aligned, vec!["".to_string(), "".to_string()]);
    }

    #[test]
    fn snap_prefers_sentence_boundary_near_target() {
        let text: Vec<char> = "Hola mundo. Adios mundo.".chars().collect();
        let idx = snap_split_index(&text, 10, 0);
        assert!(is_natural_break(&text, idx) || idx == 10);
    }
}
