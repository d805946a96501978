//! Heuristic character-name extraction from a source/translation fragment
//! pair.
//!
//! Capitalization alone is far too noisy a signal for character names in
//! translated prose (sentence starts, headers, shouted dialogue all
//! capitalize). This detector requires contextual evidence — a speech verb,
//! an action verb, a title, or repetition away from sentence starts —
//! before promoting a capitalized token to a character candidate.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::bible::PLACEHOLDER_DESCRIPTION;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-ZÁÉÍÓÚÑ][a-záéíóúñ]{2,}\b").expect("fixed literal"));

static SPEECH_VERBS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    normalized_set(&[
        "dijo", "dijeron", "pregunto", "pregunto", "respondio", "respondio", "grito", "grito",
        "susurro", "susurro", "murmuro", "murmuro", "exclamo", "exclamo", "anadio", "anadio",
    ])
});

static ACTION_VERBS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    normalized_set(&[
        "miro", "sonrio", "asintio", "avanzo", "ataco", "corrio", "rio", "penso", "ordeno", "entro",
        "salio",
    ])
});

static TITLE_HINTS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    normalized_set(&[
        "senor", "senora", "sr", "sra", "sir", "lady", "lord", "rey", "reina", "principe",
        "princesa", "general", "capitan", "doctor", "doctora",
    ])
});

static GENITIVE_PREPOSITIONS: LazyLock<HashSet<String>> = LazyLock::new(|| normalized_set(&["de", "del"]));

static NON_CHARACTER_WORDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    normalized_set(&[
        "el", "la", "los", "las", "un", "una", "de", "del", "al", "en", "por", "para", "con", "sin",
        "el", "ella", "ellas", "ello", "ellos", "eso", "esto", "esta", "este", "antes", "despues",
        "cuando", "mientras", "aunque", "porque", "pero", "como", "que", "entonces", "asi",
        "todavia", "bueno", "luego", "ahora", "estaba", "era", "fue", "es", "son", "eres", "estas",
        "escuche", "senor", "sala", "control", "centro", "verdad", "cualquiera", "demonio",
        "guardianes", "guardian", "guerreros", "guerrero", "soldados", "soldado", "angeles", "angel",
        "generales", "lideres", "ejercito", "ejercitos", "doce", "siete", "tres", "diez", "cinco",
        "seis", "ocho", "nueve", "once", "kufufufu", "jajaja", "jejeje", "hahaha", "texto", "original",
        "chunk", "capitulo", "pagina", "regreso", "estrella", "dragon", "slime", "demon", "lord",
        "king", "queen", "emperor", "master", "the", "that", "this", "time", "got", "from", "with",
        "when", "then", "they", "them", "their", "there", "have", "been", "will", "would", "could",
        "which", "what", "where", "who", "how", "some", "all", "one", "two", "him", "her", "his",
        "she", "was", "were", "had", "has", "may", "also", "even", "only", "than", "more", "very",
        "too", "out", "back", "being", "said", "still", "again", "most", "other", "into", "over",
        "after", "before", "about", "just", "your", "our", "and", "but", "not", "any", "new", "see",
        "its", "for", "are", "reincarnated",
    ])
});

fn normalize(value: &str) -> String {
    // Strip combining diacritics (NFKD-equivalent via char decomposition is
    // unavailable without a crate; ASCII-fold the Spanish accented vowels we
    // actually use in the pattern sets instead) and lowercase.
    value
        .chars()
        .map(|c| match c {
            'á' | 'Á' => 'a',
            'é' | 'É' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'Ó' => 'o',
            'ú' | 'Ú' => 'u',
            'ñ' | 'Ñ' => 'n',
            other => other,
        })
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

fn normalized_set(words: &[&str]) -> HashSet<String> {
    words.iter().map(|w| normalize(w)).collect()
}

#[derive(Default)]
struct CandidateStats {
    occurrences: u32,
    speech_hits: u32,
    action_hits: u32,
    title_hits: u32,
    sentence_start_hits: u32,
    genitive_hits: u32,
    first_index: usize,
}

/// Detects character candidates in a fragment, returning placeholder
/// entries ready to merge into a [`crate::core::bible::BibleUpdate`].
///
/// `existing_characters` lets an already-confirmed name keep scoring highly
/// even once its usage pattern would no longer qualify a fresh candidate —
/// once a character, always re-detectable.
#[must_use]
pub fn extract_character_mentions(
    source_text: &str,
    translated_text: &str,
    max_characters: usize,
    existing_characters: &HashMap<String, String>,
) -> HashMap<String, String> {
    let combined = format!("{source_text}\n{translated_text}");
    let combined = combined.trim();
    if combined.is_empty() {
        return HashMap::new();
    }

    let known_by_norm: HashMap<String, String> =
        existing_characters.keys().map(|name| (normalize(name), name.clone())).collect();

    let mut stats_by_norm: HashMap<String, CandidateStats> = HashMap::new();
    let mut display_by_norm: HashMap<String, String> = HashMap::new();

    for m in NAME_RE.find_iter(combined) {
        let raw_name = m.as_str();
        let norm = normalize(raw_name);
        let stats = stats_by_norm.entry(norm.clone()).or_insert_with(|| CandidateStats {
            first_index: usize::MAX,
            ..Default::default()
        });
        stats.occurrences += 1;
        stats.first_index = stats.first_index.min(m.start());
        if is_sentence_start(combined, m.start()) {
            stats.sentence_start_hits += 1;
        }
        if has_speech_context(combined, raw_name, m.start(), m.end()) {
            stats.speech_hits += 1;
        }
        if has_action_context(combined, m.end()) {
            stats.action_hits += 1;
        }
        if has_title_context(combined, m.start()) {
            stats.title_hits += 1;
        }
        if has_genitive_context(combined, m.start()) {
            stats.genitive_hits += 1;
        }

        if let Some(canonical) = known_by_norm.get(&norm) {
            display_by_norm.insert(norm, canonical.clone());
        } else {
            display_by_norm.entry(norm).or_insert_with(|| raw_name.to_string());
        }
    }

    let mut ranked: Vec<(i64, u32, i64, String)> = Vec::new();
    for (norm, stats) in &stats_by_norm {
        let display = display_by_norm.get(norm).cloned().unwrap_or_default();

        if known_by_norm.contains_key(norm) {
            ranked.push((100 + i64::from(stats.occurrences), stats.occurrences, -(stats.first_index as i64), display));
            continue;
        }

        if NON_CHARACTER_WORDS.contains(norm) || SPEECH_VERBS.contains(norm) || ACTION_VERBS.contains(norm) {
            continue;
        }

        let has_direct_context = stats.speech_hits > 0 || stats.action_hits > 0 || stats.title_hits > 0;
        if !has_direct_context && stats.genitive_hits >= stats.occurrences {
            continue;
        }

        let score = score_candidate(stats);
        let repeated_with_body_context = stats.occurrences >= 2 && stats.sentence_start_hits < stats.occurrences;
        if score >= 2 && (has_direct_context || repeated_with_body_context) {
            ranked.push((score, stats.occurrences, -(stats.first_index as i64), display));
        }
    }

    ranked.sort_by(|a, b| b.cmp(a));

    let mut selected = HashMap::new();
    for (_, _, _, name) in ranked {
        if selected.len() >= max_characters {
            break;
        }
        selected.entry(name).or_insert_with(|| PLACEHOLDER_DESCRIPTION.to_string());
    }
    selected
}

fn score_candidate(stats: &CandidateStats) -> i64 {
    let mut score = i64::from(stats.occurrences.min(3));
    score += i64::from(stats.speech_hits) * 3;
    score += i64::from(stats.action_hits) * 3;
    score += i64::from(stats.title_hits) * 2;
    if stats.occurrences == stats.sentence_start_hits {
        score -= 2;
    }
    score
}

fn is_sentence_start(text: &str, index: usize) -> bool {
    let before = &text[..index];
    match before.trim_end().chars().next_back() {
        None => true,
        Some(c) => matches!(c, '.' | '!' | '?' | '\n'),
    }
}

fn has_speech_context(text: &str, name: &str, start: usize, end: usize) -> bool {
    let before_start = start.saturating_sub(42);
    let before = &text[before_start..start];
    let after_end = (end + 42).min(text.len());
    let after = &text[end..after_end];
    let before_norm = normalize(before);
    let name_norm = normalize(name);
    let preceded = before_norm
        .split_whitespace()
        .collect::<Vec<_>>()
        .windows(2)
        .any(|w| SPEECH_VERBS.contains(w[0]) && w[1] == name_norm);
    let followed = after
        .trim_start()
        .split_whitespace()
        .next()
        .is_some_and(|tok| SPEECH_VERBS.contains(&normalize(tok)));
    preceded || followed
}

fn has_action_context(text: &str, end: usize) -> bool {
    let after_end = (end + 24).min(text.len());
    let after = &text[end..after_end];
    after
        .trim_start()
        .split_whitespace()
        .next()
        .is_some_and(|tok| ACTION_VERBS.contains(&normalize(tok)))
}

fn has_title_context(text: &str, start: usize) -> bool {
    let before_start = start.saturating_sub(20);
    let before = &text[before_start..start];
    before
        .split_whitespace()
        .next_back()
        .is_some_and(|tok| TITLE_HINTS.contains(&normalize(tok)))
}

fn has_genitive_context(text: &str, start: usize) -> bool {
    let before_start = start.saturating_sub(25);
    let before = &text[before_start..start];
    before
        .split_whitespace()
        .next_back()
        .is_some_and(|tok| GENITIVE_PREPOSITIONS.contains(&normalize(tok)))
}
