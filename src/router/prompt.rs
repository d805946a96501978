//! Renders per-mode system prompts from a bible projection.
//!
//! The fragment under translation never lives in these templates — it
//! travels as the user message in the model call, keeping instructions and
//! content separate so adherence stays high across providers.

use std::collections::BTreeMap;

const VOICE_DEFAULT: &str = "narrador en tercera persona, tiempo pasado";
const GLOSSARY_EMPTY: &str = "Sin glosario todavia - extrae terminos relevantes que encuentres.";
const DECISIONS_EMPTY: &str = "Ninguna todavia - este es el primer fragmento.";
const CHARACTERS_EMPTY: &str = "Sin perfiles definidos todavia - infiere el tono de cada personaje del texto.";
const LAST_SCENE_EMPTY: &str = "Inicio del libro - no hay contexto previo.";

/// Bible fields projected into a prompt; produced by
/// [`crate::context::BibleCompressor::compress`].
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    /// Narrative voice; falls back to [`VOICE_DEFAULT`] when empty.
    pub voice: &'a str,
    /// Style/terminology decisions to respect verbatim.
    pub decisions: &'a [String],
    /// Fixed source-to-target term mapping.
    pub glossary: &'a BTreeMap<String, String>,
    /// Character voice/personality notes.
    pub characters: &'a BTreeMap<String, String>,
    /// Digest of what happened immediately before this fragment.
    pub last_scene: &'a str,
}

/// Builds the system prompt for a `translate` call.
#[must_use]
pub fn build_translate_prompt(source_lang: &str, target_lang: &str, ctx: &PromptContext) -> String {
    format!(
        "Eres un traductor y editor literario senior. Debes entregar una traduccion \
         natural, fiel y consistente, preservando la voz del autor.\n\n\
         --- CONTEXTO ---\n\
         - Idioma origen: {source_lang}\n\
         - Idioma destino: {target_lang}\n\
         - Voz narrativa general: {voice}\n\n\
         --- BIBLIA DEL LIBRO (REGLAS OBLIGATORIAS) ---\n\
         GLOSARIO (no alterar terminos fijados):\n{glossary}\n\
         DECISIONES DE ESTILO:\n{decisions}\n\
         PERSONAJES (tono de voz y personalidad):\n{characters}\n\
         CONTINUIDAD (escena previa):\n{last_scene}\n\n\
         --- RESTRICCIONES CRITICAS ---\n\
         - No omitas, resumas ni agregues contenido narrativo.\n\
         - Manten intencion, matiz y subtexto del original.\n\
         - Conserva estructura de parrafos y saltos de linea.\n\n\
         --- FORMATO DE SALIDA (ESTRICTO) ---\n\
         Responde UNICAMENTE con un objeto JSON: \
         {{\"translation\": \"...\", \"confidence\": 0.0, \"notes\": \"...\"}}.\n\
         confidence >= 0.90 traduccion directa; 0.75-0.89 retos de estilo resueltos; \
         < 0.75 ambiguedad seria persistente.",
        voice = non_empty(ctx.voice, VOICE_DEFAULT),
        glossary = format_glossary(ctx.glossary),
        decisions = format_decisions(ctx.decisions),
        characters = format_characters(ctx.characters),
        last_scene = non_empty(ctx.last_scene, LAST_SCENE_EMPTY),
    )
}

/// Builds the system prompt for a `fix` call: the original and the
/// existing draft both travel as the user message, tagged separately.
#[must_use]
pub fn build_fix_prompt(source_lang: &str, target_lang: &str, ctx: &PromptContext) -> String {
    format!(
        "Eres un editor literario bilingue experto. Tu tarea es CORREGIR una traduccion \
         existente usando el original como fuente de verdad. No traduzcas desde cero si \
         el borrador ya funciona.\n\n\
         --- CONTEXTO ---\n\
         - Idioma original: {source_lang}\n\
         - Idioma de correccion: {target_lang}\n\
         - Voz narrativa general: {voice}\n\n\
         --- BIBLIA DEL LIBRO (REGLAS OBLIGATORIAS) ---\n\
         GLOSARIO (no alterar):\n{glossary}\n\
         DECISIONES DE ESTILO:\n{decisions}\n\
         PERSONAJES:\n{characters}\n\
         CONTINUIDAD:\n{last_scene}\n\n\
         --- OBJETIVO ---\n\
         Corrige gramatica, sintaxis, puntuacion, cohesion y ritmo. Manten el sentido \
         principal y la estructura de parrafos.\n\n\
         --- FORMATO DE SALIDA (ESTRICTO) ---\n\
         Responde UNICAMENTE con: \
         {{\"translation\": \"...\", \"confidence\": 0.0, \"notes\": \"...\"}}.",
        voice = non_empty(ctx.voice, VOICE_DEFAULT),
        glossary = format_glossary(ctx.glossary),
        decisions = format_decisions(ctx.decisions),
        characters = format_characters(ctx.characters),
        last_scene = non_empty(ctx.last_scene, LAST_SCENE_EMPTY),
    )
}

/// Builds the system prompt for a `polish` call: only the draft is tagged
/// in the user message, no source text is available to compare against.
#[must_use]
pub fn build_polish_prompt(target_lang: &str, ctx: &PromptContext) -> String {
    format!(
        "Eres un editor de estilo literario. Mejora el texto para hacerlo natural, \
         legible y con buena fluidez, sin inventar informacion nueva.\n\n\
         --- CONTEXTO ---\n\
         - Idioma: {target_lang}\n\
         - Voz narrativa general: {voice}\n\n\
         --- BIBLIA DEL LIBRO (REGLAS OBLIGATORIAS) ---\n\
         GLOSARIO (no alterar):\n{glossary}\n\
         DECISIONES DE ESTILO:\n{decisions}\n\
         PERSONAJES:\n{characters}\n\
         CONTINUIDAD:\n{last_scene}\n\n\
         --- FORMATO DE SALIDA (ESTRICTO) ---\n\
         Responde UNICAMENTE con: \
         {{\"translation\": \"...\", \"confidence\": 0.0, \"notes\": \"...\"}}.",
        voice = non_empty(ctx.voice, VOICE_DEFAULT),
        glossary = format_glossary(ctx.glossary),
        decisions = format_decisions(ctx.decisions),
        characters = format_characters(ctx.characters),
        last_scene = non_empty(ctx.last_scene, LAST_SCENE_EMPTY),
    )
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

fn format_glossary(glossary: &BTreeMap<String, String>) -> String {
    if glossary.is_empty() {
        return GLOSSARY_EMPTY.to_string();
    }
    glossary.iter().map(|(src, tgt)| format!("  - {src} -> {tgt}")).collect::<Vec<_>>().join("\n")
}

fn format_decisions(decisions: &[String]) -> String {
    if decisions.is_empty() {
        return DECISIONS_EMPTY.to_string();
    }
    decisions.iter().map(|d| format!("  - {d}")).collect::<Vec<_>>().join("\n")
}

fn format_characters(characters: &BTreeMap<String, String>) -> String {
    if characters.is_empty() {
        return CHARACTERS_EMPTY.to_string();
    }
    characters
        .iter()
        .map(|(name, description)| format!("  - {name}: {description}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_prompt_uses_fallbacks_when_empty() {
        let glossary = BTreeMap::new();
        let characters = BTreeMap::new();
        let ctx = PromptContext {
            voice: "",
            decisions: &[],
            glossary: &glossary,
            characters: &characters,
            last_scene: "",
        };
        let prompt = build_translate_prompt("ja", "en", &ctx);
        assert!(prompt.contains(VOICE_DEFAULT));
        assert!(prompt.contains(GLOSSARY_EMPTY));
        assert!(prompt.contains(LAST_SCENE_EMPTY));
    }

    #[test]
    fn translate_prompt_includes_glossary_entries() {
        let mut glossary = BTreeMap::new();
        glossary.insert("Void".to_string(), "Void".to_string());
        let characters = BTreeMap::new();
        let ctx = PromptContext {
            voice: "tercera persona",
            decisions: &[],
            glossary: &glossary,
            characters: &characters,
            last_scene: "",
        };
        let prompt = build_translate_prompt("ja", "en", &ctx);
        assert!(prompt.contains("Void -> Void"));
    }

    #[test]
    fn fix_prompt_mentions_correction_not_translation_from_scratch() {
        let glossary = BTreeMap::new();
        let characters = BTreeMap::new();
        let ctx = PromptContext {
            voice: "",
            decisions: &[],
            glossary: &glossary,
            characters: &characters,
            last_scene: "",
        };
        let prompt = build_fix_prompt("ja", "en", &ctx);
        assert!(prompt.to_lowercase().contains("corregir"));
    }

    #[test]
    fn polish_prompt_has_no_source_language_section() {
        let glossary = BTreeMap::new();
        let characters = BTreeMap::new();
        let ctx = PromptContext {
            voice: "",
            decisions: &[],
            glossary: &glossary,
            characters: &characters,
            last_scene: "",
        };
        let prompt = build_polish_prompt("en", &ctx);
        assert!(!prompt.contains("Idioma origen"));
    }
}
