//! Extractive summary of the assistant's itinerary answer.
//!
//! The assistant is prompted to answer with fixed section headers
//! ("CLIMA ACTUAL", "ALOJAMIENTO", "ESTIMACIÓN DE COSTOS", ...). The summary
//! picks the sentence that follows each known header, in a fixed topic
//! order, and falls back to the opening sentences when none is present.
//!
//! The strategy lives behind [`Extractor`] so the assembler (and tests) can
//! choose between the summary, the full sanitised answer, or anything else.

use crate::document::{Section, TextBlockSection};
use crate::pipeline::sanitize::sanitize;
use once_cell::sync::Lazy;
use regex::Regex;

/// First line of every summary.
pub const SUMMARY_HEADER: &str = "Resumen del itinerario recomendado por Alex:";

/// Closing sentence of the fallback summary.
pub const FALLBACK_BOILERPLATE: &str = "Este itinerario incluye recomendaciones personalizadas \
de alojamiento, comida, lugares para visitar y consejos locales.";

/// Turns one answer into document sections.
pub trait Extractor: Send + Sync {
    fn extract(&self, text: &str) -> Vec<Section>;
}

/// Renders the keyword summary produced by [`summarize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryExtractor;

impl Extractor for SummaryExtractor {
    fn extract(&self, text: &str) -> Vec<Section> {
        vec![Section::TextBlock(TextBlockSection::new(summarize(text)))]
    }
}

/// Renders the whole answer, sanitised.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullTextExtractor;

impl Extractor for FullTextExtractor {
    fn extract(&self, text: &str) -> Vec<Section> {
        vec![Section::TextBlock(TextBlockSection::new(sanitize(text)))]
    }
}

struct Topic {
    keywords: &'static [&'static str],
    pattern: Regex,
}

impl Topic {
    fn new(keywords: &'static [&'static str], headers: &[&str]) -> Self {
        let alternation = headers
            .iter()
            .map(|h| regex::escape(h))
            .collect::<Vec<_>>()
            .join("|");
        Self {
            keywords,
            pattern: Regex::new(&format!(r"(?i)(?:{alternation})[^.!?]*")).unwrap(),
        }
    }

    fn bullet(&self, text: &str, lowered: &str) -> Option<String> {
        if !self.keywords.iter().any(|k| lowered.contains(k)) {
            return None;
        }
        let captured = self.pattern.find(text)?.as_str().trim();
        Some(format!("- {captured}"))
    }
}

// Longer headers come first so "CLIMA ACTUAL" wins over "CLIMA".
static TOPICS: Lazy<[Topic; 6]> = Lazy::new(|| {
    [
        Topic::new(
            &["clima", "temperatura"],
            &["CLIMA ACTUAL", "CLIMA", "TEMPERATURA"],
        ),
        Topic::new(&["alojamiento", "hotel"], &["ALOJAMIENTO", "HOTEL"]),
        Topic::new(&["comida", "restaurante"], &["COMIDA", "RESTAURANTES"]),
        Topic::new(
            &["lugares", "atracciones"],
            &["LUGARES IMPERDIBLES", "ATRACCIONES"],
        ),
        Topic::new(&["consejos", "tips"], &["CONSEJOS LOCALES", "TIPS"]),
        Topic::new(
            &["costos", "estimación"],
            &["ESTIMACIÓN DE COSTOS", "COSTOS"],
        ),
    ]
});

static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());

/// Summarise an itinerary answer.
///
/// The result always starts with [`SUMMARY_HEADER`] and a blank line, then
/// either one `- ` bullet line per topic found (climate, lodging, food,
/// attractions, local tips, costs, always in that order) or, when no topic
/// matched, the first three sentences followed by [`FALLBACK_BOILERPLATE`].
pub fn summarize(raw_answer: &str) -> String {
    let text = sanitize(raw_answer);
    let lowered = text.to_lowercase();

    let bullets: Vec<String> = TOPICS
        .iter()
        .filter_map(|topic| topic.bullet(&text, &lowered))
        .collect();

    let mut summary = format!("{SUMMARY_HEADER}\n\n");
    if bullets.is_empty() {
        summary.push_str(&first_sentences(&text, 3));
        summary.push_str("...\n\n");
        summary.push_str(FALLBACK_BOILERPLATE);
    } else {
        summary.push_str(&bullets.join("\n"));
    }
    summary
}

fn first_sentences(text: &str, count: usize) -> String {
    RE_SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(count)
        .collect::<Vec<_>>()
        .join(". ")
}
