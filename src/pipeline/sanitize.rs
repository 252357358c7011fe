//! Text sanitisation: reduce assistant output to what a standard PDF font
//! can draw.
//!
//! Answers arrive as markdown with emoji, fancy bullets and the odd
//! letter-spaced heading (`C L I M A`). The document uses the base-14
//! Helvetica fonts with WinAnsi encoding, which only covers printable ASCII
//! and the Latin-1 supplement reliably, so everything else must go before
//! layout measures a single glyph.
//!
//! ## Rule Order
//!
//! 1. Strip markdown emphasis (`**`, `*`) and heading markers (`#`–`######`
//!    followed by whitespace)
//! 2. Normalise bullet and separator glyphs to `-`
//! 3. Re-join letter-spaced uppercase headings
//! 4. Drop characters outside printable ASCII + Latin-1 (whitespace controls
//!    become spaces first so words never fuse)
//! 5. Collapse whitespace runs to one space and trim
//!
//! A single pass is not always a fixpoint: removing an emoji can leave
//! `# ` or `A B C` behind. [`sanitize`] therefore repeats the pass until the
//! text stops changing, which makes it idempotent. After the first pass the
//! text only contains safe characters and every later pass can only delete,
//! so the loop terminates.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sanitise arbitrary text into printable ASCII + Latin-1 on a single line.
///
/// Total: never panics, returns an empty string for empty or fully
/// unprintable input.
pub fn sanitize(input: &str) -> String {
    let mut current = sanitize_pass(input);
    loop {
        let next = sanitize_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// `true` when `c` can be drawn by the document fonts.
pub fn is_safe_char(c: char) -> bool {
    matches!(c, '\u{20}'..='\u{7E}' | '\u{A0}'..='\u{FF}')
}

fn sanitize_pass(input: &str) -> String {
    let s = strip_markdown(input);
    let s = normalise_bullets(&s);
    let s = rejoin_spaced_capitals(&s);
    let s = drop_unsafe_chars(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Strip markdown emphasis and heading markers ─────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"#{1,6}\s").unwrap());

fn strip_markdown(input: &str) -> String {
    let s = input.replace('*', "");
    RE_HEADING.replace_all(&s, "").into_owned()
}

// ── Rule 2: Normalise bullets ───────────────────────────────────────────────

const BULLETS: [char; 10] = [
    '•', '‣', '◦', '⁃', '∙', '●', '▪', '▫', '\u{00B7}', '|',
];

fn normalise_bullets(input: &str) -> String {
    input.replace(BULLETS, "-")
}

// ── Rule 3: Re-join letter-spaced capitals ──────────────────────────────────
//
// Upstream formatting sometimes spaces out heading letters for emphasis,
// which breaks keyword matching downstream (`C L I M A` is not `CLIMA`).
// Three or more standalone uppercase letters separated only by whitespace
// are glued back together. Accented Latin-1 capitals count as letters.

static RE_SPACED_CAPS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-ZÀ-ÖØ-Þ](?:\s+[A-ZÀ-ÖØ-Þ]){2,}\b").unwrap()
});

fn rejoin_spaced_capitals(input: &str) -> String {
    RE_SPACED_CAPS
        .replace_all(input, |caps: &regex::Captures<'_>| {
            caps[0]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
        })
        .into_owned()
}

// ── Rule 4: Drop characters the fonts cannot draw ───────────────────────────

fn drop_unsafe_chars(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if is_safe_char(c) {
                Some(c)
            } else {
                None
            }
        })
        .collect()
}

// ── Rule 5: Collapse whitespace ─────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ───────────────────────────────────────────────────────────────────
