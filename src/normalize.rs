//! Team-name canonicalization.
//!
//! Bookmakers and fixture providers spell the same club in many ways ("Man Utd",
//! "Manchester United FC", "Manchester Utd"). Every name that enters the alias
//! registry or the fixture matcher goes through [`canonicalize`] first, so two
//! spellings refer to the same team exactly when their canonical forms are equal.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Generic club-type words that carry no identity.
static STOP_TOKENS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["fc", "afc", "cf", "sc", "ac", "ud", "calcio", "club", "the"]
        .into_iter()
        .collect()
});

/// Exact-string corrections for abbreviations that would otherwise normalize to
/// the wrong key. Checked against the raw lowered string and again after cleanup.
static SPECIAL_CASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("man utd", "manchester united"),
        ("manchester utd", "manchester united"),
        ("manchester united fc", "manchester united"),
        ("man city", "manchester city"),
        ("manchester city fc", "manchester city"),
        ("spurs", "tottenham hotspur"),
        ("wolves", "wolverhampton wanderers"),
        ("newcastle u", "newcastle united"),
        ("west ham", "west ham united"),
        ("west ham u", "west ham united"),
        ("brighton hove albion", "brighton & hove albion"),
        ("brighton and hove albion", "brighton & hove albion"),
        ("leeds u", "leeds united"),
        ("arsenal fc", "arsenal"),
        ("chelsea fc", "chelsea"),
        ("liverpool fc", "liverpool"),
        ("everton fc", "everton"),
    ]
    .into_iter()
    .collect()
});

/// Map a free-text team name to its canonical key.
///
/// The steps run in a fixed order: strip accents, lowercase and trim, blank out
/// brackets, collapse whitespace, special-case lookup, drop everything outside
/// `[a-z0-9 ]`, collapse again, drop stop tokens, special-case lookup again.
/// Returns an empty string when nothing survives.
pub fn canonicalize(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    let lowered = strip_accents(name).to_lowercase();
    let unbracketed: String = lowered
        .trim()
        .chars()
        .map(|ch| if is_bracket(ch) { ' ' } else { ch })
        .collect();
    let mut s = collapse_whitespace(&unbracketed);

    if let Some(replacement) = SPECIAL_CASES.get(s.as_str()) {
        s = (*replacement).to_string();
    }

    let alnum: String = s
        .chars()
        .map(|ch| {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == ' ' {
                ch
            } else {
                ' '
            }
        })
        .collect();
    let cleaned = collapse_whitespace(&alnum);

    let s = cleaned
        .trim()
        .split(' ')
        .filter(|token| !token.is_empty() && !STOP_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ");

    match SPECIAL_CASES.get(s.as_str()) {
        Some(replacement) => (*replacement).to_string(),
        None => s,
    }
}

/// Decompose and drop combining marks ("Atlético" -> "Atletico").
pub fn strip_accents(raw: &str) -> String {
    raw.nfkd().filter(|ch| !is_combining_mark(*ch)).collect()
}

fn is_bracket(ch: char) -> bool {
    matches!(ch, '(' | ')' | '[' | ']' | '{' | '}')
}

// Runs of whitespace become one space; leading/trailing runs are kept as one space.
fn collapse_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{collapse_whitespace, strip_accents};

    #[test]
    fn collapse_whitespace_keeps_single_edges() {
        assert_eq!(collapse_whitespace("  a \t\n b  "), " a b ");
        assert_eq!(collapse_whitespace("ab"), "ab");
    }

    #[test]
    fn strip_accents_drops_marks_only() {
        assert_eq!(strip_accents("Atlético Málaga"), "Atletico Malaga");
        assert_eq!(strip_accents("Bayern München"), "Bayern Munchen");
        // No decomposition exists for these, so they pass through unchanged.
        assert_eq!(strip_accents("Bodø/Glimt"), "Bodø/Glimt");
    }
}
