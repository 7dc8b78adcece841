//! Match xG scraped from Understat match pages.
//!
//! Understat has no public API. Each match page embeds its data as
//! `JSON.parse('...')` calls whose string literals use `\xNN` escapes; the shots
//! object is the one carrying `h` and `a` arrays.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::upsert_xg;
use crate::http_client::get_text;

const MATCH_URL: &str = "https://understat.com/match";
const PARSE_OPEN: &str = "JSON.parse('";

#[derive(Debug, Deserialize)]
struct ShotsBySide {
    h: Vec<Shot>,
    a: Vec<Shot>,
}

#[derive(Debug, Deserialize)]
struct Shot {
    #[serde(default, rename = "xG")]
    xg: Option<Value>,
}

impl Shot {
    // Understat ships xG as a string; accept plain numbers too.
    fn xg(&self) -> f64 {
        match &self.xg {
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchXg {
    pub home: f64,
    pub away: f64,
}

/// Every string literal passed to `JSON.parse('...')` in the page, undecoded.
pub fn embedded_json_literals(html: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = html;
    while let Some(start) = rest.find(PARSE_OPEN) {
        let body = &rest[start + PARSE_OPEN.len()..];
        let Some(end) = closing_quote(body) else {
            break;
        };
        out.push(&body[..end]);
        rest = &body[end..];
    }
    out
}

fn closing_quote(body: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, ch) in body.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '\'' => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Decode the JavaScript escapes Understat uses inside its string literals.
/// Unknown escapes keep the escaped character.
pub fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        let Some(kind) = chars.next() else {
            out.push('\\');
            break;
        };
        match kind {
            'x' => push_hex(&mut out, &mut chars, 2, "\\x"),
            'u' => push_hex(&mut out, &mut chars, 4, "\\u"),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            other => out.push(other),
        }
    }
    out
}

fn push_hex(
    out: &mut String,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    width: usize,
    prefix: &str,
) {
    let digits: String = chars.by_ref().take(width).collect();
    let decoded = (digits.len() == width)
        .then(|| u32::from_str_radix(&digits, 16).ok())
        .flatten()
        .and_then(char::from_u32);
    match decoded {
        Some(c) => out.push(c),
        None => {
            out.push_str(prefix);
            out.push_str(&digits);
        }
    }
}

/// Sum shot xG per side from a match page. `None` when the page has no shots data.
pub fn parse_match_xg(html: &str) -> Option<MatchXg> {
    embedded_json_literals(html).into_iter().find_map(|literal| {
        let decoded = decode_escapes(literal);
        let shots: ShotsBySide = serde_json::from_str(&decoded).ok()?;
        Some(MatchXg {
            home: shots.h.iter().map(Shot::xg).sum(),
            away: shots.a.iter().map(Shot::xg).sum(),
        })
    })
}

pub fn fetch_match_xg(client: &Client, cfg: &AppConfig, understat_id: &str) -> Result<Option<MatchXg>> {
    let url = format!("{MATCH_URL}/{}", understat_id.trim());
    let html = get_text(client, &cfg.retry, &url, &[], &[]).context("understat request failed")?;
    Ok(parse_match_xg(&html))
}

/// Fetch xG for an Understat match and store it against `fixture_id`.
/// Returns rows written (0 when the page carried no xG).
pub fn upsert_match_xg(
    conn: &Connection,
    client: &Client,
    cfg: &AppConfig,
    fixture_id: &str,
    understat_id: &str,
) -> Result<usize> {
    let Some(xg) = fetch_match_xg(client, cfg, understat_id)? else {
        warn!(understat_id, "no xG found on understat match page");
        return Ok(0);
    };
    upsert_xg(conn, fixture_id, xg.home, xg.away)?;
    info!(
        fixture_id,
        understat_id,
        home_xg = xg.home,
        away_xg = xg.away,
        "xg stored"
    );
    Ok(1)
}
