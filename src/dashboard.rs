use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};

use crate::kickoff::iso_date;

/// One upcoming fixture with its model probabilities, if computed.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardRow {
    pub fixture_id: String,
    pub league: String,
    pub season: String,
    pub utc_kickoff: String,
    pub home: String,
    pub away: String,
    pub p_home: Option<f64>,
    pub p_draw: Option<f64>,
    pub p_away: Option<f64>,
    pub model: Option<String>,
}

/// Fixtures kicking off on or after `today`, soonest first. Team display names
/// fall back to the team id.
pub fn load_dashboard_rows(conn: &Connection, today: NaiveDate) -> Result<Vec<DashboardRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT f.fixture_id, f.league, f.season, f.utc_kickoff,
                   COALESCE(th.name, f.home_team_id, '?'),
                   COALESCE(ta.name, f.away_team_id, '?'),
                   p.p_home, p.p_draw, p.p_away, p.model
            FROM fixtures f
            LEFT JOIN probs p ON p.fixture_id = f.fixture_id
            LEFT JOIN teams th ON th.team_id = f.home_team_id
            LEFT JOIN teams ta ON ta.team_id = f.away_team_id
            WHERE date(f.utc_kickoff) >= date(?1)
            ORDER BY datetime(f.utc_kickoff), f.fixture_id
            "#,
        )
        .context("prepare dashboard query")?;
    let rows = stmt
        .query_map(params![iso_date(today)], |row| {
            Ok(DashboardRow {
                fixture_id: row.get(0)?,
                league: row.get(1)?,
                season: row.get(2)?,
                utc_kickoff: row.get(3)?,
                home: row.get(4)?,
                away: row.get(5)?,
                p_home: row.get(6)?,
                p_draw: row.get(7)?,
                p_away: row.get(8)?,
                model: row.get(9)?,
            })
        })
        .context("query dashboard rows")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("read dashboard row")?);
    }
    Ok(out)
}

pub fn format_probability(p: Option<f64>) -> String {
    match p {
        Some(v) if v.is_finite() => format!("{v:.3}"),
        _ => "-".to_string(),
    }
}

/// Plain-text table of the rows; a hint line when there is nothing to show.
pub fn render_plain(rows: &[DashboardRow]) -> String {
    if rows.is_empty() {
        return "No upcoming fixtures yet. Run `footy run-daily --init --days 2 --leagues EPL` first.\n"
            .to_string();
    }

    let home_w = rows.iter().map(|r| r.home.chars().count()).max().unwrap_or(4).max(4);
    let away_w = rows.iter().map(|r| r.away.chars().count()).max().unwrap_or(4).max(4);

    let mut out = String::new();
    out.push_str("All times UTC. Probabilities from Elo (Davidson).\n");
    out.push_str(&format!(
        "{:<10} {:<20} {:<home_w$} {:<away_w$} {:>6} {:>6} {:>6}\n",
        "league", "kickoff", "home", "away", "1", "X", "2"
    ));
    for r in rows {
        out.push_str(&format!(
            "{:<10} {:<20} {:<home_w$} {:<away_w$} {:>6} {:>6} {:>6}\n",
            r.league,
            r.utc_kickoff,
            r.home,
            r.away,
            format_probability(r.p_home),
            format_probability(r.p_draw),
            format_probability(r.p_away),
        ));
    }
    out
}
