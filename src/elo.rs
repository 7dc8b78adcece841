use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::config::EloSettings;

/// Elo ratings for one pipeline run.
///
/// Ratings are read lazily from `ratings_elo` (latest row per team, or the base
/// rating) and cached; every update is written back so the next run resumes from it.
#[derive(Debug, Clone)]
pub struct EloRatings {
    settings: EloSettings,
    cache: HashMap<String, f64>,
}

/// A finished fixture whose result is not yet folded into the ratings.
#[derive(Debug, Clone)]
struct PendingResult {
    fixture_id: String,
    kickoff: String,
    home_team_id: String,
    away_team_id: String,
    home_goals: i32,
    away_goals: i32,
}

impl EloRatings {
    pub fn new(settings: EloSettings) -> Self {
        Self {
            settings,
            cache: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &EloSettings {
        &self.settings
    }

    pub fn rating(&mut self, conn: &Connection, team_id: &str) -> Result<f64> {
        if let Some(r) = self.cache.get(team_id) {
            return Ok(*r);
        }
        let stored: Option<f64> = conn
            .query_row(
                "SELECT rating FROM ratings_elo WHERE team_id = ?1 ORDER BY ts_utc DESC LIMIT 1",
                params![team_id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("load elo rating for {team_id}"))?;
        let r = stored.unwrap_or(self.settings.base);
        self.cache.insert(team_id.to_string(), r);
        Ok(r)
    }

    /// Expected score of the home side, home advantage included.
    pub fn expected_home(&self, home: f64, away: f64) -> f64 {
        expected_score(home + self.settings.home_adv, away)
    }

    /// Apply one result (1 home win, 0.5 draw, 0 away win) and persist both
    /// new ratings at `ts_utc`. Returns the new (home, away) ratings.
    pub fn update_match(
        &mut self,
        conn: &Connection,
        ts_utc: &str,
        home_id: &str,
        away_id: &str,
        result: f64,
    ) -> Result<(f64, f64)> {
        let r_home = self.rating(conn, home_id)?;
        let r_away = self.rating(conn, away_id)?;
        let delta = self.settings.k * (result - self.expected_home(r_home, r_away));
        let new_home = r_home + delta;
        let new_away = r_away - delta;

        for (team_id, rating) in [(home_id, new_home), (away_id, new_away)] {
            conn.execute(
                "INSERT OR REPLACE INTO ratings_elo (ts_utc, team_id, rating) VALUES (?1, ?2, ?3)",
                params![ts_utc, team_id, rating],
            )
            .with_context(|| format!("store elo rating for {team_id}"))?;
        }
        self.cache.insert(home_id.to_string(), new_home);
        self.cache.insert(away_id.to_string(), new_away);

        info!(
            home = home_id,
            away = away_id,
            "elo {r_home:.1}->{new_home:.1}, {r_away:.1}->{new_away:.1}"
        );
        Ok((new_home, new_away))
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

pub fn expected_score(r_a: f64, r_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((r_b - r_a) / 400.0))
}

/// Score of the home side for a final result.
pub fn match_result(home_goals: i32, away_goals: i32) -> f64 {
    if home_goals > away_goals {
        1.0
    } else if home_goals < away_goals {
        0.0
    } else {
        0.5
    }
}

/// Fold every finished, not yet rated fixture into the ratings, oldest first.
/// Each fixture is applied once; returns how many were rated.
pub fn rate_finished_fixtures(conn: &mut Connection, ratings: &mut EloRatings) -> Result<usize> {
    let pending = pending_results(conn)?;
    if pending.is_empty() {
        debug!("no finished fixtures to rate");
        return Ok(0);
    }

    let tx = conn.transaction().context("begin elo transaction")?;
    let applied = (|| -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        for p in &pending {
            let result = match_result(p.home_goals, p.away_goals);
            ratings.update_match(&tx, &p.kickoff, &p.home_team_id, &p.away_team_id, result)?;
            tx.execute(
                "INSERT INTO elo_applied (fixture_id, applied_at) VALUES (?1, ?2)",
                params![p.fixture_id, now],
            )
            .with_context(|| format!("mark fixture {} rated", p.fixture_id))?;
        }
        Ok(pending.len())
    })();

    match applied.and_then(|n| tx.commit().context("commit elo transaction").map(|_| n)) {
        Ok(n) => {
            info!(fixtures = n, "elo ratings updated");
            Ok(n)
        }
        Err(err) => {
            // The cache may hold ratings that were rolled back.
            ratings.clear_cache();
            Err(err)
        }
    }
}

fn pending_results(conn: &Connection) -> Result<Vec<PendingResult>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT f.fixture_id, f.utc_kickoff, f.home_team_id, f.away_team_id,
                   f.home_goals, f.away_goals
            FROM fixtures f
            LEFT JOIN elo_applied e ON e.fixture_id = f.fixture_id
            WHERE e.fixture_id IS NULL
              AND f.status = 'FT'
              AND f.home_team_id IS NOT NULL AND f.away_team_id IS NOT NULL
              AND f.home_goals IS NOT NULL AND f.away_goals IS NOT NULL
            ORDER BY datetime(f.utc_kickoff), f.fixture_id
            "#,
        )
        .context("prepare finished fixtures query")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PendingResult {
                fixture_id: row.get(0)?,
                kickoff: row.get(1)?,
                home_team_id: row.get(2)?,
                away_team_id: row.get(3)?,
                home_goals: row.get(4)?,
                away_goals: row.get(5)?,
            })
        })
        .context("query finished fixtures")?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("read finished fixture")?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_ratings_expect_half() {
        assert!((expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-12);
        assert!(expected_score(1600.0, 1500.0) > 0.5);
    }

    #[test]
    fn result_from_goals() {
        assert_eq!(match_result(2, 1), 1.0);
        assert_eq!(match_result(1, 1), 0.5);
        assert_eq!(match_result(0, 3), 0.0);
    }
}
