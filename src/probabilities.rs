use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::elo::EloRatings;

pub const MODEL_NAME: &str = "elo-davidson";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreeWay {
    pub p_home: f64,
    pub p_draw: f64,
    pub p_away: f64,
}

/// Davidson three-way probabilities from the Elo difference.
///
/// With `s = 10^((home + home_adv - away) / 400)` the outcomes are weighted
/// `s`, `2 nu sqrt(s)` and `1`, so the three always sum to one.
pub fn elo_3way(home_elo: f64, away_elo: f64, home_adv: f64, nu: f64) -> ThreeWay {
    let diff = (home_elo + home_adv) - away_elo;
    let s = 10.0_f64.powf(diff / 400.0);
    let draw_weight = 2.0 * nu * s.sqrt();
    let z = s + 1.0 + draw_weight;
    ThreeWay {
        p_home: s / z,
        p_draw: draw_weight / z,
        p_away: 1.0 / z,
    }
}

/// Write probabilities for upcoming (`NS`/`TBD`) fixtures that have none yet.
/// Fixtures missing a team id are skipped. Returns rows written.
pub fn compute_probs_for_upcoming(conn: &mut Connection, ratings: &mut EloRatings) -> Result<usize> {
    let pending = {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT f.fixture_id, f.home_team_id, f.away_team_id
                FROM fixtures f
                LEFT JOIN probs p ON p.fixture_id = f.fixture_id
                WHERE p.fixture_id IS NULL
                  AND f.status IN ('NS', 'TBD')
                ORDER BY f.utc_kickoff
                "#,
            )
            .context("prepare upcoming fixtures query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .context("query upcoming fixtures")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("read upcoming fixture")?);
        }
        out
    };
    if pending.is_empty() {
        info!("no new fixtures need probabilities");
        return Ok(0);
    }

    let (home_adv, nu) = (ratings.settings().home_adv, ratings.settings().draw_nu);
    let mut inserts = Vec::with_capacity(pending.len());
    for (fixture_id, home, away) in pending {
        let (Some(home), Some(away)) = (home, away) else {
            debug!(fixture_id, "skipping fixture without team ids");
            continue;
        };
        let r_home = ratings.rating(conn, &home)?;
        let r_away = ratings.rating(conn, &away)?;
        inserts.push((fixture_id, elo_3way(r_home, r_away, home_adv, nu)));
    }

    let ts = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin probs transaction")?;
    for (fixture_id, p) in &inserts {
        tx.execute(
            r#"
            INSERT OR REPLACE INTO probs (fixture_id, p_home, p_draw, p_away, model, ts_utc)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![fixture_id, p.p_home, p.p_draw, p.p_away, MODEL_NAME, ts],
        )
        .with_context(|| format!("store probabilities for {fixture_id}"))?;
    }
    tx.commit().context("commit probs transaction")?;

    info!(fixtures = inserts.len(), "probabilities written");
    Ok(inserts.len())
}
