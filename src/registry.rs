//! Storage seams for the matching subsystem.
//!
//! The alias accessor and fixture matcher only talk to these two traits. The
//! pipeline backs both with the SQLite connection; the `teams.alias` column holds
//! each team's canonical aliases as a sorted JSON array.

use std::collections::BTreeSet;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::kickoff::{parse_kickoff, sqlite_datetime};

/// A stored fixture as seen by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureCandidate {
    pub fixture_id: String,
    pub league: String,
    pub kickoff: DateTime<Utc>,
    pub home_team_id: Option<String>,
    pub away_team_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamAliases {
    pub team_id: String,
    pub aliases: BTreeSet<String>,
}

pub trait TeamRegistry {
    /// `None` when the team has no record at all.
    fn team_aliases(&self, team_id: &str) -> Result<Option<BTreeSet<String>>>;

    /// Replace the alias set, creating the team record if needed.
    fn upsert_team_aliases(&self, team_id: &str, aliases: &BTreeSet<String>) -> Result<()>;

    /// Alias sets for the given ids, in registry order. Unknown ids are skipped.
    fn aliases_for_teams(&self, team_ids: &[String]) -> Result<Vec<TeamAliases>>;
}

pub trait FixtureRegistry {
    /// Fixtures of `league` whose kickoff lies in `[from, to]`, earliest first.
    fn fixtures_in_window(
        &self,
        league: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FixtureCandidate>>;

    /// Every team id that has played home or away in `league`.
    fn league_team_ids(&self, league: &str) -> Result<Vec<String>>;
}

impl TeamRegistry for Connection {
    fn team_aliases(&self, team_id: &str) -> Result<Option<BTreeSet<String>>> {
        let raw = self
            .query_row(
                "SELECT alias FROM teams WHERE team_id = ?1",
                params![team_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .with_context(|| format!("query aliases for {team_id}"))?;
        match raw {
            None => Ok(None),
            Some(alias_json) => decode_aliases(team_id, alias_json.as_deref()).map(Some),
        }
    }

    fn upsert_team_aliases(&self, team_id: &str, aliases: &BTreeSet<String>) -> Result<()> {
        let alias_json = serde_json::to_string(aliases).context("serialize aliases")?;
        self.execute(
            r#"
            INSERT INTO teams (team_id, name, country, alias) VALUES (?1, NULL, NULL, ?2)
            ON CONFLICT(team_id) DO UPDATE SET alias = excluded.alias
            "#,
            params![team_id, alias_json],
        )
        .with_context(|| format!("upsert aliases for {team_id}"))?;
        Ok(())
    }

    fn aliases_for_teams(&self, team_ids: &[String]) -> Result<Vec<TeamAliases>> {
        if team_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; team_ids.len()].join(",");
        let sql = format!(
            "SELECT team_id, alias FROM teams WHERE team_id IN ({placeholders}) ORDER BY rowid"
        );
        let mut stmt = self.prepare(&sql).context("prepare team alias query")?;
        let rows = stmt
            .query_map(params_from_iter(team_ids.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })
            .context("query team aliases")?;

        let mut out = Vec::new();
        for row in rows {
            let (team_id, alias_json) = row.context("decode team alias row")?;
            let aliases = decode_aliases(&team_id, alias_json.as_deref())?;
            out.push(TeamAliases { team_id, aliases });
        }
        Ok(out)
    }
}

impl FixtureRegistry for Connection {
    fn fixtures_in_window(
        &self,
        league: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FixtureCandidate>> {
        let mut stmt = self
            .prepare(
                r#"
                SELECT fixture_id, league, utc_kickoff, home_team_id, away_team_id
                FROM fixtures
                WHERE league = ?1
                  AND datetime(utc_kickoff) BETWEEN datetime(?2) AND datetime(?3)
                ORDER BY datetime(utc_kickoff) ASC, fixture_id ASC
                "#,
            )
            .context("prepare fixture window query")?;
        let rows = stmt
            .query_map(
                params![league, sqlite_datetime(&from), sqlite_datetime(&to)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .context("query fixtures in window")?;

        let mut out = Vec::new();
        for row in rows {
            let (fixture_id, league, raw_kickoff, home_team_id, away_team_id) =
                row.context("decode fixture row")?;
            let kickoff = parse_kickoff(&raw_kickoff).ok_or_else(|| {
                anyhow!("fixture {fixture_id} has unparsable kickoff {raw_kickoff:?}")
            })?;
            out.push(FixtureCandidate {
                fixture_id,
                league,
                kickoff,
                home_team_id,
                away_team_id,
            });
        }
        Ok(out)
    }

    fn league_team_ids(&self, league: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .prepare(
                r#"
                SELECT home_team_id FROM fixtures
                WHERE league = ?1 AND home_team_id IS NOT NULL AND home_team_id <> ''
                UNION
                SELECT away_team_id FROM fixtures
                WHERE league = ?1 AND away_team_id IS NOT NULL AND away_team_id <> ''
                "#,
            )
            .context("prepare league team query")?;
        let rows = stmt
            .query_map(params![league], |row| row.get::<_, String>(0))
            .context("query league teams")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode league team row")?);
        }
        Ok(out)
    }
}

fn decode_aliases(team_id: &str, raw: Option<&str>) -> Result<BTreeSet<String>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(BTreeSet::new());
    };
    serde_json::from_str::<BTreeSet<String>>(raw)
        .with_context(|| format!("malformed alias json for team {team_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[test]
    fn missing_team_is_none_and_null_alias_is_empty() {
        let conn = open_in_memory().expect("db");
        assert!(conn.team_aliases("fd_1").expect("query").is_none());
        conn.execute("INSERT INTO teams(team_id, alias) VALUES ('fd_1', '')", [])
            .expect("seed");
        assert_eq!(conn.team_aliases("fd_1").expect("query"), Some(BTreeSet::new()));
    }

    #[test]
    fn malformed_alias_json_is_a_fault() {
        let conn = open_in_memory().expect("db");
        conn.execute("INSERT INTO teams(team_id, alias) VALUES ('fd_1', '{oops')", [])
            .expect("seed");
        assert!(conn.team_aliases("fd_1").is_err());
    }

    #[test]
    fn aliases_for_teams_follows_insertion_order() {
        let conn = open_in_memory().expect("db");
        for id in ["fd_9", "fd_1", "fd_5"] {
            conn.upsert_team_aliases(id, &BTreeSet::from([id.to_string()]))
                .expect("upsert");
        }
        let ids = vec!["fd_1".to_string(), "fd_5".to_string(), "fd_9".to_string()];
        let got = conn.aliases_for_teams(&ids).expect("query");
        let order = got.iter().map(|t| t.team_id.as_str()).collect::<Vec<_>>();
        assert_eq!(order, vec!["fd_9", "fd_1", "fd_5"]);
    }
}
