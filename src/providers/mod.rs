//! Third-party data providers.
//!
//! Each provider parses its payload into typed structs and maps them onto the
//! internal records in [`crate::db`]; nothing past this boundary sees provider JSON.

pub mod api_football;
pub mod football_data;
pub mod odds_api;
pub mod understat;

use anyhow::Result;
use rusqlite::Connection;

use crate::aliases::register_alias;
use crate::db::{self, FixtureRecord};

/// A provider-side team name seen while ingesting fixtures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenTeam {
    pub team_id: String,
    pub names: Vec<String>,
}

/// Parsed fixtures plus the team names they carried.
#[derive(Debug, Clone, Default)]
pub struct FixtureBatch {
    pub fixtures: Vec<FixtureRecord>,
    pub teams: Vec<SeenTeam>,
}

/// Persist a batch: fixtures are upserted and every provider team name is
/// registered as an alias of its team id. Returns the fixtures written.
pub fn store_fixture_batch(conn: &mut Connection, batch: &FixtureBatch) -> Result<usize> {
    let written = db::upsert_fixtures(conn, &batch.fixtures)?;
    for team in &batch.teams {
        register_alias(&*conn, &team.team_id, &team.names)?;
    }
    Ok(written)
}

fn push_seen(teams: &mut Vec<SeenTeam>, team_id: &str, names: &[Option<&str>]) {
    let names = names
        .iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if names.is_empty() {
        return;
    }
    match teams.iter_mut().find(|t| t.team_id == team_id) {
        Some(existing) => {
            for name in names {
                if !existing.names.contains(&name) {
                    existing.names.push(name);
                }
            }
        }
        None => teams.push(SeenTeam {
            team_id: team_id.to_string(),
            names,
        }),
    }
}
