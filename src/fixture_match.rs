//! Match an odds quote (two team names and an approximate kickoff) to a stored
//! fixture.
//!
//! Business misses (empty names, unknown teams, nothing in the time window, no
//! pair match) are `Ok(None)`; only storage faults come back as `Err`.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::kickoff::parse_kickoff;
use crate::normalize::canonicalize;
use crate::registry::{FixtureCandidate, FixtureRegistry, TeamRegistry};

pub const DEFAULT_TOLERANCE_MINUTES: i64 = 15;

/// Fixtures of `league` within `tolerance_minutes` either side of `center`.
/// A tolerance too large to represent as a time window finds nothing.
pub fn find_fixtures_in_window<R>(
    registry: &R,
    league: &str,
    center: DateTime<Utc>,
    tolerance_minutes: i64,
) -> Result<Vec<FixtureCandidate>>
where
    R: FixtureRegistry + ?Sized,
{
    let window = tolerance_minutes
        .checked_abs()
        .and_then(Duration::try_minutes)
        .and_then(|tol| Some((center.checked_sub_signed(tol)?, center.checked_add_signed(tol)?)));
    let Some((from, to)) = window else {
        debug!(league, tolerance_minutes, "tolerance out of range, empty window");
        return Ok(Vec::new());
    };
    registry.fixtures_in_window(league, from, to)
}

/// Resolve a free-text name to a team id among the teams that have played in
/// `league`.
///
/// An exact alias hit wins. Otherwise the first team (in registry order) with an
/// alias that contains the name, or is contained by it, is taken.
pub fn find_team_by_name<R>(registry: &R, league: &str, raw_name: &str) -> Result<Option<String>>
where
    R: TeamRegistry + FixtureRegistry + ?Sized,
{
    let name = canonicalize(raw_name);
    if name.is_empty() {
        return Ok(None);
    }

    let team_ids = registry.league_team_ids(league)?;
    if team_ids.is_empty() {
        return Ok(None);
    }
    let candidates = registry.aliases_for_teams(&team_ids)?;

    if let Some(team) = candidates.iter().find(|t| t.aliases.contains(&name)) {
        return Ok(Some(team.team_id.clone()));
    }

    let mut partial = candidates.iter().filter(|t| {
        t.aliases
            .iter()
            .filter(|alias| !alias.is_empty())
            .any(|alias| alias.contains(name.as_str()) || name.contains(alias.as_str()))
    });
    let Some(first) = partial.next() else {
        return Ok(None);
    };
    let others = partial.map(|t| t.team_id.as_str()).collect::<Vec<_>>();
    if !others.is_empty() {
        warn!(
            league,
            name = %name,
            chosen = %first.team_id,
            ?others,
            "ambiguous partial alias match"
        );
    }
    Ok(Some(first.team_id.clone()))
}

/// Find the stored fixture an odds event refers to.
///
/// `utc_kickoff` is the provider's ISO-8601 commence time. Sides are tried in the
/// given order first and swapped second.
pub fn match_fixture<R>(
    registry: &R,
    league: &str,
    utc_kickoff: &str,
    home_name: &str,
    away_name: &str,
    tolerance_minutes: i64,
) -> Result<Option<String>>
where
    R: TeamRegistry + FixtureRegistry + ?Sized,
{
    let Some(center) = parse_kickoff(utc_kickoff) else {
        debug!(league, utc_kickoff, "unparsable kickoff, no match");
        return Ok(None);
    };

    let candidates = find_fixtures_in_window(registry, league, center, tolerance_minutes)?;
    if candidates.is_empty() {
        debug!(league, utc_kickoff, "no fixtures in window");
        return Ok(None);
    }

    let Some(home_id) = find_team_by_name(registry, league, home_name)? else {
        debug!(league, home_name, "home team not resolved");
        return Ok(None);
    };
    let Some(away_id) = find_team_by_name(registry, league, away_name)? else {
        debug!(league, away_name, "away team not resolved");
        return Ok(None);
    };

    Ok(pick_pair(&candidates, &home_id, &away_id))
}

fn pick_pair(candidates: &[FixtureCandidate], home_id: &str, away_id: &str) -> Option<String> {
    let same_order = candidates.iter().find(|c| {
        c.home_team_id.as_deref() == Some(home_id) && c.away_team_id.as_deref() == Some(away_id)
    });
    if let Some(c) = same_order {
        return Some(c.fixture_id.clone());
    }

    // Some bookmakers list the sides the other way round.
    candidates
        .iter()
        .find(|c| {
            c.home_team_id.as_deref() == Some(away_id)
                && c.away_team_id.as_deref() == Some(home_id)
        })
        .map(|c| c.fixture_id.clone())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn candidate(id: &str, home: &str, away: &str) -> FixtureCandidate {
        FixtureCandidate {
            fixture_id: id.to_string(),
            league: "EPL".to_string(),
            kickoff: Utc.with_ymd_and_hms(2025, 9, 1, 15, 0, 0).unwrap(),
            home_team_id: Some(home.to_string()),
            away_team_id: Some(away.to_string()),
        }
    }

    #[test]
    fn exact_order_beats_swapped_order() {
        let cands = vec![candidate("swapped", "b", "a"), candidate("exact", "a", "b")];
        assert_eq!(pick_pair(&cands, "a", "b").as_deref(), Some("exact"));
        assert_eq!(pick_pair(&cands, "b", "a").as_deref(), Some("swapped"));
    }

    #[test]
    fn swapped_pair_is_fallback() {
        let cands = vec![candidate("f1", "b", "a")];
        assert_eq!(pick_pair(&cands, "a", "b").as_deref(), Some("f1"));
        assert_eq!(pick_pair(&cands, "a", "c"), None);
    }
}
