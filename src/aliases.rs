use std::collections::BTreeSet;

use anyhow::Result;
use tracing::debug;

use crate::normalize::canonicalize;
use crate::registry::TeamRegistry;

/// Known canonical aliases of a team; empty when the team is unknown.
pub fn get_aliases<R>(registry: &R, team_id: &str) -> Result<BTreeSet<String>>
where
    R: TeamRegistry + ?Sized,
{
    Ok(registry.team_aliases(team_id)?.unwrap_or_default())
}

/// Replace the full alias set of a team, creating the record if absent.
pub fn set_aliases<R>(registry: &R, team_id: &str, aliases: &BTreeSet<String>) -> Result<()>
where
    R: TeamRegistry + ?Sized,
{
    registry.upsert_team_aliases(team_id, aliases)
}

/// Canonicalize `names` and add them to the team's alias set.
///
/// Returns how many distinct canonical strings were not already known. Names that
/// canonicalize to nothing are skipped.
pub fn register_alias<R, I, S>(registry: &R, team_id: &str, names: I) -> Result<usize>
where
    R: TeamRegistry + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut current = get_aliases(registry, team_id)?;
    let before = current.len();
    for name in names {
        let canonical = canonicalize(name.as_ref());
        if !canonical.is_empty() {
            current.insert(canonical);
        }
    }
    set_aliases(registry, team_id, &current)?;

    let added = current.len() - before;
    if added > 0 {
        debug!(team_id, added, "registered team aliases");
    }
    Ok(added)
}
