use footy_pipeline::aliases::register_alias;
use footy_pipeline::config::League;
use footy_pipeline::db::{FixtureRecord, open_in_memory, upsert_fixtures};
use footy_pipeline::fixture_match::{DEFAULT_TOLERANCE_MINUTES, find_team_by_name, match_fixture};
use rusqlite::Connection;

fn fixture(id: &str, league: League, kickoff: &str, home: &str, away: &str) -> FixtureRecord {
    FixtureRecord {
        fixture_id: id.to_string(),
        league,
        season: "2025/2026".to_string(),
        utc_kickoff: kickoff.to_string(),
        home_team_id: Some(home.to_string()),
        away_team_id: Some(away.to_string()),
        status: "NS".to_string(),
        home_goals: None,
        away_goals: None,
    }
}

/// EPL: fx1 Alpha Rovers v Beta Town at 15:00, fx3 Gamma City v Delta Athletic at 17:30.
/// LaLiga: fx2 at the same 15:00 kickoff with a team that shares the "alpha rovers" alias.
fn seeded() -> Connection {
    let mut conn = open_in_memory().expect("db");
    upsert_fixtures(
        &mut conn,
        &[
            fixture("fx1", League::Epl, "2025-09-01T15:00:00Z", "t_a", "t_b"),
            fixture("fx3", League::Epl, "2025-09-01T17:30:00Z", "t_g", "t_d"),
            fixture("fx2", League::LaLiga, "2025-09-01T15:00:00Z", "t_c", "t_e"),
        ],
    )
    .expect("fixtures");
    register_alias(&conn, "t_a", ["Alpha Rovers"]).expect("a");
    register_alias(&conn, "t_b", ["Beta Town"]).expect("b");
    register_alias(&conn, "t_g", ["Gamma City"]).expect("g");
    register_alias(&conn, "t_d", ["Delta Athletic"]).expect("d");
    register_alias(&conn, "t_c", ["Alpha Rovers", "Alpha Madrid"]).expect("c");
    register_alias(&conn, "t_e", ["Epsilon CF"]).expect("e");
    conn
}

#[test]
fn matches_within_tolerance() {
    let conn = seeded();
    let id = match_fixture(
        &conn,
        "EPL",
        "2025-09-01T15:05:00Z",
        "Alpha Rovers",
        "Beta Town",
        DEFAULT_TOLERANCE_MINUTES,
    )
    .expect("match");
    assert_eq!(id.as_deref(), Some("fx1"));
}

#[test]
fn swapped_sides_find_same_fixture() {
    let conn = seeded();
    let id = match_fixture(&conn, "EPL", "2025-09-01T15:05:00Z", "Beta Town", "Alpha Rovers", 15)
        .expect("match");
    assert_eq!(id.as_deref(), Some("fx1"));
}

#[test]
fn outside_window_is_no_match() {
    let conn = seeded();
    let id = match_fixture(&conn, "EPL", "2025-09-01T15:20:00Z", "Alpha Rovers", "Beta Town", 15)
        .expect("match");
    assert_eq!(id, None);
}

#[test]
fn window_edges_are_inclusive() {
    let conn = seeded();
    for kickoff in ["2025-09-01T14:45:00Z", "2025-09-01T15:15:00Z"] {
        let id = match_fixture(&conn, "EPL", kickoff, "Alpha Rovers", "Beta Town", 15).expect("match");
        assert_eq!(id.as_deref(), Some("fx1"), "edge {kickoff}");
    }
}

#[test]
fn offset_kickoff_formats_are_accepted() {
    let conn = seeded();
    let id = match_fixture(&conn, "EPL", "2025-09-01T17:02:00+02:00", "Alpha Rovers", "Beta Town", 15)
        .expect("match");
    assert_eq!(id.as_deref(), Some("fx1"));
}

#[test]
fn empty_canonical_name_is_no_match() {
    let conn = seeded();
    let id = match_fixture(&conn, "EPL", "2025-09-01T15:00:00Z", "FC", "Beta Town", 15).expect("match");
    assert_eq!(id, None);
}

#[test]
fn unparsable_kickoff_is_no_match() {
    let conn = seeded();
    let id = match_fixture(&conn, "EPL", "tomorrow at three", "Alpha Rovers", "Beta Town", 15)
        .expect("match");
    assert_eq!(id, None);
}

#[test]
fn shared_alias_resolves_within_its_league() {
    let conn = seeded();
    assert_eq!(
        find_team_by_name(&conn, "EPL", "Alpha Rovers").expect("epl").as_deref(),
        Some("t_a")
    );
    assert_eq!(
        find_team_by_name(&conn, "LaLiga", "Alpha Rovers").expect("laliga").as_deref(),
        Some("t_c")
    );
    let laliga = match_fixture(&conn, "LaLiga", "2025-09-01T15:00:00Z", "Alpha Rovers", "Epsilon", 15)
        .expect("match");
    assert_eq!(laliga.as_deref(), Some("fx2"));
}

#[test]
fn partial_names_fall_back_to_substring_match() {
    let conn = seeded();
    assert_eq!(
        find_team_by_name(&conn, "EPL", "Beta").expect("partial").as_deref(),
        Some("t_b")
    );
    assert_eq!(
        find_team_by_name(&conn, "EPL", "Gamma City Women").expect("longer").as_deref(),
        Some("t_g")
    );
    let id = match_fixture(&conn, "EPL", "2025-09-01T15:00:00Z", "Alpha", "Beta Town FC", 15)
        .expect("match");
    assert_eq!(id.as_deref(), Some("fx1"));
}

#[test]
fn unknown_team_or_wrong_pair_is_no_match() {
    let conn = seeded();
    let unknown = match_fixture(&conn, "EPL", "2025-09-01T15:00:00Z", "Zeta Rangers", "Beta Town", 15)
        .expect("match");
    assert_eq!(unknown, None);

    // Both teams resolve, but they do not meet inside the window.
    let wrong_pair = match_fixture(&conn, "EPL", "2025-09-01T15:00:00Z", "Alpha Rovers", "Delta Athletic", 15)
        .expect("match");
    assert_eq!(wrong_pair, None);
}

#[test]
fn empty_window_is_no_match() {
    let conn = seeded();
    let id = match_fixture(&conn, "EPL", "2025-09-02T15:00:00Z", "Alpha Rovers", "Beta Town", 15)
        .expect("match");
    assert_eq!(id, None);
}

#[test]
fn malformed_alias_json_is_an_error() {
    let conn = seeded();
    conn.execute("UPDATE teams SET alias = 'nope' WHERE team_id = 't_b'", [])
        .expect("corrupt");
    let res = match_fixture(&conn, "EPL", "2025-09-01T15:00:00Z", "Alpha Rovers", "Beta Town", 15);
    assert!(res.is_err());
}

#[test]
fn out_of_range_tolerance_is_no_match() {
    let conn = seeded();
    for tolerance in [1_000_000_000_000_000, i64::MAX, i64::MIN] {
        let id = match_fixture(&conn, "EPL", "2025-09-01T15:00:00Z", "Alpha Rovers", "Beta Town", tolerance)
            .expect("match");
        assert_eq!(id, None, "tolerance {tolerance}");
    }
}

#[test]
fn ambiguous_partial_name_takes_first_registered_team() {
    let mut conn = open_in_memory().expect("db");
    upsert_fixtures(
        &mut conn,
        &[fixture("fx9", League::Epl, "2025-09-01T15:00:00Z", "t_m", "t_z")],
    )
    .expect("fixtures");
    // Registered in the reverse of id order: registry order is insertion order.
    register_alias(&conn, "t_z", ["Leeds United"]).expect("leeds");
    register_alias(&conn, "t_m", ["West Ham United"]).expect("west ham");

    assert_eq!(
        find_team_by_name(&conn, "EPL", "United").expect("partial").as_deref(),
        Some("t_z")
    );
    // An exact alias still wins over an earlier partial hit.
    assert_eq!(
        find_team_by_name(&conn, "EPL", "West Ham United").expect("exact").as_deref(),
        Some("t_m")
    );
}
