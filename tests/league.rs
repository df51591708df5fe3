use std::fs;
use std::path::PathBuf;

use leaguecast::backtest::{backtest, evaluate};
use leaguecast::dataset::{MatchDataset, MatchResult, RawTable};
use leaguecast::error::MetricsError;
use leaguecast::rates::{self, DEFAULT_EXPONENT};
use leaguecast::standings::{aggregate_all, aggregate_one};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn mini_season() -> MatchDataset {
    let table: RawTable =
        serde_json::from_str(&read_fixture("mini_season.json")).expect("fixture should parse");
    MatchDataset::from_table(&table).expect("fixture rows should be valid")
}

#[test]
fn table_orders_by_points_with_expected_totals() {
    let table = aggregate_all(&mini_season());
    let summary: Vec<(&str, u32)> = table.iter().map(|r| (r.team.as_str(), r.points)).collect();
    assert_eq!(
        summary,
        vec![
            ("Ashford United", 14),
            ("Clifton Rovers", 12),
            ("Birchwood", 6),
            ("Dearne Athletic", 1),
        ]
    );
}

#[test]
fn per_team_counts_reconcile_with_the_match_list() {
    let ds = mini_season();
    for record in aggregate_all(&ds) {
        assert_eq!(
            record.wins + record.draws + record.losses,
            record.matches_played
        );
        assert_eq!(record.points, 3 * record.wins + record.draws);
    }

    let dist = ds.result_distribution();
    assert_eq!((dist.home_wins, dist.draws, dist.away_wins), (4, 3, 5));
    assert_eq!(dist.home_wins + dist.draws + dist.away_wins, ds.len());
}

#[test]
fn rates_match_hand_computation() {
    let ds = mini_season();
    let rate = rates::win_rate(&ds, "Ashford United").unwrap();
    assert!((rate - 4.0 / 6.0).abs() < 1e-12);

    // 14 scored, 4 conceded.
    let pyth = rates::pythagorean_expectation(&ds, "Ashford United", DEFAULT_EXPONENT).unwrap();
    assert!((pyth - 196.0 / 212.0).abs() < 1e-12);

    let profiles = rates::rate_profiles(&ds, DEFAULT_EXPONENT).unwrap();
    assert_eq!(profiles.len(), 4);
    assert!(profiles.iter().all(|p| (0.0..=1.0).contains(&p.win_rate)));
    assert!(profiles.iter().all(|p| (0.0..=1.0).contains(&p.pythagorean)));
}

#[test]
fn unknown_team_queries_fail_loudly() {
    let ds = mini_season();
    assert!(matches!(
        aggregate_one(&ds, "Easton Town").unwrap_err(),
        MetricsError::UnknownTeam { .. }
    ));
    assert!(matches!(
        rates::win_rate(&ds, "Easton Town").unwrap_err(),
        MetricsError::UnknownTeam { .. }
    ));
}

#[test]
fn schema_violations_surface_before_any_computation() {
    let mut table: RawTable =
        serde_json::from_str(&read_fixture("mini_season.json")).expect("fixture should parse");
    table.columns.retain(|c| c != "result");
    for row in &mut table.rows {
        row.pop();
    }
    let err = MatchDataset::from_table(&table).unwrap_err();
    assert_eq!(
        err,
        MetricsError::MissingColumns {
            columns: vec!["result".to_string()]
        }
    );
}

#[test]
fn backtest_on_the_fixture_is_fully_deterministic() {
    let rows = backtest(&mini_season());
    assert_eq!(rows.len(), 6);

    let predicted: Vec<Option<MatchResult>> = rows.iter().map(|r| r.predicted).collect();
    assert_eq!(
        predicted,
        vec![
            Some(MatchResult::AwayWin),
            Some(MatchResult::AwayWin),
            Some(MatchResult::HomeWin),
            Some(MatchResult::HomeWin),
            Some(MatchResult::AwayWin),
            Some(MatchResult::AwayWin),
        ]
    );

    let summary = evaluate(&rows);
    assert_eq!(summary.evaluated, 6);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.correct, 5);
    assert!((summary.accuracy - 5.0 / 6.0).abs() < 1e-12);
}
