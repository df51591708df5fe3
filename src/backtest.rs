use chrono::NaiveDate;
use serde::Serialize;

use crate::dataset::{Match, MatchDataset, MatchResult};
use crate::error::MetricsError;
use crate::rates::{DEFAULT_EXPONENT, pythagorean_of, validate_exponent};
use crate::standings::tally_by_team;

/// One second-half match with the first-half signal attached. A side absent
/// from the first half carries `None` through to the prediction instead of
/// a silent default, so scoring code can flag or exclude it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestRow {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub actual: MatchResult,
    pub home_pythagorean: Option<f64>,
    pub away_pythagorean: Option<f64>,
    pub predicted: Option<MatchResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub evaluated: usize,
    pub skipped: usize,
    pub correct: usize,
    pub accuracy: f64,
}

/// Season-split backtest at the classical exponent.
pub fn backtest(dataset: &MatchDataset) -> Vec<BacktestRow> {
    // DEFAULT_EXPONENT always validates.
    backtest_with_exponent(dataset, DEFAULT_EXPONENT).unwrap_or_default()
}

/// Orders the season chronologically, rates every team on the first half
/// only, and scores each second-half match with the rule: higher first-half
/// pythagorean expectation wins, exact tie predicts a draw.
pub fn backtest_with_exponent(
    dataset: &MatchDataset,
    exponent: f64,
) -> Result<Vec<BacktestRow>, MetricsError> {
    validate_exponent(exponent)?;

    let mut ordered: Vec<&Match> = dataset.matches().iter().collect();
    // Stable by date, so same-day fixtures keep their original order.
    ordered.sort_by_key(|m| m.date);

    let midpoint = ordered.len() / 2;
    let (first_half, second_half) = ordered.split_at(midpoint);
    log::debug!(
        "backtest split: {} first-half / {} second-half matches",
        first_half.len(),
        second_half.len(),
    );

    let tallies = tally_by_team(first_half.iter().copied());

    let rows = second_half
        .iter()
        .map(|m| {
            let home_pythagorean = tallies
                .get(m.home_team.as_str())
                .map(|t| pythagorean_of(t, exponent));
            let away_pythagorean = tallies
                .get(m.away_team.as_str())
                .map(|t| pythagorean_of(t, exponent));
            let predicted = match (home_pythagorean, away_pythagorean) {
                (Some(home), Some(away)) => Some(rule_prediction(home, away)),
                _ => None,
            };
            BacktestRow {
                date: m.date,
                home_team: m.home_team.clone(),
                away_team: m.away_team.clone(),
                actual: m.result,
                home_pythagorean,
                away_pythagorean,
                predicted,
            }
        })
        .collect();
    Ok(rows)
}

/// Exact equality predicting a draw is intentional: the comparison is kept
/// literal for parity with the upstream rule, no epsilon band.
fn rule_prediction(home: f64, away: f64) -> MatchResult {
    if home > away {
        MatchResult::HomeWin
    } else if home < away {
        MatchResult::AwayWin
    } else {
        MatchResult::Draw
    }
}

/// Hit rate over the rows the rule could score; rows without a prediction
/// count as skipped, never as wrong.
pub fn evaluate(rows: &[BacktestRow]) -> BacktestSummary {
    let mut evaluated = 0usize;
    let mut correct = 0usize;
    for row in rows {
        let Some(predicted) = row.predicted else {
            continue;
        };
        evaluated += 1;
        if predicted == row.actual {
            correct += 1;
        }
    }
    let accuracy = if evaluated > 0 {
        correct as f64 / evaluated as f64
    } else {
        0.0
    };
    BacktestSummary {
        evaluated,
        skipped: rows.len() - evaluated,
        correct,
        accuracy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(day: u32, home: &str, away: &str, hg: u32, ag: u32) -> Match {
        let result = if hg > ag {
            MatchResult::HomeWin
        } else if hg < ag {
            MatchResult::AwayWin
        } else {
            MatchResult::Draw
        };
        Match {
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: hg,
            away_goals: ag,
            result,
        }
    }

    fn split_season() -> MatchDataset {
        MatchDataset::from_matches(vec![
            // First half: A dominant, B middling, C weak.
            m(1, "A", "B", 3, 0),
            m(2, "B", "C", 2, 1),
            m(3, "C", "A", 0, 4),
            m(4, "A", "C", 2, 0),
            // Second half.
            m(10, "A", "B", 1, 0),
            m(11, "C", "A", 1, 2),
            m(12, "B", "C", 1, 1),
            m(13, "B", "A", 2, 0),
        ])
    }

    #[test]
    fn splits_at_the_midpoint_chronologically() {
        let rows = backtest(&split_season());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }

    #[test]
    fn favors_the_stronger_first_half_side() {
        let rows = backtest(&split_season());
        // A outscored everyone in the first half.
        assert_eq!(rows[0].predicted, Some(MatchResult::HomeWin));
        assert_eq!(rows[1].predicted, Some(MatchResult::AwayWin));
        assert!(rows[0].home_pythagorean > rows[0].away_pythagorean);
    }

    #[test]
    fn second_half_results_never_leak_into_the_signal() {
        let clean = split_season();
        let mut corrupted: Vec<Match> = clean.matches().to_vec();
        for m in corrupted.iter_mut().skip(4) {
            m.home_goals = 99;
            m.away_goals = 0;
            m.result = MatchResult::HomeWin;
        }
        let corrupted = MatchDataset::from_matches(corrupted);

        let clean_rows = backtest(&clean);
        let corrupted_rows = backtest(&corrupted);
        for (a, b) in clean_rows.iter().zip(&corrupted_rows) {
            assert_eq!(a.home_pythagorean, b.home_pythagorean);
            assert_eq!(a.away_pythagorean, b.away_pythagorean);
            assert_eq!(a.predicted, b.predicted);
        }
    }

    #[test]
    fn unseen_first_half_team_stays_unresolved() {
        let ds = MatchDataset::from_matches(vec![
            m(1, "A", "B", 2, 0),
            m(2, "B", "A", 1, 1),
            m(10, "A", "Newcomer", 1, 0),
            m(11, "B", "A", 0, 2),
        ]);
        let rows = backtest(&ds);
        let newcomer_row = rows
            .iter()
            .find(|r| r.away_team == "Newcomer")
            .expect("newcomer fixture is in the second half");
        assert_eq!(newcomer_row.away_pythagorean, None);
        assert_eq!(newcomer_row.predicted, None);
        assert!(newcomer_row.home_pythagorean.is_some());
    }

    #[test]
    fn evaluate_counts_unresolved_rows_as_skipped() {
        let ds = MatchDataset::from_matches(vec![
            m(1, "A", "B", 2, 0),
            m(2, "B", "A", 1, 1),
            m(10, "A", "Newcomer", 1, 0),
            m(11, "B", "A", 0, 2),
        ]);
        let rows = backtest(&ds);
        let summary = evaluate(&rows);
        assert_eq!(summary.evaluated + summary.skipped, rows.len());
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn exact_tie_predicts_a_draw() {
        assert_eq!(rule_prediction(0.5, 0.5), MatchResult::Draw);
        assert_eq!(rule_prediction(0.6, 0.5), MatchResult::HomeWin);
        assert_eq!(rule_prediction(0.4, 0.5), MatchResult::AwayWin);
    }

    #[test]
    fn ties_on_date_keep_original_order() {
        let ds = MatchDataset::from_matches(vec![
            m(1, "A", "B", 1, 0),
            m(1, "B", "C", 0, 1),
            m(1, "C", "A", 2, 2),
            m(1, "A", "C", 1, 0),
        ]);
        let rows = backtest(&ds);
        assert_eq!(rows[0].home_team, "C");
        assert_eq!(rows[1].home_team, "A");
    }
}
