use serde::Serialize;

use crate::dataset::MatchDataset;
use crate::error::MetricsError;
use crate::standings::{TeamTally, tally_by_team, team_universe};

/// Classical pythagorean exponent for association football.
pub const DEFAULT_EXPONENT: f64 = 2.0;

/// Normalized strength indicators for one team, recomputed from the match
/// list on every call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamRateProfile {
    pub team: String,
    pub win_rate: f64,
    pub pythagorean: f64,
}

/// Fraction of played matches the team won. A team with zero played matches
/// rates 0.0 rather than erroring.
pub fn win_rate(dataset: &MatchDataset, team: &str) -> Result<f64, MetricsError> {
    let tallies = tally_by_team(dataset.matches());
    let tally = tallies
        .get(team)
        .copied()
        .ok_or_else(|| MetricsError::unknown_team(team))?;
    Ok(win_rate_of(&tally))
}

/// Pythagorean expectation `gf^e / (gf^e + ga^e)` over all matches the team
/// played, goals attributed by side. 0.0 when the team has no goals in
/// either direction.
pub fn pythagorean_expectation(
    dataset: &MatchDataset,
    team: &str,
    exponent: f64,
) -> Result<f64, MetricsError> {
    validate_exponent(exponent)?;
    let tallies = tally_by_team(dataset.matches());
    let tally = tallies
        .get(team)
        .copied()
        .ok_or_else(|| MetricsError::unknown_team(team))?;
    Ok(pythagorean_of(&tally, exponent))
}

/// Both rate metrics for every team in the dataset, one profile per name in
/// the home/away union, sorted by name.
pub fn rate_profiles(
    dataset: &MatchDataset,
    exponent: f64,
) -> Result<Vec<TeamRateProfile>, MetricsError> {
    validate_exponent(exponent)?;
    let tallies = tally_by_team(dataset.matches());
    Ok(team_universe(dataset.matches())
        .into_iter()
        .map(|team| {
            let tally = tallies.get(team).copied().unwrap_or_default();
            TeamRateProfile {
                team: team.to_string(),
                win_rate: win_rate_of(&tally),
                pythagorean: pythagorean_of(&tally, exponent),
            }
        })
        .collect())
}

pub(crate) fn validate_exponent(exponent: f64) -> Result<(), MetricsError> {
    if exponent.is_finite() && exponent > 0.0 {
        Ok(())
    } else {
        Err(MetricsError::invalid_parameter(
            "exponent",
            format!("must be a positive finite number, got {exponent}"),
        ))
    }
}

pub(crate) fn win_rate_of(tally: &TeamTally) -> f64 {
    if tally.matches_played == 0 {
        return 0.0;
    }
    f64::from(tally.wins) / f64::from(tally.matches_played)
}

pub(crate) fn pythagorean_of(tally: &TeamTally, exponent: f64) -> f64 {
    let gf = f64::from(tally.goals_for).powf(exponent);
    let ga = f64::from(tally.goals_against).powf(exponent);
    if gf + ga == 0.0 {
        return 0.0;
    }
    gf / (gf + ga)
}
