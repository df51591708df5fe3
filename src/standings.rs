use std::collections::HashMap;

use serde::Serialize;

use crate::dataset::{Match, MatchDataset, MatchResult};
use crate::error::MetricsError;

/// Raw per-team counters, filled in a single pass over the season. Shared
/// with the rate metrics so neither side rescans the match list per team.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TeamTally {
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl TeamTally {
    pub(crate) fn absorb(&mut self, m: &Match, at_home: bool) {
        self.matches_played += 1;
        let (gf, ga) = if at_home {
            (m.home_goals, m.away_goals)
        } else {
            (m.away_goals, m.home_goals)
        };
        self.goals_for += gf;
        self.goals_against += ga;

        // A home result reads directly; from the away side a win means the
        // away label.
        let won = match m.result {
            MatchResult::HomeWin => at_home,
            MatchResult::AwayWin => !at_home,
            MatchResult::Draw => {
                self.draws += 1;
                return;
            }
        };
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
    }

    pub(crate) fn shed(&mut self, m: &Match, at_home: bool) {
        self.matches_played -= 1;
        let (gf, ga) = if at_home {
            (m.home_goals, m.away_goals)
        } else {
            (m.away_goals, m.home_goals)
        };
        self.goals_for -= gf;
        self.goals_against -= ga;
        match m.result {
            MatchResult::Draw => self.draws -= 1,
            MatchResult::HomeWin if at_home => self.wins -= 1,
            MatchResult::AwayWin if !at_home => self.wins -= 1,
            _ => self.losses -= 1,
        }
    }
}

/// One pass over the matches, accumulating both sides of every row.
pub(crate) fn tally_by_team<'a, I>(matches: I) -> HashMap<&'a str, TeamTally>
where
    I: IntoIterator<Item = &'a Match>,
{
    let mut tallies: HashMap<&str, TeamTally> = HashMap::new();
    for m in matches {
        tallies.entry(&m.home_team).or_default().absorb(m, true);
        tallies.entry(&m.away_team).or_default().absorb(m, false);
    }
    tallies
}

/// The team universe: every name seen in either the home or away column,
/// deduplicated and sorted (case-sensitive). Teams with no matches never
/// appear because the universe is derived from observed matches only.
pub(crate) fn team_universe<'a>(matches: &'a [Match]) -> Vec<&'a str> {
    let mut names: Vec<&str> = matches
        .iter()
        .flat_map(|m| [m.home_team.as_str(), m.away_team.as_str()])
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// A team's season summary line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamRecord {
    pub team: String,
    pub matches_played: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_difference: i64,
    pub points: u32,
}

impl TeamRecord {
    fn from_tally(team: &str, tally: TeamTally) -> Self {
        Self {
            team: team.to_string(),
            matches_played: tally.matches_played,
            wins: tally.wins,
            draws: tally.draws,
            losses: tally.losses,
            goals_for: tally.goals_for,
            goals_against: tally.goals_against,
            goal_difference: i64::from(tally.goals_for) - i64::from(tally.goals_against),
            points: 3 * tally.wins + tally.draws,
        }
    }
}

/// Season summary for a single team. Errors when the team appears in
/// neither the home nor the away column.
pub fn aggregate_one(dataset: &MatchDataset, team: &str) -> Result<TeamRecord, MetricsError> {
    let tallies = tally_by_team(dataset.matches());
    let tally = tallies
        .get(team)
        .copied()
        .ok_or_else(|| MetricsError::unknown_team(team))?;
    Ok(TeamRecord::from_tally(team, tally))
}

/// The full league table, ordered by points descending. The sort is stable,
/// so teams on equal points keep the sorted-name order of the universe.
pub fn aggregate_all(dataset: &MatchDataset) -> Vec<TeamRecord> {
    let tallies = tally_by_team(dataset.matches());
    let mut records: Vec<TeamRecord> = team_universe(dataset.matches())
        .into_iter()
        .map(|team| {
            let tally = tallies.get(team).copied().unwrap_or_default();
            TeamRecord::from_tally(team, tally)
        })
        .collect();
    records.sort_by(|a, b| b.points.cmp(&a.points));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn m(day: u32, home: &str, away: &str, hg: u32, ag: u32) -> Match {
        let result = if hg > ag {
            MatchResult::HomeWin
        } else if hg < ag {
            MatchResult::AwayWin
        } else {
            MatchResult::Draw
        };
        Match {
            date: NaiveDate::from_ymd_opt(2024, 9, day).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: hg,
            away_goals: ag,
            result,
        }
    }

    fn toy_league() -> MatchDataset {
        MatchDataset::from_matches(vec![
            m(1, "A", "B", 2, 0),
            m(8, "B", "A", 1, 0),
            m(15, "A", "C", 1, 1),
            m(22, "C", "A", 2, 1),
        ])
    }

    #[test]
    fn aggregate_one_matches_hand_count() {
        let record = aggregate_one(&toy_league(), "A").unwrap();
        assert_eq!(record.matches_played, 4);
        assert_eq!(record.wins, 1);
        assert_eq!(record.draws, 1);
        assert_eq!(record.losses, 2);
        assert_eq!(record.goals_for, 4);
        assert_eq!(record.goals_against, 4);
        assert_eq!(record.goal_difference, 0);
        assert_eq!(record.points, 4);
    }

    #[test]
    fn counts_always_reconcile() {
        for record in aggregate_all(&toy_league()) {
            assert_eq!(
                record.wins + record.draws + record.losses,
                record.matches_played
            );
            assert_eq!(record.points, 3 * record.wins + record.draws);
            assert_eq!(
                record.goal_difference,
                i64::from(record.goals_for) - i64::from(record.goals_against)
            );
        }
    }

    #[test]
    fn universe_is_union_of_both_columns() {
        let table = aggregate_all(&toy_league());
        let mut names: Vec<&str> = table.iter().map(|r| r.team.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn table_is_points_descending_with_stable_name_ties() {
        // A and C both end on 4 points; sorted-name order must survive the tie.
        let table = aggregate_all(&toy_league());
        let order: Vec<&str> = table.iter().map(|r| r.team.as_str()).collect();
        let points: Vec<u32> = table.iter().map(|r| r.points).collect();
        assert!(points.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(order, vec!["A", "C", "B"]);
    }

    #[test]
    fn unknown_team_is_an_error() {
        let err = aggregate_one(&toy_league(), "Zebra Town").unwrap_err();
        assert!(matches!(err, MetricsError::UnknownTeam { .. }));
    }

    #[test]
    fn away_perspective_inverts_the_result_label() {
        let ds = MatchDataset::from_matches(vec![m(1, "Home FC", "Road FC", 0, 3)]);
        let road = aggregate_one(&ds, "Road FC").unwrap();
        assert_eq!(road.wins, 1);
        assert_eq!(road.goals_for, 3);
        let home = aggregate_one(&ds, "Home FC").unwrap();
        assert_eq!(home.losses, 1);
    }
}
