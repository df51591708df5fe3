use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

/// Columns every downstream computation depends on. Validated once here,
/// never re-checked ad hoc inside the aggregation or modelling code.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "date",
    "home_team",
    "away_team",
    "home_goals",
    "away_goals",
    "result",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d/%m/%y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchResult {
    HomeWin,
    Draw,
    AwayWin,
}

impl MatchResult {
    /// Parses the full-time result label used by the tabular feeds.
    pub fn from_label(raw: &str) -> Result<Self, MetricsError> {
        match raw.trim() {
            "H" => Ok(Self::HomeWin),
            "D" => Ok(Self::Draw),
            "A" => Ok(Self::AwayWin),
            other => Err(MetricsError::invalid_parameter(
                "result",
                format!("expected one of H, D, A, got {other:?}"),
            )),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HomeWin => "H",
            Self::Draw => "D",
            Self::AwayWin => "A",
        }
    }
}

/// One finished match. Goal/result consistency is the ingestion
/// collaborator's contract and is trusted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u32,
    pub away_goals: u32,
    pub result: MatchResult,
}

/// The handoff shape from the external ingestion/cleaning step: named
/// columns over string cells, one row per match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// League-wide full-time result counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultDistribution {
    pub home_wins: usize,
    pub draws: usize,
    pub away_wins: usize,
}

/// A season's worth of validated matches, the input contract for every
/// other component.
#[derive(Debug, Clone, Default)]
pub struct MatchDataset {
    matches: Vec<Match>,
}

impl MatchDataset {
    pub fn from_matches(matches: Vec<Match>) -> Self {
        Self { matches }
    }

    /// Validates the schema once, then parses every row into a typed
    /// [`Match`]. All missing columns are reported together; the first bad
    /// cell aborts the load naming its column and row.
    pub fn from_table(table: &RawTable) -> Result<Self, MetricsError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| table.column_index(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(MetricsError::MissingColumns { columns: missing });
        }

        // Schema verified above, so every lookup resolves.
        let idx = |name: &str| table.column_index(name).unwrap_or_default();
        let date_idx = idx("date");
        let home_idx = idx("home_team");
        let away_idx = idx("away_team");
        let hg_idx = idx("home_goals");
        let ag_idx = idx("away_goals");
        let result_idx = idx("result");

        let mut matches = Vec::with_capacity(table.rows.len());
        for (row_no, row) in table.rows.iter().enumerate() {
            let date = parse_date(cell(row, date_idx), "date", row_no)?;
            let home_team = cell(row, home_idx).trim().to_string();
            let away_team = cell(row, away_idx).trim().to_string();
            let home_goals = parse_goals(cell(row, hg_idx), "home_goals", row_no)?;
            let away_goals = parse_goals(cell(row, ag_idx), "away_goals", row_no)?;
            let result = MatchResult::from_label(cell(row, result_idx))?;

            matches.push(Match {
                date,
                home_team,
                away_team,
                home_goals,
                away_goals,
                result,
            });
        }

        Ok(Self { matches })
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Counts home wins, draws and away wins across the whole season.
    pub fn result_distribution(&self) -> ResultDistribution {
        let mut dist = ResultDistribution {
            home_wins: 0,
            draws: 0,
            away_wins: 0,
        };
        for m in &self.matches {
            match m.result {
                MatchResult::HomeWin => dist.home_wins += 1,
                MatchResult::Draw => dist.draws += 1,
                MatchResult::AwayWin => dist.away_wins += 1,
            }
        }
        dist
    }
}

fn cell<'a>(row: &'a [String], idx: usize) -> &'a str {
    row.get(idx).map(String::as_str).unwrap_or_default()
}

fn parse_date(raw: &str, column: &str, row: usize) -> Result<NaiveDate, MetricsError> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    Err(MetricsError::InvalidValue {
        column: column.to_string(),
        row,
        value: raw.to_string(),
    })
}

fn parse_goals(raw: &str, column: &str, row: usize) -> Result<u32, MetricsError> {
    // A still-empty goal cell means the cleaning step was skipped; reject it
    // rather than let a silent zero skew every aggregate downstream.
    raw.trim()
        .parse::<u32>()
        .map_err(|_| MetricsError::InvalidValue {
            column: column.to_string(),
            row,
            value: raw.to_string(),
        })
}
