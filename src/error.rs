use thiserror::Error;

/// Failures surfaced by the analysis pipeline.
///
/// Numeric degeneracies are deliberately not errors: a team with zero played
/// matches or zero total goals yields the documented 0.0 results instead, so
/// callers can tell "computable but uninformative" apart from "not computable".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("missing required columns: {}", .columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("unknown team {team:?}: no matches in the dataset")]
    UnknownTeam { team: String },

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("row {row}: column `{column}` holds unparseable value {value:?}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },
}

impl MetricsError {
    pub(crate) fn unknown_team(team: &str) -> Self {
        Self::UnknownTeam {
            team: team.to_string(),
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
