use thiserror::Error;

/// Reasons a single group is skipped during training or forecasting.
///
/// None of these abort a run; the caller logs them and moves on to the next
/// group.
#[derive(Debug, Error)]
pub enum GroupError {
    #[error("insufficient history: {rows} rows, {required} required")]
    InsufficientHistory { rows: usize, required: usize },

    #[error("no {kind} model artifact")]
    MissingArtifact { kind: String },

    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("model store error: {0}")]
    Store(String),
}

impl GroupError {
    /// Stable label for structured logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::MissingArtifact { .. } => "missing_artifact",
            Self::UpstreamFetch(_) => "upstream_fetch",
            Self::MalformedInput(_) => "malformed_input",
            Self::Store(_) => "store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_error_display() {
        let err = GroupError::InsufficientHistory {
            rows: 10,
            required: 504,
        };
        assert_eq!(err.to_string(), "insufficient history: 10 rows, 504 required");
        assert_eq!(err.label(), "insufficient_history");
        assert_eq!(
            GroupError::MissingArtifact { kind: "point".into() }.to_string(),
            "no point model artifact"
        );
    }
}
