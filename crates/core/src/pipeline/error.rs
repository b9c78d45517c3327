use thiserror::Error;

use crate::gateway::domain::detection_gateway::GatewayError;
use crate::grouping::domain::clusterer::ClusteringError;
use crate::grouping::domain::engine::GroupingError;

/// Pipeline failure, classified for the HTTP surface: validation errors
/// map to client errors, everything else to server errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{stage} stage failed")]
    Upstream {
        stage: &'static str,
        #[source]
        source: GatewayError,
    },
    #[error("no detection produced a usable crop")]
    NoValidInput,
    #[error("clustering failed")]
    Clustering(#[source] ClusteringError),
}

impl PipelineError {
    /// True when the caller's input caused the failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_) | PipelineError::NoValidInput
        )
    }
}

impl From<GroupingError> for PipelineError {
    fn from(err: GroupingError) -> Self {
        match err {
            GroupingError::NoValidInput => PipelineError::NoValidInput,
            GroupingError::Clustering(e) => PipelineError::Clustering(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_is_client_error() {
        assert!(PipelineError::Validation("bad image".into()).is_client_error());
    }

    #[test]
    fn test_upstream_is_server_error() {
        let err = PipelineError::Upstream {
            stage: "detection",
            source: GatewayError::Status(503),
        };
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_no_valid_input_is_client_error() {
        assert!(PipelineError::NoValidInput.is_client_error());
    }

    #[test]
    fn test_clustering_is_server_error() {
        let err = PipelineError::Clustering(ClusteringError::NotSquare { rows: 2, cols: 3 });
        assert!(!err.is_client_error());
    }
}
