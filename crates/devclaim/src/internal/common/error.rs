use crate::internal::common::resources::ResourceName;
use crate::internal::common::utils::format_comma_delimited;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Missing plugins: {}", format_comma_delimited(.0))]
    MissingPlugins(Vec<ResourceName>),
    #[error("Insufficient resources: {}", format_comma_delimited(.0))]
    InsufficientResources(Vec<ResourceName>),
    #[error("Invalid resource claim")]
    InvalidResourceClaim,
    #[error("Claimer is already started")]
    AlreadyStarted,
    #[error("Claimer is not started")]
    NotStarted,
    #[error("Failed to release claim: {}", format_release_errors(.0))]
    ReleaseFailed(Vec<(ResourceName, ClaimError)>),
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Error: {0}")]
    GenericError(String),
}

fn format_release_errors(errors: &[(ResourceName, ClaimError)]) -> String {
    format_comma_delimited(errors.iter().map(|(name, error)| format!("{name}: {error}")))
}

impl From<String> for ClaimError {
    fn from(e: String) -> Self {
        Self::GenericError(e)
    }
}
impl From<&str> for ClaimError {
    fn from(e: &str) -> Self {
        Self::GenericError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let error = ClaimError::MissingPlugins(vec!["fpga".to_string(), "gpu".to_string()]);
        assert_eq!(error.to_string(), "Missing plugins: fpga,gpu");

        let error = ClaimError::InsufficientResources(vec!["gpu".to_string()]);
        assert_eq!(error.to_string(), "Insufficient resources: gpu");

        let error = ClaimError::ReleaseFailed(vec![(
            "gpu".to_string(),
            ClaimError::InvalidResourceClaim,
        )]);
        assert_eq!(
            error.to_string(),
            "Failed to release claim: gpu: Invalid resource claim"
        );
    }
}
