use crate::validation::FieldErrors;
use thiserror::Error;

/// A call to the users service that did not produce a usable result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestFailure {
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Invalid response body: {0}")]
    Decode(String),
    #[error("Created record has no id")]
    MissingId,
}

/// Why a form submission did not go through.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),
    #[error(transparent)]
    Request(#[from] RequestFailure),
}

impl SubmitError {
    /// Notice shown to the user; request failures stay generic
    pub fn notice(&self) -> String {
        match self {
            Self::Validation(errors) => format!(
                "Please fix {} field{} before submitting.",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ),
            Self::Request(_) => "Error submitting form. Please try again.".to_string(),
        }
    }
}
