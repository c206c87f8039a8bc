use cedar_policy::{
    ContextCreationError, EntityAttrEvaluationError, ParseErrors, RequestValidationError,
};
use cedar_policy_core::entities::err::EntitiesError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecorationError {
    #[error("malformed entity identifier: {0}")]
    MalformedIdentifier(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("digest algorithm unavailable: {0}")]
    DigestUnavailable(String),

    #[error("missing shared description for key: {0}")]
    MissingDescription(String),

    #[error("failed to parse policy: {0}")]
    PolicyParse(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DecorationError {
    /// True when the failure came from a collaborator rather than from the input tree.
    pub fn is_backend(&self) -> bool {
        matches!(self, DecorationError::BackendUnavailable(_))
    }
}

impl From<RequestValidationError> for DecorationError {
    fn from(err: RequestValidationError) -> Self {
        DecorationError::Evaluation(err.to_string())
    }
}

impl From<ParseErrors> for DecorationError {
    fn from(err: ParseErrors) -> Self {
        DecorationError::PolicyParse(err.to_string())
    }
}

impl From<ContextCreationError> for DecorationError {
    fn from(err: ContextCreationError) -> Self {
        DecorationError::Evaluation(err.to_string())
    }
}

impl From<EntityAttrEvaluationError> for DecorationError {
    fn from(err: EntityAttrEvaluationError) -> Self {
        DecorationError::Evaluation(err.to_string())
    }
}

impl From<EntitiesError> for DecorationError {
    fn from(err: EntitiesError) -> Self {
        DecorationError::Evaluation(err.to_string())
    }
}

impl From<serde_json::Error> for DecorationError {
    fn from(err: serde_json::Error) -> Self {
        DecorationError::InvalidConfig(err.to_string())
    }
}
