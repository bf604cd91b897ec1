use thiserror::Error;

/// Failure to read a relative duration literal such as `-10d`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration '{0}': expected [+-]<digits>[mhdwMy], e.g. -10d")]
    InvalidFormat(String),
}

/// Reasons a query function refuses its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Duplicate args, please contain your eagerness")]
    DuplicateArgs,

    #[error("I need some args. for example: [project key], [{accepted}]")]
    NotEnoughArgs { accepted: String },

    #[error("Invalid number of arguments. Min number: {min}; Max number: {max}")]
    WrongArgCount { min: usize, max: usize },

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("You do not have permissions to browse issues in this project")]
    PermissionDenied,

    #[error("illegal commentator type '{given}'. accepted types: [{accepted}]")]
    IllegalCommentatorType { given: String, accepted: String },

    #[error("Incorrect duration '{duration}' for function '{function}'")]
    InvalidDuration { function: String, duration: String },

    #[error("lookup failed: {0}")]
    LookupFailed(String),
}

impl ValidationError {
    /// Stable reason code for machine-readable output.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::DuplicateArgs => "duplicate_args",
            ValidationError::NotEnoughArgs { .. } => "not_enough_args",
            ValidationError::WrongArgCount { .. } => "wrong_arg_count",
            ValidationError::ProjectNotFound(_) => "project_not_found",
            ValidationError::PermissionDenied => "permission_denied",
            ValidationError::IllegalCommentatorType { .. } => "illegal_commentator_type",
            ValidationError::InvalidDuration { .. } => "invalid_duration",
            ValidationError::LookupFailed(_) => "lookup_failed",
        }
    }
}
