use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid project slug '{slug}': {reason}")]
    InvalidSlug { slug: String, reason: String },

    #[error("Invalid provision state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown provision state: {0}")]
    UnknownState(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::InvalidSlug {
            slug: "Bad Slug".to_string(),
            reason: "uppercase".to_string(),
        };
        assert!(error.to_string().contains("Bad Slug"));
    }
}
