use factory_core::ProviderSystem;
use providers::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl GitHubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound(_))
    }
}

impl From<octocrab::Error> for GitHubError {
    fn from(err: octocrab::Error) -> Self {
        match &err {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code.as_u16();
                if status == 404 {
                    GitHubError::NotFound(source.message.clone())
                } else {
                    GitHubError::Api {
                        status,
                        message: source.message.clone(),
                    }
                }
            }
            _ => GitHubError::Network(err.to_string()),
        }
    }
}

impl From<GitHubError> for ProviderError {
    fn from(err: GitHubError) -> Self {
        let system = ProviderSystem::Github;
        match err {
            GitHubError::Api { status, message } => {
                let rate_limited = status == 403 && message.to_lowercase().contains("rate limit");
                if rate_limited || status == 408 || status == 429 || status >= 500 {
                    ProviderError::transient(system, format!("HTTP {}: {}", status, message))
                } else {
                    ProviderError::rejected(system, format!("HTTP {}: {}", status, message))
                }
            }
            GitHubError::NotFound(message) => ProviderError::rejected(system, message),
            GitHubError::Config(message) => ProviderError::configuration(system, message),
            GitHubError::Network(message) => ProviderError::transient(system, message),
        }
    }
}

pub type Result<T> = std::result::Result<T, GitHubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_transient() {
        let err: ProviderError = GitHubError::Api {
            status: 502,
            message: "Bad Gateway".to_string(),
        }
        .into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_rate_limit_is_transient() {
        let err: ProviderError = GitHubError::Api {
            status: 403,
            message: "API rate limit exceeded".to_string(),
        }
        .into();
        assert!(err.is_transient());
    }

    #[test]
    fn test_validation_failure_is_rejected() {
        let err: ProviderError = GitHubError::Api {
            status: 422,
            message: "name already exists on this account".to_string(),
        }
        .into();
        assert!(matches!(err, ProviderError::Rejected { .. }));
    }

    #[test]
    fn test_missing_token_is_configuration() {
        let err: ProviderError = GitHubError::Config("GITHUB_TOKEN not set".to_string()).into();
        assert!(matches!(err, ProviderError::Configuration { .. }));
    }
}
