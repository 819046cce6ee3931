pub mod client;
pub mod error;

pub use client::{GitHubClient, GitHubConfig};
pub use error::{GitHubError, Result};
