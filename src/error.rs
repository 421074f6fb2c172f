use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can stop a publish run.
#[derive(Debug, Error)]
pub enum Error {
    /// One or more required settings are empty.
    #[error("Missing var(s): {}", .missing.join(" "))]
    Configuration { missing: Vec<&'static str> },

    #[error("Invalid GitLab address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The GitLab API could not be reached.
    #[error("Request to {endpoint} failed")]
    Network {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The GitLab API answered, but not with something we can use.
    #[error("GitLab returned {status} for {endpoint}")]
    Api {
        endpoint: String,
        status: reqwest::StatusCode,
    },

    #[error("Namespace '{group}' not found on {address}")]
    NamespaceNotFound { group: String, address: String },

    #[error("Failed to create project '{name}' ({status}): {body}")]
    ProjectCreation {
        name: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to open repository: {}", .path.display())]
    RepositoryOpen {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("Failed to configure repository at {}", .path.display())]
    RepositoryConfig {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("Unable to resolve the SSH port for {host}: {reason}")]
    SshPort { host: String, reason: String },

    /// No usable SSH private key.
    #[error("{0}")]
    Credential(String),

    #[error("Failed to push to: {url}, error: {source}")]
    Push {
        url: String,
        #[source]
        source: git2::Error,
    },
}

impl Error {
    pub(crate) fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        // reqwest puts the full URL in its message, userinfo included
        Self::Network {
            endpoint: endpoint.into(),
            source: source.without_url(),
        }
    }

    pub(crate) fn repository_config(path: impl Into<PathBuf>, source: git2::Error) -> Self {
        Self::RepositoryConfig {
            path: path.into(),
            source,
        }
    }
}
