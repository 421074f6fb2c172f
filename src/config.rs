use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const GITLAB_ADDRESS: &str = "GITLAB_ADDRESS";
pub const GITLAB_GROUP: &str = "GITLAB_GROUP";
pub const GITLAB_USER_NAME: &str = "GITLAB_USER_NAME";
pub const GITLAB_EMAIL: &str = "GITLAB_EMAIL";
pub const GITLAB_TOKEN: &str = "GITLAB_TOKEN";
pub const BASE_REPO_DIR: &str = "BASE_REPO_DIR";
pub const GITLAB_SSH_PORT: &str = "GITLAB_SSH_PORT";
pub const SSH_KEY_PATH: &str = "SSH_KEY_PATH";

/// Reported when the repository name itself is empty (there is no variable for it).
pub const REPO_NAME: &str = "REPO_NAME";

/// Suffix every repository name carries once normalized.
pub const REPO_SUFFIX: &str = ".git";

/// Settings for a single publish run.
///
/// Built once per CLI invocation or per `POST /push` request and handed down
/// the call chain. The JSON names match the request body accepted in server
/// mode; fields missing from the body decode as empty and are caught by
/// [`Config::validate`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gitlab_address: String,
    pub gitlab_group: String,
    pub gitlab_user_name: String,
    pub gitlab_email: String,
    pub gitlab_token: String,
    pub base_repo_dir: String,
    pub repo_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_port: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment
    #[must_use]
    pub fn from_env(repo_name: &str) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), repo_name)
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F, repo_name: &str) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).unwrap_or_default();

        Self {
            gitlab_address: var(GITLAB_ADDRESS),
            gitlab_group: var(GITLAB_GROUP),
            gitlab_user_name: var(GITLAB_USER_NAME),
            gitlab_email: var(GITLAB_EMAIL),
            gitlab_token: var(GITLAB_TOKEN),
            base_repo_dir: var(BASE_REPO_DIR),
            repo_name: repo_name.to_string(),
            ssh_port: non_empty(lookup(GITLAB_SSH_PORT)),
            ssh_key_path: non_empty(lookup(SSH_KEY_PATH)).map(PathBuf::from),
        }
    }

    /// Fill the SSH overrides from the process environment when unset or blank.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.ssh_port = non_empty(self.ssh_port).or_else(|| non_empty(lookup(GITLAB_SSH_PORT)));

        let key_path = self
            .ssh_key_path
            .take()
            .filter(|path| !path.to_string_lossy().trim().is_empty());
        self.ssh_key_path =
            key_path.or_else(|| non_empty(lookup(SSH_KEY_PATH)).map(PathBuf::from));
        self
    }

    /// Names of every required setting that is empty, in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            (GITLAB_ADDRESS, &self.gitlab_address),
            (GITLAB_GROUP, &self.gitlab_group),
            (GITLAB_USER_NAME, &self.gitlab_user_name),
            (GITLAB_EMAIL, &self.gitlab_email),
            (GITLAB_TOKEN, &self.gitlab_token),
            (BASE_REPO_DIR, &self.base_repo_dir),
            (REPO_NAME, &self.repo_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration { missing })
        }
    }

    /// Return a copy whose repository name carries the `.git` suffix
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.repo_name = normalize_repo_name(&self.repo_name);
        self
    }

    /// Location of the local repository
    #[must_use]
    pub fn repo_path(&self) -> PathBuf {
        PathBuf::from(&self.base_repo_dir).join(&self.repo_name)
    }

    /// Browser-facing URL of the project
    #[must_use]
    pub fn public_url(&self) -> String {
        format!(
            "https://{}/{}/{}",
            self.gitlab_address, self.gitlab_group, self.repo_name
        )
    }

    /// URL the `origin` remote points at
    #[must_use]
    pub fn ssh_url(&self, port: u16) -> String {
        format!(
            "ssh://git@{}:{}/{}/{}",
            self.gitlab_address, port, self.gitlab_group, self.repo_name
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.gitlab_token.is_empty() {
            ""
        } else {
            "XXXXXXXXXX"
        };

        f.debug_struct("Config")
            .field("gitlab_address", &self.gitlab_address)
            .field("gitlab_group", &self.gitlab_group)
            .field("gitlab_user_name", &self.gitlab_user_name)
            .field("gitlab_email", &self.gitlab_email)
            .field("gitlab_token", &token)
            .field("base_repo_dir", &self.base_repo_dir)
            .field("repo_name", &self.repo_name)
            .field("ssh_port", &self.ssh_port)
            .field("ssh_key_path", &self.ssh_key_path)
            .finish()
    }
}

/// Append `.git` to a repository name unless it already ends with it.
#[must_use]
pub fn normalize_repo_name(name: &str) -> String {
    if name.ends_with(REPO_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{REPO_SUFFIX}")
    }
}

/// Repository name without the `.git` suffix, as GitLab wants the project path.
#[must_use]
pub fn project_path(name: &str) -> &str {
    name.strip_suffix(REPO_SUFFIX).unwrap_or(name)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
