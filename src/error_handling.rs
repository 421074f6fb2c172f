use crate::error::Error;
use crate::ui;

/// Print a failed run's error chain with recovery hints for the kinds we recognise
pub fn report(err: &anyhow::Error) {
    let message = format!("{err:#}");

    match err.downcast_ref::<Error>() {
        Some(known) => ui::show_error_with_help(&message, &suggestions(known)),
        None => ui::print_error(&message),
    }
}

/// Recovery hints for an error, most useful first
#[must_use]
pub fn suggestions(err: &Error) -> Vec<&'static str> {
    match err {
        Error::Configuration { .. } => vec![
            "Export the variables listed above before running",
            "In server mode, include the matching snake_case fields in the JSON body",
        ],
        Error::InvalidAddress { .. } => {
            vec!["GITLAB_ADDRESS should be a bare host name such as gitlab.example.com"]
        }
        Error::Network { .. } | Error::Api { .. } => vec![
            "Check that GITLAB_ADDRESS is reachable over HTTPS",
            "Check that GITLAB_TOKEN is valid and has the api scope",
        ],
        Error::NamespaceNotFound { .. } => vec![
            "GITLAB_GROUP must be the group's full path, e.g. parent/child",
            "Make sure the token's user is a member of that group",
        ],
        Error::ProjectCreation { .. } => vec![
            "Make sure the token's user may create projects in the group",
            "The response body above usually names the offending field",
        ],
        Error::RepositoryOpen { .. } => vec![
            "The repository must already exist at BASE_REPO_DIR/<repo_name>.git",
            "Initialise it with: git init <path>",
        ],
        Error::RepositoryConfig { .. } => {
            vec!["Check that the repository's .git directory is writable"]
        }
        Error::SshPort { .. } => vec![
            "Set GITLAB_SSH_PORT to the instance's SSH port",
            "Or fix the Port entry in ~/.ssh/config",
        ],
        Error::Credential(_) => vec![
            "Point SSH_KEY_PATH at an unencrypted private key",
            "Or create ~/.ssh/id_ed25519: ssh-keygen -t ed25519",
        ],
        Error::Push { .. } => vec![
            "Test the connection: ssh -T -p <port> git@<GITLAB_ADDRESS>",
            "Make sure the key's public half is added to your GitLab account",
        ],
    }
}
