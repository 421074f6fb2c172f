//! Pushing local history to `origin` with an SSH key.

use git2::{Cred, CredentialType, PushOptions, RemoteCallbacks, Repository};
use log::{debug, warn};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::git;

/// Every GitLab SSH URL authenticates as this user
pub const SSH_USER: &str = "git";

/// Key files tried under `~/.ssh` when no explicit key is configured, in order
pub const DEFAULT_KEY_NAMES: [&str; 2] = ["id_ed25519", "id_rsa"];

/// How a push ended when it didn't fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The remote already had everything.
    UpToDate,
    /// `updated` refs moved on the remote.
    Pushed { updated: usize },
}

/// Something that can publish a repository's branches.
pub trait Pusher {
    fn push(&self, repo: &Repository, key: &SshKey, url: &str) -> Result<PushOutcome>;
}

/// An SSH private key that decodes without a passphrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKey {
    path: PathBuf,
}

impl SshKey {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Credential(format!(
                "Failed to read SSH private key {}: {e}",
                path.display()
            ))
        })?;

        // no passphrase is ever supplied, so encrypted keys are rejected here
        russh_keys::decode_secret_key(&contents, None).map_err(|e| {
            Error::Credential(format!(
                "Failed to parse SSH private key {}: {e}",
                path.display()
            ))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn credential(&self) -> std::result::Result<Cred, git2::Error> {
        Cred::ssh_key(SSH_USER, None, &self.path, None)
    }
}

/// Default key locations under `home`, most preferred first
#[must_use]
pub fn default_key_paths(home: &Path) -> Vec<PathBuf> {
    DEFAULT_KEY_NAMES
        .iter()
        .map(|name| home.join(".ssh").join(name))
        .collect()
}

/// Pick the private key to authenticate with.
///
/// An explicit path always wins over the defaults, even when a default key
/// exists. Otherwise the first existing file from [`default_key_paths`] is used.
pub fn resolve_key_path(explicit: Option<&Path>, home: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::Credential(format!(
            "SSH key {} (from SSH_KEY_PATH) does not exist",
            path.display()
        )));
    }

    home.map(default_key_paths)
        .unwrap_or_default()
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| Error::Credential(String::from("No SSH key found in default paths")))
}

/// Turn the raw result of a push into an outcome.
///
/// `Ok(0)` means nothing had to move. Every error is fatal and names the URL.
pub fn classify(result: std::result::Result<usize, git2::Error>, url: &str) -> Result<PushOutcome> {
    match result {
        Ok(0) => Ok(PushOutcome::UpToDate),
        Ok(updated) => Ok(PushOutcome::Pushed { updated }),
        Err(source) => Err(Error::Push {
            url: url.to_string(),
            source,
        }),
    }
}

/// [`Pusher`] that pushes every local branch to `origin` over SSH.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshPusher;

impl Pusher for SshPusher {
    fn push(&self, repo: &Repository, key: &SshKey, url: &str) -> Result<PushOutcome> {
        let refspecs = git::local_branch_refspecs(repo)?;
        if refspecs.is_empty() {
            warn!("{} has no local branches", repo.path().display());
            return Ok(PushOutcome::UpToDate);
        }
        debug!("Pushing {}", refspecs.join(", "));

        classify(push_refspecs(repo, key, &refspecs), url)
    }
}

fn push_refspecs(
    repo: &Repository,
    key: &SshKey,
    refspecs: &[String],
) -> std::result::Result<usize, git2::Error> {
    let mut remote = repo.find_remote(git::ORIGIN)?;
    let mut updated = 0;
    let mut rejected = Vec::new();

    {
        let mut attempts = 0;
        let mut callbacks = RemoteCallbacks::new();

        callbacks.credentials(|_url, _username, allowed| {
            if allowed == CredentialType::USERNAME {
                return Cred::username(SSH_USER);
            }
            attempts += 1;
            if attempts > 1 {
                return Err(git2::Error::from_str(&format!(
                    "the remote rejected {}",
                    key.path().display()
                )));
            }
            if !allowed.contains(CredentialType::SSH_KEY) {
                return Err(git2::Error::from_str(
                    "the remote doesn't accept SSH key authentication",
                ));
            }
            key.credential()
        });

        callbacks.push_negotiation(|updates| {
            updated = updates.iter().filter(|u| u.src() != u.dst()).count();
            Ok(())
        });

        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                rejected.push(format!("{refname} ({message})"));
            }
            Ok(())
        });

        callbacks.sideband_progress(|data| {
            let mut stdout = io::stdout();
            stdout.write_all(data).and_then(|()| stdout.flush()).is_ok()
        });

        callbacks.push_transfer_progress(|current, total, bytes| {
            if total > 0 {
                print!("\rWriting objects: {current}/{total} ({bytes} bytes)");
                if current == total {
                    println!();
                }
            }
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspecs: Vec<&str> = refspecs.iter().map(String::as_str).collect();
        remote.push(&refspecs, Some(&mut options))?;
    }

    remote.disconnect()?;

    if rejected.is_empty() {
        Ok(updated)
    } else {
        Err(git2::Error::from_str(&format!(
            "rejected {}",
            rejected.join(", ")
        )))
    }
}
