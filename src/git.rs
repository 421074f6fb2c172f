use git2::{BranchType, ConfigLevel, ErrorCode, Repository};
use log::debug;
use std::path::Path;

use crate::error::{Error, Result};

/// Name of the remote we publish through
pub const ORIGIN: &str = "origin";

/// Open an existing repository at exactly `path` (parents aren't searched)
pub fn open(path: &Path) -> Result<Repository> {
    Repository::open(path).map_err(|source| Error::RepositoryOpen {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the committer identity into the repository's local config
pub fn set_identity(repo: &Repository, name: &str, email: &str) -> Result<()> {
    let fail = |e| Error::repository_config(repo.path(), e);

    let mut local = repo
        .config()
        .and_then(|config| config.open_level(ConfigLevel::Local))
        .map_err(fail)?;
    local.set_str("user.name", name).map_err(fail)?;
    local.set_str("user.email", email).map_err(fail)?;
    Ok(())
}

/// Point `origin` at `url`, dropping whatever it pointed at before
pub fn replace_origin(repo: &Repository, url: &str) -> Result<()> {
    match repo.remote_delete(ORIGIN) {
        Ok(()) => debug!("Removed the existing {ORIGIN} remote"),
        Err(e) if e.code() == ErrorCode::NotFound => {}
        Err(e) => return Err(Error::repository_config(repo.path(), e)),
    }

    repo.remote(ORIGIN, url)
        .map_err(|e| Error::repository_config(repo.path(), e))?;
    debug!("{ORIGIN} now points at {url}");
    Ok(())
}

/// Current URL of `origin`, if the remote exists
#[must_use]
pub fn origin_url(repo: &Repository) -> Option<String> {
    repo.find_remote(ORIGIN)
        .ok()
        .and_then(|remote| remote.url().map(String::from))
}

/// `refs/heads/X:refs/heads/X` for every local branch
pub fn local_branch_refspecs(repo: &Repository) -> Result<Vec<String>> {
    let fail = |e| Error::repository_config(repo.path(), e);

    let mut refspecs = Vec::new();
    for branch in repo.branches(Some(BranchType::Local)).map_err(fail)? {
        let (branch, _) = branch.map_err(fail)?;
        if let Some(name) = branch.get().name() {
            refspecs.push(format!("{name}:{name}"));
        }
    }

    refspecs.sort();
    Ok(refspecs)
}
