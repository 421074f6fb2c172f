//! The publish run: make sure the GitLab project exists, point `origin` at it
//! and push.

use log::debug;
use std::fmt;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::forge::{self, Forge, GitLabClient};
use crate::git;
use crate::push::{self, PushOutcome, Pusher, SshKey, SshPusher};
use crate::ssh_config;
use crate::ui;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unconfigured,
    Validated,
    Checked,
    Created,
    Skipped,
    RemoteSet,
    Authenticated,
    Pushed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub public_url: String,
    pub ssh_url: String,
    pub created: bool,
    pub outcome: PushOutcome,
}

impl Report {
    /// One-line human summary
    #[must_use]
    pub fn summary(&self) -> String {
        let action = match self.outcome {
            PushOutcome::UpToDate => String::from("already up to date"),
            PushOutcome::Pushed { updated } => format!("pushed {updated} ref(s)"),
        };
        if self.created {
            format!("Created {} and {action}", self.public_url)
        } else {
            format!("{} {action}", self.public_url)
        }
    }
}

/// Drives one publish run against a [`Forge`] and a [`Pusher`].
pub struct Workflow<F, P> {
    forge: F,
    pusher: P,
    home: Option<PathBuf>,
}

impl<F: Forge, P: Pusher> Workflow<F, P> {
    pub fn new(forge: F, pusher: P) -> Self {
        Self {
            forge,
            pusher,
            home: dirs::home_dir(),
        }
    }

    /// Use `home` instead of the user's home directory when looking for SSH
    /// keys and `~/.ssh/config`.
    #[must_use]
    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    pub fn forge(&self) -> &F {
        &self.forge
    }

    pub fn pusher(&self) -> &P {
        &self.pusher
    }

    pub fn run(&self, config: Config) -> Result<Report> {
        let mut stage = Stage::Unconfigured;

        self.execute(config, &mut stage).inspect_err(|e| {
            debug!("{stage} -> {}: {e}", Stage::Failed);
        })
    }

    fn execute(&self, config: Config, stage: &mut Stage) -> Result<Report> {
        config.validate()?;
        let config = config.normalized();
        advance(stage, Stage::Validated);

        let port = ssh_config::resolve_port(
            config.ssh_port.as_deref(),
            &config.gitlab_address,
            &ssh_config::default_config_paths(self.home.as_deref()),
        )?;
        let ssh_url = config.ssh_url(port);
        let public_url = config.public_url();

        ui::print_info(&format!("Checking if Project \"{public_url}\" exists"));

        let repo_path = config.repo_path();
        if !repo_path.exists() {
            ui::print_warning(&format!(
                "Repository directory {} does not exist in {}",
                config.repo_name, config.base_repo_dir
            ));
        }

        let exists = self
            .forge
            .project_exists(&config.gitlab_group, &config.repo_name);
        advance(stage, Stage::Checked);

        let created = if exists {
            ui::print_info(&format!("Project {public_url} does exist"));
            advance(stage, Stage::Skipped);
            false
        } else {
            ui::print_info(&format!("Project {public_url} does not exist, creating..."));
            let namespace_id =
                forge::namespace_id(&self.forge, &config.gitlab_group, &config.gitlab_address)?;

            ui::print_info(&format!("Attempting to create Project {public_url}"));
            let project = self.forge.create_project(&config.repo_name, namespace_id)?;
            debug!("Created project #{} ({})", project.id, project.path_with_namespace);
            advance(stage, Stage::Created);
            true
        };

        let repo = git::open(&repo_path)?;
        git::set_identity(&repo, &config.gitlab_user_name, &config.gitlab_email)?;
        git::replace_origin(&repo, &ssh_url)?;
        advance(stage, Stage::RemoteSet);

        let key_path = push::resolve_key_path(config.ssh_key_path.as_deref(), self.home.as_deref())?;
        ui::print_info(&format!("Using identity: {}", key_path.display()));
        let key = SshKey::load(&key_path)?;
        advance(stage, Stage::Authenticated);

        let outcome = self.pusher.push(&repo, &key, &ssh_url)?;
        advance(stage, Stage::Pushed);

        Ok(Report {
            public_url,
            ssh_url,
            created,
            outcome,
        })
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!("{stage} -> {next}");
    *stage = next;
}

/// Run once against the real GitLab instance named in `config`.
pub fn run(config: Config) -> Result<Report> {
    config.validate()?;
    let forge = GitLabClient::new(&config)?;

    Workflow::new(forge, SshPusher).run(config)
}
