//! Which port does `ssh` use for a host?
//!
//! An explicit override wins. Otherwise the OpenSSH client configuration
//! files are asked in order, `Include` directives included, and the first
//! `Port` found is used.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use log::debug;
use ssh2_config::{ParseRule, SshConfig};

use crate::error::{Error, Result};

/// Port `ssh` falls back to when nothing else is configured.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// System-wide client configuration, consulted after the user's own.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/ssh/ssh_config";

/// Client config files to consult, most specific first.
#[must_use]
pub fn default_config_paths(home: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = home {
        paths.push(home.join(".ssh").join("config"));
    }
    paths.push(PathBuf::from(SYSTEM_CONFIG_PATH));
    paths
}

/// Parse the config file at `path`; `Ok(None)` if there is no such file.
/// Unknown and unsupported keywords are skipped.
fn load(path: &Path) -> std::result::Result<Option<SshConfig>, String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(format!("couldn't read {}: {e}", path.display())),
    };

    SshConfig::default()
        .parse(
            &mut BufReader::new(file),
            ParseRule::ALLOW_UNKNOWN_FIELDS | ParseRule::ALLOW_UNSUPPORTED_FIELDS,
        )
        .map(Some)
        .map_err(|e| format!("invalid {}: {e}", path.display()))
}

/// Work out the SSH port for `host`.
///
/// An explicit override wins, then the first `Port` found in `config_paths`,
/// then [`DEFAULT_SSH_PORT`].
pub fn resolve_port(explicit: Option<&str>, host: &str, config_paths: &[PathBuf]) -> Result<u16> {
    if let Some(port) = explicit.map(str::trim).filter(|p| !p.is_empty()) {
        debug!("Using SSH port {port} from the environment");
        return parse_port(host, port);
    }

    for path in config_paths {
        let config = load(path).map_err(|reason| Error::SshPort {
            host: host.to_string(),
            reason,
        })?;
        let Some(config) = config else {
            continue;
        };

        if let Some(port) = config.query(host).port {
            debug!("Using SSH port {port} from {}", path.display());
            if port == 0 {
                return Err(invalid_port(host, port));
            }
            return Ok(port);
        }
    }

    Ok(DEFAULT_SSH_PORT)
}

fn parse_port(host: &str, value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| invalid_port(host, value))
}

fn invalid_port(host: &str, value: impl std::fmt::Display) -> Error {
    Error::SshPort {
        host: host.to_string(),
        reason: format!("'{value}' is not a valid port"),
    }
}
