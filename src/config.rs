//! Locates, reads, and validates inventory files.
//!
//! An inventory file is YAML with two optional top-level lists, `auths` and `servers`:
//!
//! ```yaml
//! auths:
//!   - id: deploy
//!     type: rsa
//!     username: deploy
//!     keyPath: ~/.ssh/id_rsa
//! servers:
//!   - id: web1
//!     hostname: web1.example.com
//!     tags: ['role:web', 'region:us']
//!     authid: deploy
//! ```

use crate::core::{Auth, Inventory};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Where to look for an inventory when none is named explicitly. The first file that exists wins.
pub const CONFIG_PATHS: [&str; 2] = ["~/.mussh/config.yaml", "./config.yaml"];

/// Replaces a leading `~` with the current user's home directory.
///
/// Paths that don't start with `~`, or `~user` forms, are returned unchanged. If the home
/// directory can't be determined, the path is also returned unchanged.
pub fn expand_tilde(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    let rest = match path.strip_prefix("~") {
        Ok(rest) => rest,
        Err(_) => return path.to_owned(),
    };

    match home::home_dir() {
        Some(mut home) => {
            // Pushing an empty path would append a trailing separator.
            if !rest.as_os_str().is_empty() {
                home.push(rest);
            }
            home
        }
        None => path.to_owned(),
    }
}

/// Loads the inventory the user asked for.
///
/// If `explicit` is given, that file must exist. Otherwise, [CONFIG_PATHS] are searched.
pub fn load(explicit: Option<&Path>) -> Result<Inventory, ConfigError> {
    match explicit {
        Some(path) => {
            let path = expand_tilde(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path));
            }
            load_file(&path)
        }
        None => search(&CONFIG_PATHS),
    }
}

/// Loads the first of `paths` that exists.
///
/// Returns an empty [Inventory] if none of them exist.
pub fn search(paths: &[impl AsRef<Path>]) -> Result<Inventory, ConfigError> {
    for path in paths {
        let path = expand_tilde(path);
        if path.exists() {
            return load_file(&path);
        }
        debug!(path = %path.display(), "no inventory here");
    }

    warn!("no inventory file found; no servers will match");
    Ok(Inventory::default())
}

/// Reads and parses a single inventory file.
pub fn load_file(path: &Path) -> Result<Inventory, ConfigError> {
    let yaml = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_owned(),
        source,
    })?;
    debug!(path = %path.display(), "loading inventory");
    parse(&yaml)
}

/// Parses and validates inventory YAML, then expands `~` in key paths.
pub fn parse(yaml: &str) -> Result<Inventory, ConfigError> {
    // serde_yaml refuses to build a struct from an empty document.
    if yaml.trim().is_empty() {
        return Ok(Inventory::default());
    }

    let mut inventory: Inventory = serde_yaml::from_str(yaml)?;
    validate(&inventory)?;

    for auth in inventory.auths.iter_mut() {
        expand_key_path(auth);
    }
    for server in inventory.servers.iter_mut() {
        if let Some(auth) = server.auth.as_mut() {
            expand_key_path(auth);
        }
    }

    Ok(inventory)
}

fn expand_key_path(auth: &mut Auth) {
    if let Auth::Key { key_path, .. } = auth {
        *key_path = expand_tilde(key_path.as_path());
    }
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-.]+$").expect("id pattern is a valid regex"))
}

/// Checks the rules serde can't express. Collects every violation instead of stopping at the first.
fn validate(inventory: &Inventory) -> Result<(), ConfigError> {
    let mut problems = Vec::new();

    let mut auth_ids = HashSet::new();
    for (i, auth) in inventory.auths.iter().enumerate() {
        check_auth(&format!("auths[{i}]"), auth, &mut problems);
        if !auth_ids.insert(auth.id()) {
            problems.push(format!("auths[{i}].id ({}) is a duplicate", auth.id()));
        }
    }

    let mut server_ids = HashSet::new();
    for (i, server) in inventory.servers.iter().enumerate() {
        let location = format!("servers[{i}]");

        if let Some(id) = &server.id {
            if !id_pattern().is_match(id) {
                problems.push(format!("{location}.id ({id}) contains invalid characters"));
            }
            if !server_ids.insert(id.as_str()) {
                // Selecting by a duplicated id selects every server carrying it, which is
                // surprising but well defined.
                warn!("{location}.id ({id}) is a duplicate");
            }
        }

        if server.hostname.trim().is_empty() {
            problems.push(format!("{location}.hostname is empty"));
        }

        if server.port == Some(0) {
            problems.push(format!("{location}.port (0) is out of range 1-65535"));
        }

        if let Some(auth) = &server.auth {
            check_auth(&format!("{location}.auth"), auth, &mut problems);
        }

        if let (None, Some(authid)) = (&server.auth, &server.authid) {
            if inventory.auth(authid).is_none() {
                warn!(
                    "{location}.authid ({authid}) names no credential; \
                     the local user name will be used"
                );
            }
        }
    }

    match problems.is_empty() {
        true => Ok(()),
        false => Err(ConfigError::Invalid(problems)),
    }
}

fn check_auth(location: &str, auth: &Auth, problems: &mut Vec<String>) {
    if !id_pattern().is_match(auth.id()) {
        problems.push(format!(
            "{location}.id ({}) contains invalid characters",
            auth.id()
        ));
    }
    if auth.username().trim().is_empty() {
        problems.push(format!("{location}.username is empty"));
    }
}
