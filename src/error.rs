//! Error types for mussh.
//!
//! Loading an inventory fails with a [ConfigError]. A single remote session fails with a
//! [SessionError]; such failures are isolated to that session and never abort its siblings.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while locating, reading, or validating an inventory file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read the config file from disk.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML or does not have the inventory's shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The file parsed but violates one or more schema rules. Every violation is listed.
    #[error("config is invalid:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

/// A fatal failure of one remote session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The host could not be reached, refused the connection, or did not become ready in time.
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// The host rejected every authentication method offered.
    #[error("authentication failed for {username}@{address}: {reason}")]
    Authentication {
        username: String,
        address: String,
        reason: String,
    },

    /// The private key named by the credential could not be read.
    #[error("failed to read private key {}: {source}", path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script file could not be read.
    #[error("failed to read script {}: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote host would not run the command, e.g. the channel could not be opened.
    #[error("failed to execute command: {0}")]
    Exec(String),

    /// The connection broke after it was established.
    #[error("transport error: {0}")]
    Transport(String),

    /// No credential was given and the local user name could not be determined.
    #[error("no username configured and the local user name is unknown")]
    NoUsername,

    /// Reading an answer from, or writing to, the local terminal failed.
    #[error("terminal interaction failed: {0}")]
    Console(String),
}
