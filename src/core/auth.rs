//! Types for representing login credentials.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A credential used to log into one or more servers.
///
/// Credentials live in the inventory's `auths` table, where servers refer to them by id, or inline
/// on a single server record.
///
/// # (De)serialization
///
/// The variant is chosen by a `type` field, matching the inventory file format:
///
/// ```
/// # use mussh::core::Auth;
/// let yaml = "{ id: deploy, type: rsa, username: deploy, keyPath: /home/me/.ssh/id_rsa }";
/// let auth: Auth = serde_yaml::from_str(yaml).unwrap();
/// assert_eq!("deploy", auth.id());
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", deny_unknown_fields)]
pub enum Auth {
    /// Log in with a static password.
    #[serde(rename = "password")]
    Password {
        id: String,
        username: String,
        password: String,

        /// Accepted for compatibility with older inventories. Not used.
        #[serde(
            default,
            rename = "askPass",
            alias = "ask_pass",
            skip_serializing_if = "Option::is_none"
        )]
        ask_pass: Option<String>,
    },

    /// Log in with a private key. The key file is read when the connection is made, not when the
    /// inventory is loaded.
    #[serde(rename = "rsa", alias = "key")]
    Key {
        id: String,
        username: String,
        #[serde(rename = "keyPath", alias = "key_path")]
        key_path: PathBuf,

        /// Accepted for compatibility with older inventories. Not used.
        #[serde(
            default,
            rename = "askPass",
            alias = "ask_pass",
            skip_serializing_if = "Option::is_none"
        )]
        ask_pass: Option<String>,
    },
}

impl Auth {
    /// The credential's id, unique within an inventory.
    pub fn id(&self) -> &str {
        match self {
            Auth::Password { id, .. } | Auth::Key { id, .. } => id,
        }
    }

    /// The remote user to log in as.
    pub fn username(&self) -> &str {
        match self {
            Auth::Password { username, .. } | Auth::Key { username, .. } => username,
        }
    }
}

// Passwords must never end up in logs.
impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Password { id, username, .. } => f
                .debug_struct("Password")
                .field("id", id)
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Auth::Key {
                id,
                username,
                key_path,
                ..
            } => f
                .debug_struct("Key")
                .field("id", id)
                .field("username", username)
                .field("key_path", key_path)
                .finish(),
        }
    }
}
