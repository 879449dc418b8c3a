//! Types for representing servers, both as written in the inventory and as resolved for a session.

use crate::core::auth::Auth;
#[cfg(doc)]
use crate::core::inventory::Inventory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The port used when a server record doesn't name one.
pub const DEFAULT_PORT: u16 = 22;

/// Which IP protocol to use when a host name resolves to both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    V4,
    V6,
}

/// A server as written in the inventory file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerRecord {
    /// Optional identifier. Only servers with an id can be selected by id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub hostname: String,

    /// Defaults to [DEFAULT_PORT].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpFamily>,

    /// Order is irrelevant.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    /// An inline credential. Takes precedence over [Self::authid].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,

    /// The id of a credential in the inventory's `auths` table.
    #[serde(
        default,
        alias = "authRef",
        alias = "auth_ref",
        skip_serializing_if = "Option::is_none"
    )]
    pub authid: Option<String>,
}

/// A fully resolved server that one session will run against.
///
/// Produced by [Inventory::matching]. Never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Target {
    pub id: Option<String>,
    pub hostname: String,
    pub port: u16,
    pub ip: Option<IpFamily>,
    pub tags: BTreeSet<String>,

    /// The credential after resolving inline and referenced credentials. [None] means the session
    /// logs in as the local user and relies on interactive authentication.
    pub auth: Option<Auth>,
}

impl Target {
    /// The name shown next to this target's output: its id, or its host name if it has no id.
    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.hostname)
    }

    /// `hostname:port`, suitable for error messages.
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}
