//! The inventory of known servers and credentials, and the matcher that selects targets from it.

use crate::core::auth::Auth;
use crate::core::query::Query;
use crate::core::server::{ServerRecord, Target, DEFAULT_PORT};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Everything mussh knows about: the credential table and the server list.
///
/// This type is typically parsed from an inventory file (see [crate::config]), but it can be
/// constructed programmatically as well.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Inventory {
    /// Credentials that servers can refer to by id.
    #[serde(default)]
    pub auths: Vec<Auth>,

    /// Order is preserved from the source file, and matching results follow it.
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
}

impl Inventory {
    /// Looks up a credential in the `auths` table by exact id.
    pub fn auth(&self, id: &str) -> Option<&Auth> {
        self.auths.iter().find(|auth| auth.id() == id)
    }

    /// Returns a [Target] for every server selected by `query`, in inventory order.
    ///
    /// - With [Query::all] set, every server matches.
    /// - Otherwise, if [Query::ids] is non-empty, a server matches if its id is any of them. A
    ///   server without an id never matches.
    /// - Otherwise, if [Query::tags] is non-empty, a server matches if it carries every one of
    ///   them.
    /// - An empty query matches every server. Callers that consider an empty query a mistake must
    ///   reject it before calling this method.
    ///
    /// Each target's credential is the server's inline `auth` if present, else the `auths` entry
    /// named by `authid`, else none. A dangling `authid` is not an error.
    ///
    /// ```
    /// # use mussh::core::{Inventory, Query};
    /// let inventory: Inventory = serde_yaml::from_str(
    ///     "servers:\n  - { id: a, hostname: a.local, tags: [web] }\n  - { id: b, hostname: b.local }",
    /// ).unwrap();
    /// let targets = inventory.matching(&Query::tags(["web"]));
    /// assert_eq!(1, targets.len());
    /// assert_eq!("a.local", targets[0].hostname);
    /// ```
    pub fn matching(&self, query: &Query) -> Vec<Target> {
        let credentials: IndexMap<&str, &Auth> =
            self.auths.iter().map(|auth| (auth.id(), auth)).collect();

        self.servers
            .iter()
            .filter(|server| is_match(server, query))
            .map(|server| resolve(server, &credentials))
            .collect()
    }
}

fn is_match(server: &ServerRecord, query: &Query) -> bool {
    if query.all || query.is_empty() {
        return true;
    }

    if !query.ids.is_empty() {
        return match &server.id {
            Some(id) => query.ids.contains(id),
            None => false,
        };
    }

    // A server with no tags falls out here naturally: the empty set is a superset of nothing but
    // the empty set.
    query.tags.is_subset(&server.tags)
}

fn resolve(server: &ServerRecord, credentials: &IndexMap<&str, &Auth>) -> Target {
    let auth = server.auth.clone().or_else(|| {
        server
            .authid
            .as_deref()
            .and_then(|id| credentials.get(id))
            .map(|auth| (*auth).clone())
    });

    Target {
        id: server.id.clone(),
        hostname: server.hostname.clone(),
        port: server.port.unwrap_or(DEFAULT_PORT),
        ip: server.ip,
        tags: server.tags.clone(),
        auth,
    }
}
