//! Types for selecting servers.

use std::collections::BTreeSet;

/// A selection over an inventory. See [crate::core::Inventory::matching] for the semantics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    /// Select servers whose id is any of these.
    pub ids: BTreeSet<String>,

    /// Select servers that carry every one of these tags.
    pub tags: BTreeSet<String>,

    /// Select every server, ignoring [Self::ids] and [Self::tags].
    pub all: bool,
}

impl Query {
    /// A query that selects every server.
    pub fn all() -> Self {
        Query {
            all: true,
            ..Default::default()
        }
    }

    /// A query that selects servers by id.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query {
            ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// A query that selects servers carrying all of `tags`.
    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Query {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Whether the query names no criteria at all.
    pub fn is_empty(&self) -> bool {
        !self.all && self.ids.is_empty() && self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_empty() {
        assert!(Query::default().is_empty());
        assert!(!Query::all().is_empty());
        assert!(!Query::ids(["a"]).is_empty());
        assert!(!Query::tags(["a"]).is_empty());
    }
}
