//! Whitelist authorization policy

use std::collections::HashSet;

use crate::config::WhitelistConfig;
use crate::model::Identity;

/// Allow-list of GitHub ids and logins.
///
/// Empty sets authorize nobody.
#[derive(Debug, Clone, Default)]
pub struct WhitelistPolicy {
    ids: HashSet<String>,
    logins: HashSet<String>,
}

impl WhitelistPolicy {
    pub fn new<I, L>(ids: I, logins: L) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            logins: logins.into_iter().map(Into::into).collect(),
        }
    }

    /// True iff the id is whitelisted or the login is whitelisted.
    pub fn is_authorized(&self, identity: &Identity) -> bool {
        self.ids.contains(&identity.id) || self.logins.contains(&identity.login)
    }
}

impl From<&WhitelistConfig> for WhitelistPolicy {
    fn from(config: &WhitelistConfig) -> Self {
        Self::new(config.ids.iter().cloned(), config.logins.iter().cloned())
    }
}
