//! Exact-match version assignment for backends without native revisions.

use crate::core::Version;
use std::collections::HashMap;

/// Maps the last seen change token of each variable to a version.
///
/// A token is compared byte for byte with the previous one, and any difference
/// allocates a fresh version, so two distinct values can never share one.
#[derive(Debug, Default)]
pub(crate) struct VersionTable {
    next: u64,
    seen: HashMap<String, (Vec<u8>, Version)>,
}

impl VersionTable {
    /// Version for `token` as the current state of `name`.
    pub(crate) fn resolve(&mut self, name: &str, token: &[u8]) -> Version {
        if let Some((last, version)) = self.seen.get(name) {
            if last.as_slice() == token {
                return *version;
            }
        }
        self.next += 1;
        let version = Version::new(self.next);
        self.seen
            .insert(name.to_string(), (token.to_vec(), version));
        version
    }

    /// Forget `name`, e.g. after it was deleted.
    pub(crate) fn forget(&mut self, name: &str) {
        self.seen.remove(name);
    }
}
