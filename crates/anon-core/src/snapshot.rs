//! Snapshot identity of a remote tree

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version marker of the remote tree at one point in time (a commit SHA for
/// git-backed providers). Cached content is only valid while the
/// registration's stored snapshot equals the live one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(String);

impl Snapshot {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Snapshot {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Snapshot {
    fn from(value: String) -> Self {
        Self(value)
    }
}
