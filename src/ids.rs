use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use std::{fmt::Display, ops::Deref};

/// Identity of the user owning a corpus. Always comes from the auth layer,
/// never from a request body.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct OwnerId(String);

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OwnerId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(OwnerId(s.to_string()))
    }
}

impl Deref for OwnerId {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<&str> for OwnerId {
    fn from(fr: &str) -> Self {
        OwnerId(fr.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(fr: String) -> Self {
        OwnerId(fr)
    }
}

impl From<OwnerId> for String {
    fn from(fr: OwnerId) -> Self {
        fr.0
    }
}

/// Store-internal tag identifier, scoped to one owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash)]
pub struct TagId(pub u64);

impl Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag#{}", self.0)
    }
}

/// Per-request correlation id used in log lines.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryId(String);

impl QueryId {
    #[inline]
    pub fn new() -> QueryId {
        QueryId(rusty_ulid::generate_ulid_string())
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for QueryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derives a bookmark id from its url, for corpus entries saved without one.
///
/// The same url always yields the same id, so ids survive reloads.
pub fn bookmark_id_for_url(url: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    let digest = hasher.finalize();

    digest[..16].iter().map(|byte| format!("{byte:02x}")).collect()
}
