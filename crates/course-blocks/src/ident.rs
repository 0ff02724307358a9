// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier types: block usage keys, course/user identity, version tokens.
use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};

/// Canonical 256-bit hash used for version tokens and content digests.
pub type Hash = [u8; 32];

/// Opaque identifier for one block of course content.
///
/// The engine only hashes, orders and compares usage keys. It never parses
/// them: the string form is whatever the content source hands out (for
/// example `block-v1:org+course+run+type@chapter+block@intro`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageKey(String);

impl UsageKey {
    /// Wraps a raw key.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UsageKey({})", self.0)
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UsageKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for UsageKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Opaque identity of the course a viewer is looking at.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseKey(String);

impl CourseKey {
    /// Wraps a raw course key.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable numeric identity of a viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

/// Opaque token naming one version of a root's content.
///
/// Cache entries are keyed by `(root, token)`; a token that differs from the
/// stored one is a miss.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct VersionToken(pub Hash);

impl VersionToken {
    /// Returns the canonical byte representation of this token.
    #[must_use]
    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Produces a stable, domain-separated version token (prefix `b"version:"`) using BLAKE3.
///
/// `marker` is typically the content source's last-modified marker for a root.
pub fn make_version_token(marker: &str) -> VersionToken {
    let mut hasher = Hasher::new();
    hasher.update(b"version:");
    hasher.update(marker.as_bytes());
    VersionToken(hasher.finalize().into())
}
