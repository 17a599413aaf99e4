//! Centralized artifact naming and ownership checks.
//!
//! Every converted artifact is stored flat in one directory under a name that
//! embeds its owner:
//!
//! ```text
//! {owner}_{token}_{timestamp}.webp
//! user_3f9a0c1b2d4e5f60_18c2a4f9e01b27d3a9f4e_1760700000.webp
//! ```
//!
//! The file name is the only ownership record. There is no index and no
//! database, so the same parser must be used everywhere a name is checked:
//! listing, download, delete, and bundling all go through an [`Authorizer`].
//!
//! ## Canonicalisation
//!
//! Caller-supplied names are reduced to their last path component before any
//! check. `../../etc/passwd` becomes `passwd`, which never carries an owner
//! prefix, so traversal attempts fail closed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Extension of every stored artifact.
pub const ARTIFACT_EXTENSION: &str = "webp";

/// Prefix used for generated owner identifiers.
const OWNER_PREFIX: &str = "user_";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NamingError {
    #[error("Invalid owner identifier: {0:?}")]
    InvalidOwner(String),
}

/// Opaque per-session identifier.
///
/// Only characters that are safe inside a file name are accepted, so an owner
/// can be embedded in artifact names verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Owner(String);

impl Owner {
    pub fn new(id: impl Into<String>) -> Result<Self, NamingError> {
        let id = id.into();
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if valid {
            Ok(Self(id))
        } else {
            Err(NamingError::InvalidOwner(id))
        }
    }

    /// Issue a fresh identifier: `user_` followed by 16 random hex digits.
    pub fn generate() -> Self {
        let bits: u64 = rand::rng().random();
        Self(format!("{OWNER_PREFIX}{bits:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `{owner}_` prefix every owned artifact name starts with.
    pub fn name_prefix(&self) -> String {
        format!("{}_", self.0)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Owner {
    type Error = NamingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.0
    }
}

/// Build the stored file name for an artifact.
///
/// `timestamp` is Unix seconds. The token must not contain `_`; tokens from
/// [`generate_token`] never do.
pub fn artifact_name(owner: &Owner, token: &str, timestamp: u64) -> String {
    format!("{owner}_{token}_{timestamp}.{ARTIFACT_EXTENSION}")
}

/// Collision-resistant token: microsecond clock plus 32 random bits, all hex.
///
/// Two conversions by the same owner in the same second differ in both the
/// clock part and the random part.
pub fn generate_token() -> String {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or_default();
    let salt: u32 = rand::rng().random();
    format!("{micros:013x}{salt:08x}")
}

/// Unix seconds for a point in time; times before the epoch map to 0.
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Reduce a caller-supplied name to its final path component.
///
/// Both `/` and `\` count as separators. Returns `None` for names that do not
/// denote a file (`""`, `"."`, `".."`, or a trailing separator).
pub fn base_name(name: &str) -> Option<&str> {
    let last = name.rsplit(['/', '\\']).next()?;
    match last {
        "" | "." | ".." => None,
        other => Some(other),
    }
}

/// Parsed form of an artifact name, relative to a known owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArtifactName<'a> {
    pub token: &'a str,
    pub timestamp: u64,
}

/// Parse `{owner}_{token}_{timestamp}.webp` for a specific owner.
///
/// Returns `None` unless the name belongs to `owner` and the remainder after
/// the owner prefix is exactly one underscore-free token and a decimal
/// timestamp.
pub fn parse_artifact_name<'a>(owner: &Owner, name: &'a str) -> Option<ParsedArtifactName<'a>> {
    let rest = name.strip_prefix(owner.as_str())?.strip_prefix('_')?;
    let stem = rest
        .strip_suffix(ARTIFACT_EXTENSION)?
        .strip_suffix('.')?;
    let (token, timestamp) = stem.split_once('_')?;
    if token.is_empty()
        || timestamp.is_empty()
        || !timestamp.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Some(ParsedArtifactName {
        token,
        timestamp: timestamp.parse().ok()?,
    })
}

/// Decides whether an owner may read or mutate a stored file.
///
/// Callers pass raw, untrusted names; implementations must canonicalise.
pub trait Authorizer: Send + Sync {
    fn is_authorized(&self, owner: &Owner, file_name: &str) -> bool;
}

/// The file-name prefix scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixAuthorizer;

impl Authorizer for PrefixAuthorizer {
    fn is_authorized(&self, owner: &Owner, file_name: &str) -> bool {
        let Some(name) = base_name(file_name) else {
            return false;
        };
        name.starts_with(&owner.name_prefix()) && parse_artifact_name(owner, name).is_some()
    }
}
