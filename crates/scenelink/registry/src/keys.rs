//! Key types shared by every registry node
//!
//! Internal keys belong to the viewer. External keys belong to the controlling
//! process, or are generated here when a node first appears.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed length of every generated external key
pub const EXTERNAL_KEY_LENGTH: usize = 16;

/// Identifier chosen by the viewer for one of its scene objects
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InternalKey(String);

impl InternalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "internal:{}", self.0)
    }
}

impl From<&str> for InternalKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier exposed to the controlling process, stable for a node's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalKey(String);

impl ExternalKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Generate a fresh key: the base-36 millisecond timestamp, padded with
    /// random alphanumerics up to [`EXTERNAL_KEY_LENGTH`].
    ///
    /// Collisions are not checked here; see
    /// [`IdentityRegistry`](crate::IdentityRegistry) for the checked variant.
    pub fn generate() -> Self {
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut key = to_base36(millis);
        key.truncate(EXTERNAL_KEY_LENGTH);

        let padding = EXTERNAL_KEY_LENGTH - key.len();
        key.extend(
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(padding)
                .map(char::from),
        );
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExternalKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identity of the engine object currently backing an internal key.
///
/// Two handles compare equal only if they name the same engine object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectHandle(u64);

impl ObjectHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The four levels of the scene hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Reference,
    Structure,
    Component,
    Representation,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Reference => "reference",
            NodeKind::Structure => "structure",
            NodeKind::Component => "component",
            NodeKind::Representation => "representation",
        };
        f.write_str(name)
    }
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_matches_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(1_700_000_000_000), "loyw3v28");
    }

    #[test]
    fn generated_key_has_fixed_length_and_alphabet() {
        let key = ExternalKey::generate();
        assert_eq!(key.as_str().len(), EXTERNAL_KEY_LENGTH);
        assert!(key.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn generated_key_starts_with_timestamp_prefix() {
        let before = to_base36(chrono::Utc::now().timestamp_millis() as u64);
        let key = ExternalKey::generate();
        // Same length prefix; the timestamp only moves forward within a test run.
        assert!(key.as_str()[..before.len()] >= before[..]);
    }

    #[test]
    fn keys_serialize_as_plain_strings() {
        let json = serde_json::to_string(&ExternalKey::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
        let kind = serde_json::to_string(&NodeKind::Representation).unwrap();
        assert_eq!(kind, "\"representation\"");
    }
}
