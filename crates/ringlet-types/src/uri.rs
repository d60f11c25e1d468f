//! Actor and record identifiers.
//!
//! A [`Did`] is the stable, globally unique identifier of a participant. An
//! [`AtUri`] is the canonical identifier of a record, embedding the owning
//! actor and a record key: `at://<did>/<collection>/<rkey>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier parse failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UriError {
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("invalid record URI: {0}")]
    InvalidUri(String),
}

/// A decentralized identifier, e.g. `did:plc:ab12cd34`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Did(String);

impl Did {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Did {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // did:<method>:<identifier>, all segments non-empty
        let mut parts = s.splitn(3, ':');
        let (scheme, method, ident) = (parts.next(), parts.next(), parts.next());
        match (scheme, method, ident) {
            (Some("did"), Some(m), Some(i)) if !m.is_empty() && !i.is_empty() => {
                Ok(Did(s.to_string()))
            }
            _ => Err(UriError::InvalidDid(s.to_string())),
        }
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Did {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Did {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The canonical URI of a record: `at://<did>/<collection>/<rkey>`.
///
/// Immutable and globally unique. The authority segment is the DID of the
/// actor whose repository holds the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtUri {
    authority: Did,
    collection: String,
    rkey: String,
}

impl AtUri {
    pub fn new(authority: Did, collection: &str, rkey: &str) -> Self {
        Self {
            authority,
            collection: collection.to_string(),
            rkey: rkey.to_string(),
        }
    }

    /// The owning actor embedded in the URI.
    pub fn authority(&self) -> &Did {
        &self.authority
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn rkey(&self) -> &str {
        &self.rkey
    }
}

impl FromStr for AtUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix("at://")
            .ok_or_else(|| UriError::InvalidUri(s.to_string()))?;
        let mut parts = rest.splitn(3, '/');
        let authority = parts
            .next()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| UriError::InvalidUri(s.to_string()))?
            .parse::<Did>()
            .map_err(|_| UriError::InvalidUri(s.to_string()))?;
        let collection = parts
            .next()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| UriError::InvalidUri(s.to_string()))?;
        let rkey = parts
            .next()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| UriError::InvalidUri(s.to_string()))?;
        Ok(AtUri::new(authority, collection, rkey))
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.authority, self.collection, self.rkey)
    }
}

impl Serialize for AtUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AtUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_did_parse() {
        let did: Did = "did:plc:abc123".parse().expect("parse did");
        assert_eq!(did.as_str(), "did:plc:abc123");
    }

    #[test]
    fn test_did_rejects_garbage() {
        assert!("not-a-did".parse::<Did>().is_err());
        assert!("did:".parse::<Did>().is_err());
        assert!("did:plc".parse::<Did>().is_err());
        assert!("did::x".parse::<Did>().is_err());
    }

    #[test]
    fn test_at_uri_round_trip() {
        let raw = "at://did:plc:owner1/net.ringlet.ring/3kabc";
        let uri: AtUri = raw.parse().expect("parse uri");
        assert_eq!(uri.authority().as_str(), "did:plc:owner1");
        assert_eq!(uri.collection(), "net.ringlet.ring");
        assert_eq!(uri.rkey(), "3kabc");
        assert_eq!(uri.to_string(), raw);
    }

    #[test]
    fn test_at_uri_rejects_http() {
        assert!("https://example.com/ring/1".parse::<AtUri>().is_err());
    }

    #[test]
    fn test_at_uri_rejects_missing_segments() {
        assert!("at://did:plc:owner1".parse::<AtUri>().is_err());
        assert!("at://did:plc:owner1/net.ringlet.ring".parse::<AtUri>().is_err());
        assert!("at://did:plc:owner1/net.ringlet.ring/".parse::<AtUri>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let uri: AtUri = "at://did:plc:o/net.ringlet.ring/1".parse().expect("parse");
        let json = serde_json::to_string(&uri).expect("serialize");
        assert_eq!(json, "\"at://did:plc:o/net.ringlet.ring/1\"");
        let back: AtUri = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, uri);
    }
}
