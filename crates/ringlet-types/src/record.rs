//! Remote record shapes and the ingestion parse step.
//!
//! Records come out of actor repositories as loose JSON, possibly written by
//! older clients. Parsing happens exactly once, at ingestion, producing a
//! tagged result: a canonical shape, a recovered shape (a known malformation
//! was repaired), or an unrecoverable reject. Downstream code never
//! re-validates.

use serde::{Deserialize, Serialize};

use crate::ring::{AcceptancePolicy, RecruitmentStatus};
use crate::uri::{AtUri, Did};

/// A participant's web property as carried inside membership and join
/// request records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRef {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rss: Option<String>,
}

/// Wire shape of a `net.ringlet.ring` record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RingRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default)]
    pub status: RecruitmentStatus,
    #[serde(default)]
    pub policy: AcceptancePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
    pub created_at: String,
}

/// Wire shape of a `net.ringlet.membership` record.
///
/// `ring` holds the canonical ring URI, except in records written by legacy
/// clients, where it may hold an HTTP browse URL instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRecord {
    pub ring: String,
    pub site: SiteRef,
    /// DID of the member. Present in ring-space copies (which live in the
    /// ring owner's repo); absent in sidecars, where the repo owner is the
    /// member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub created_at: String,
}

/// Wire shape of a `net.ringlet.joinRequest` record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestRecord {
    pub ring: String,
    pub site: SiteRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: String,
}

/// Wire shape of a `net.ringlet.block` record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRecord {
    pub ring: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Outcome of the one-time ingestion parse.
#[derive(Clone, Debug)]
pub enum RecordShape<T> {
    /// The record matched its canonical shape.
    Valid(T),
    /// A known malformation was repaired (e.g. browse-URL ring reference).
    Recovered(T),
    /// The record cannot be used; carries a reason for the sync error log.
    Unrecoverable(String),
}

impl<T> RecordShape<T> {
    /// The canonical value, whether parsed directly or recovered.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Valid(v) | Self::Recovered(v) => Some(v),
            Self::Unrecoverable(_) => None,
        }
    }
}

/// Canonical form of a ring record, timestamps resolved.
#[derive(Clone, Debug)]
pub struct CanonicalRing {
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub status: RecruitmentStatus,
    pub policy: AcceptancePolicy,
    pub admin: Option<Did>,
    pub banner: Option<String>,
    pub created_at: u64,
}

/// Canonical form of a membership record.
#[derive(Clone, Debug)]
pub struct CanonicalMembership {
    pub ring: AtUri,
    pub site: SiteRef,
    /// The member, when the record names one explicitly (ring-space copies).
    /// Sidecars leave it `None`; the repo owner is the member.
    pub subject: Option<Did>,
    pub created_at: u64,
}

/// Canonical form of a block record.
#[derive(Clone, Debug)]
pub struct CanonicalBlock {
    pub ring: AtUri,
    pub subject: Did,
    pub reason: Option<String>,
    /// None when the record timestamp was absent or unparseable.
    pub created_at: Option<u64>,
}

/// Recover a canonical ring URI from a possibly-malformed reference.
///
/// Historical records stored an HTTP browse URL in the ring-reference field
/// instead of the canonical URI. Those URLs carry the real URI in a `ring=`
/// query parameter, which is extracted and used if it parses. Anything else
/// is unrecoverable.
pub fn recover_ring_uri(raw: &str) -> Option<AtUri> {
    if let Ok(uri) = raw.parse::<AtUri>() {
        return Some(uri);
    }
    let parsed = url::Url::parse(raw).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "ring")
        .and_then(|(_, value)| value.parse::<AtUri>().ok())
}

/// Parse an RFC 3339 timestamp into unix seconds.
pub fn parse_timestamp(raw: &str) -> Option<u64> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp().max(0) as u64)
}

/// Parse a ring record value into its canonical form.
///
/// `now` is the fallback creation time when the record timestamp is
/// unparseable.
pub fn parse_ring(value: &serde_json::Value, now: u64) -> RecordShape<CanonicalRing> {
    let record: RingRecord = match serde_json::from_value(value.clone()) {
        Ok(r) => r,
        Err(e) => return RecordShape::Unrecoverable(format!("bad ring record: {e}")),
    };
    let admin = match &record.admin {
        Some(raw) => match raw.parse::<Did>() {
            Ok(did) => Some(did),
            Err(_) => return RecordShape::Unrecoverable(format!("bad admin did: {raw}")),
        },
        None => None,
    };
    RecordShape::Valid(CanonicalRing {
        created_at: parse_timestamp(&record.created_at).unwrap_or(now),
        title: record.title,
        description: record.description,
        slug: record.slug,
        status: record.status,
        policy: record.policy,
        admin,
        banner: record.banner,
    })
}

/// Parse a membership sidecar value, repairing legacy ring references.
pub fn parse_membership(value: &serde_json::Value, now: u64) -> RecordShape<CanonicalMembership> {
    let record: MembershipRecord = match serde_json::from_value(value.clone()) {
        Ok(r) => r,
        Err(e) => return RecordShape::Unrecoverable(format!("bad membership record: {e}")),
    };
    let recovered = record.ring.parse::<AtUri>().is_err();
    let ring = match recover_ring_uri(&record.ring) {
        Some(uri) => uri,
        None => {
            return RecordShape::Unrecoverable(format!(
                "unrecoverable ring reference: {}",
                record.ring
            ))
        }
    };
    let subject = match &record.subject {
        Some(raw) => match raw.parse::<Did>() {
            Ok(did) => Some(did),
            Err(_) => return RecordShape::Unrecoverable(format!("bad subject did: {raw}")),
        },
        None => None,
    };
    let canonical = CanonicalMembership {
        ring,
        subject,
        created_at: parse_timestamp(&record.created_at).unwrap_or(now),
        site: record.site,
    };
    if recovered {
        RecordShape::Recovered(canonical)
    } else {
        RecordShape::Valid(canonical)
    }
}

/// Parse a block record value. The creation time resolves to `None` when
/// absent or unparseable.
pub fn parse_block(value: &serde_json::Value) -> RecordShape<CanonicalBlock> {
    let record: BlockRecord = match serde_json::from_value(value.clone()) {
        Ok(r) => r,
        Err(e) => return RecordShape::Unrecoverable(format!("bad block record: {e}")),
    };
    let recovered = record.ring.parse::<AtUri>().is_err();
    let ring = match recover_ring_uri(&record.ring) {
        Some(uri) => uri,
        None => {
            return RecordShape::Unrecoverable(format!(
                "unrecoverable ring reference: {}",
                record.ring
            ))
        }
    };
    let subject = match record.subject.parse::<Did>() {
        Ok(did) => did,
        Err(_) => {
            return RecordShape::Unrecoverable(format!("bad subject did: {}", record.subject))
        }
    };
    let canonical = CanonicalBlock {
        ring,
        subject,
        reason: record.reason,
        created_at: record.created_at.as_deref().and_then(parse_timestamp),
    };
    if recovered {
        RecordShape::Recovered(canonical)
    } else {
        RecordShape::Valid(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    #[test]
    fn test_recover_canonical_uri_passthrough() {
        let uri = recover_ring_uri("at://did:plc:owner/net.ringlet.ring/3k").expect("recover");
        assert_eq!(uri.rkey(), "3k");
    }

    #[test]
    fn test_recover_browse_url() {
        let uri = recover_ring_uri(
            "https://rings.example/view?foo=1&ring=at://did:plc:owner/net.ringlet.ring/3k",
        )
        .expect("recover");
        assert_eq!(uri.authority().as_str(), "did:plc:owner");
        assert_eq!(uri.rkey(), "3k");
    }

    #[test]
    fn test_recover_rejects_url_without_ring_param() {
        assert!(recover_ring_uri("https://rings.example/view?id=7").is_none());
        assert!(recover_ring_uri("ftp://rings.example/?ring=at://did:plc:o/c/r").is_none());
        assert!(recover_ring_uri("garbage").is_none());
    }

    #[test]
    fn test_parse_membership_valid() {
        let value = serde_json::json!({
            "ring": "at://did:plc:owner/net.ringlet.ring/3k",
            "site": {"url": "https://a.example", "title": "A"},
            "createdAt": "2023-11-14T22:13:20Z",
        });
        match parse_membership(&value, NOW) {
            RecordShape::Valid(m) => {
                assert_eq!(m.site.url, "https://a.example");
                assert_eq!(m.created_at, 1_700_000_000);
            }
            other => panic!("expected Valid, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_membership_recovers_browse_url() {
        let value = serde_json::json!({
            "ring": "https://host/view?ring=at://did:plc:owner/net.ringlet.ring/3k",
            "site": {"url": "https://a.example", "title": "A"},
            "createdAt": "2023-11-14T22:13:20Z",
        });
        match parse_membership(&value, NOW) {
            RecordShape::Recovered(m) => {
                assert_eq!(m.ring.to_string(), "at://did:plc:owner/net.ringlet.ring/3k");
            }
            other => panic!("expected Recovered, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_membership_unrecoverable() {
        let value = serde_json::json!({
            "ring": "https://host/view?id=9",
            "site": {"url": "https://a.example", "title": "A"},
            "createdAt": "2023-11-14T22:13:20Z",
        });
        assert!(matches!(
            parse_membership(&value, NOW),
            RecordShape::Unrecoverable(_)
        ));
    }

    #[test]
    fn test_parse_ring_defaults() {
        let value = serde_json::json!({
            "title": "Indie Circle",
            "createdAt": "2023-11-14T22:13:20Z",
        });
        let ring = parse_ring(&value, NOW).into_value().expect("parse");
        assert_eq!(ring.status, RecruitmentStatus::Open);
        assert_eq!(ring.policy, AcceptancePolicy::Automatic);
        assert!(ring.admin.is_none());
    }

    #[test]
    fn test_parse_ring_bad_timestamp_falls_back() {
        let value = serde_json::json!({"title": "R", "createdAt": "not-a-date"});
        let ring = parse_ring(&value, NOW).into_value().expect("parse");
        assert_eq!(ring.created_at, NOW);
    }

    #[test]
    fn test_parse_block_missing_timestamp_is_null() {
        let value = serde_json::json!({
            "ring": "at://did:plc:owner/net.ringlet.ring/3k",
            "subject": "did:plc:spammer",
        });
        let block = parse_block(&value).into_value().expect("parse");
        assert_eq!(block.created_at, None);
        assert_eq!(block.subject.as_str(), "did:plc:spammer");
    }

    #[test]
    fn test_parse_block_unparseable_timestamp_is_null() {
        let value = serde_json::json!({
            "ring": "at://did:plc:owner/net.ringlet.ring/3k",
            "subject": "did:plc:spammer",
            "createdAt": "yesterday",
        });
        let block = parse_block(&value).into_value().expect("parse");
        assert_eq!(block.created_at, None);
    }
}
