//! Ring domain enums and the unified dashboard view type.

use serde::{Deserialize, Serialize};

/// Whether a ring is accepting new members.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecruitmentStatus {
    #[default]
    Open,
    Closed,
}

/// Whether new memberships are created immediately or require approval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AcceptancePolicy {
    #[default]
    Automatic,
    Manual,
}

/// Local moderation status of a membership row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Pending,
    Approved,
    Suspended,
}

/// Status of a join request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RecruitmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

impl AcceptancePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "automatic" => Some(Self::Automatic),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// One entry of the unified per-user ring view.
///
/// Merges remotely-owned rings, remote memberships, and the local cache into
/// a single list with computed flags. Output ordering is the insertion order
/// of the merge (owned rings first, then membership-only rings); callers
/// needing presentation order must re-sort.
#[derive(Clone, Debug, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct RingSummary {
    /// Canonical ring URI.
    #[ts(type = "string")]
    pub uri: crate::AtUri,
    pub title: String,
    pub description: Option<String>,
    pub slug: Option<String>,
    pub status: RecruitmentStatus,
    pub policy: AcceptancePolicy,
    /// The viewing actor owns or administers this ring.
    pub is_admin: bool,
    /// The viewing actor holds a membership in this ring.
    pub is_member: bool,
    pub member_count: u32,
    pub pending_requests: u32,
    pub pending_members: u32,
    /// Site URL of the viewer's own membership, if any.
    pub member_site_url: Option<String>,
    /// URI of the viewer's membership sidecar record, if any.
    pub membership_uri: Option<String>,
}
