//! SQL schema definitions.

/// Complete schema for the Ringlet v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Actors
-- ============================================================

CREATE TABLE IF NOT EXISTS users (
    did TEXT PRIMARY KEY,
    handle TEXT,
    pds_url TEXT,
    created_at INTEGER NOT NULL,
    last_synced_at INTEGER
);

-- ============================================================
-- Rings & membership
-- ============================================================

CREATE TABLE IF NOT EXISTS rings (
    uri TEXT PRIMARY KEY,
    owner_did TEXT NOT NULL,
    admin_did TEXT NOT NULL,
    title TEXT NOT NULL,
    slug TEXT UNIQUE,
    description TEXT,
    acceptance_policy TEXT NOT NULL DEFAULT 'automatic',
    status TEXT NOT NULL DEFAULT 'open',
    banner_url TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rings_owner ON rings(owner_did);

CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_did TEXT NOT NULL,
    url TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    rss_url TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    UNIQUE (user_did, url)
);

CREATE TABLE IF NOT EXISTS memberships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ring_uri TEXT NOT NULL REFERENCES rings(uri) ON DELETE CASCADE,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    member_uri TEXT UNIQUE,
    status TEXT NOT NULL DEFAULT 'approved',
    widget_installed INTEGER,
    last_verified_at INTEGER,
    created_at INTEGER NOT NULL,
    UNIQUE (ring_uri, site_id)
);

CREATE INDEX IF NOT EXISTS idx_memberships_ring ON memberships(ring_uri, status);

CREATE TABLE IF NOT EXISTS join_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ring_uri TEXT NOT NULL REFERENCES rings(uri) ON DELETE CASCADE,
    user_did TEXT NOT NULL,
    site_url TEXT NOT NULL,
    site_title TEXT NOT NULL,
    rss_url TEXT,
    message TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    atproto_uri TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_ring ON join_requests(ring_uri, status);

-- ============================================================
-- Moderation
-- ============================================================

-- No foreign key on ring_uri: a block can reference a foreign-owned ring
-- that has not been synced yet.
CREATE TABLE IF NOT EXISTS block_records (
    uri TEXT PRIMARY KEY,
    ring_uri TEXT NOT NULL,
    subject_did TEXT NOT NULL,
    reason TEXT,
    created_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_blocks_ring ON block_records(ring_uri, subject_did);
"#;
