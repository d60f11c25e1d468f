//! Ring traversal: next, previous, random.
//!
//! The member set is the ring's approved memberships' site URLs in join
//! order (membership creation time ascending, row id as the tiebreak). Pure
//! local-index reads; no remote calls on the navigation path.

use rand::seq::SliceRandom;
use rusqlite::Connection;

use ringlet_db::{queries, Result};
use ringlet_types::AtUri;

/// The site after `from` in the ring, wrapping at the end.
///
/// An unknown or absent `from` re-enters the ring at its first member; this
/// keeps widgets on external or just-removed sites working. Empty ring gives
/// `None`; a single member self-loops.
pub fn next_site(conn: &Connection, ring: &AtUri, from: Option<&str>) -> Result<Option<String>> {
    let urls = queries::memberships::approved_urls(conn, &ring.to_string())?;
    if urls.is_empty() {
        return Ok(None);
    }
    let index = match position(&urls, from) {
        Some(i) => (i + 1) % urls.len(),
        None => 0,
    };
    Ok(urls.into_iter().nth(index))
}

/// The site before `from` in the ring, wrapping at the start. An unknown
/// `from` wraps to the last member.
pub fn prev_site(conn: &Connection, ring: &AtUri, from: Option<&str>) -> Result<Option<String>> {
    let urls = queries::memberships::approved_urls(conn, &ring.to_string())?;
    if urls.is_empty() {
        return Ok(None);
    }
    let len = urls.len();
    let index = match position(&urls, from) {
        Some(i) => (i + len - 1) % len,
        None => len - 1,
    };
    Ok(urls.into_iter().nth(index))
}

/// A uniformly random member site of the ring, or of all active sites when
/// no ring is given. Each call is independent; repeats are possible.
pub fn random_site(conn: &Connection, ring: Option<&AtUri>) -> Result<Option<String>> {
    let urls = match ring {
        Some(ring) => queries::memberships::approved_urls(conn, &ring.to_string())?,
        None => queries::sites::active_urls(conn)?,
    };
    Ok(urls.choose(&mut rand::thread_rng()).cloned())
}

fn position(urls: &[String], from: Option<&str>) -> Option<usize> {
    from.and_then(|from| urls.iter().position(|url| url == from))
}
