//! In-memory repository fake for tests.
//!
//! Holds per-actor record maps with deterministic rkey allocation, plus
//! per-actor failure injection so tests can exercise fault isolation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use ringlet_types::{AtUri, Did};

use crate::{PdsError, RepoRecord, RepoStore, Result};

type RecordKey = (String, String); // (collection, rkey)

#[derive(Default)]
struct Inner {
    repos: HashMap<String, BTreeMap<RecordKey, serde_json::Value>>,
    failing: HashSet<String>,
    next_rkey: u64,
}

/// An in-process stand-in for a fleet of actor repositories.
#[derive(Default)]
pub struct MemoryRepo {
    inner: Mutex<Inner>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record at a fixed rkey, returning its URI.
    pub fn seed(&self, repo: &Did, collection: &str, rkey: &str, value: serde_json::Value) -> AtUri {
        let mut inner = self.inner.lock().expect("memory repo lock");
        inner
            .repos
            .entry(repo.as_str().to_string())
            .or_default()
            .insert((collection.to_string(), rkey.to_string()), value);
        AtUri::new(repo.clone(), collection, rkey)
    }

    /// Make every call touching this actor's repository fail.
    pub fn fail_actor(&self, repo: &Did) {
        let mut inner = self.inner.lock().expect("memory repo lock");
        inner.failing.insert(repo.as_str().to_string());
    }

    /// Clear a failure injection.
    pub fn restore_actor(&self, repo: &Did) {
        let mut inner = self.inner.lock().expect("memory repo lock");
        inner.failing.remove(repo.as_str());
    }

    /// Number of records of one kind in an actor's repository.
    pub fn record_count(&self, repo: &Did, collection: &str) -> usize {
        let inner = self.inner.lock().expect("memory repo lock");
        inner
            .repos
            .get(repo.as_str())
            .map(|records| records.keys().filter(|(c, _)| c == collection).count())
            .unwrap_or(0)
    }

    fn check_available(inner: &Inner, repo: &str) -> Result<()> {
        if inner.failing.contains(repo) {
            return Err(PdsError::Unavailable(format!("{repo} is down")));
        }
        Ok(())
    }
}

#[async_trait]
impl RepoStore for MemoryRepo {
    async fn list_records(&self, repo: &Did, collection: &str) -> Result<Vec<RepoRecord>> {
        let inner = self.inner.lock().expect("memory repo lock");
        Self::check_available(&inner, repo.as_str())?;
        let records = inner
            .repos
            .get(repo.as_str())
            .map(|records| {
                records
                    .iter()
                    .filter(|((c, _), _)| c == collection)
                    .map(|((c, rkey), value)| RepoRecord {
                        uri: AtUri::new(repo.clone(), c, rkey),
                        cid: None,
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn get_record(&self, uri: &AtUri) -> Result<Option<RepoRecord>> {
        let inner = self.inner.lock().expect("memory repo lock");
        Self::check_available(&inner, uri.authority().as_str())?;
        let value = inner.repos.get(uri.authority().as_str()).and_then(|records| {
            records.get(&(uri.collection().to_string(), uri.rkey().to_string()))
        });
        Ok(value.map(|value| RepoRecord {
            uri: uri.clone(),
            cid: None,
            value: value.clone(),
        }))
    }

    async fn create_record(
        &self,
        repo: &Did,
        collection: &str,
        value: serde_json::Value,
    ) -> Result<AtUri> {
        let mut inner = self.inner.lock().expect("memory repo lock");
        Self::check_available(&inner, repo.as_str())?;
        inner.next_rkey += 1;
        let rkey = format!("rk{:04}", inner.next_rkey);
        inner
            .repos
            .entry(repo.as_str().to_string())
            .or_default()
            .insert((collection.to_string(), rkey.clone()), value);
        Ok(AtUri::new(repo.clone(), collection, &rkey))
    }

    async fn put_record(&self, uri: &AtUri, value: serde_json::Value) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory repo lock");
        Self::check_available(&inner, uri.authority().as_str())?;
        inner
            .repos
            .entry(uri.authority().as_str().to_string())
            .or_default()
            .insert(
                (uri.collection().to_string(), uri.rkey().to_string()),
                value,
            );
        Ok(())
    }

    async fn delete_record(&self, uri: &AtUri) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory repo lock");
        Self::check_available(&inner, uri.authority().as_str())?;
        if let Some(records) = inner.repos.get_mut(uri.authority().as_str()) {
            records.remove(&(uri.collection().to_string(), uri.rkey().to_string()));
        }
        Ok(())
    }
}
