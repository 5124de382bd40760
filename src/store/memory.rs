//! In-memory object store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ObjectEntry, ObjectListing, ObjectStore};
use crate::error::StoreError;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Key to bytes map with delimiter-style listing.
///
/// Keys registered with [`MemoryStore::with_missing`] are listed but fail
/// to fetch with [`StoreError::NotFound`], as if deleted between listing
/// and fetching. Every fetch attempt is recorded.
#[derive(Debug)]
pub struct MemoryStore {
    objects: BTreeMap<String, Vec<u8>>,
    missing: BTreeSet<String>,
    page_size: usize,
    fetched: Mutex<Vec<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            missing: BTreeSet::new(),
            page_size: DEFAULT_PAGE_SIZE,
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Maximum entries (objects and prefixes) per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_object(mut self, key: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(key, bytes);
        self
    }

    /// Adds a key that is listed but cannot be fetched.
    pub fn with_missing(mut self, key: impl Into<String>) -> Self {
        self.missing.insert(key.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.insert(key.into(), bytes);
    }

    /// Keys passed to `get_object_bytes`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Entries directly under `prefix`, sorted by key.
    fn level(&self, prefix: &str) -> Vec<(String, Option<u64>)> {
        let mut entries: BTreeMap<String, Option<u64>> = BTreeMap::new();
        let sizes = self
            .objects
            .iter()
            .map(|(k, v)| (k, v.len() as u64))
            .chain(self.missing.iter().map(|k| (k, 0)));
        for (key, size) in sizes {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            match rest.find('/') {
                Some(idx) => {
                    entries.insert(format!("{}{}", prefix, &rest[..=idx]), None);
                }
                None => {
                    entries.insert(key.clone(), Some(size));
                }
            }
        }
        entries.into_iter().collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<ObjectListing, StoreError> {
        let offset = match token {
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| StoreError::InvalidToken(t.to_string()))?,
            None => 0,
        };
        let level = self.level(prefix);
        let end = (offset + self.page_size).min(level.len());

        let mut listing = ObjectListing::default();
        for (key, size) in level.iter().skip(offset).take(end.saturating_sub(offset)) {
            match size {
                Some(size) => listing.objects.push(ObjectEntry::new(key.clone(), *size)),
                None => listing.prefixes.push(key.clone()),
            }
        }
        if end < level.len() {
            listing.next_token = Some(end.to_string());
        }
        Ok(listing)
    }

    async fn get_object_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.fetched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(key.to_string());
        if self.missing.contains(key) {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn describe(&self) -> String {
        format!("memory ({} objects)", self.objects.len())
    }
}
