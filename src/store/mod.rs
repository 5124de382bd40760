//! Hierarchical, paginated object stores.
//!
//! The traversal driver only needs two calls: list one page under a prefix,
//! and fetch the bytes of one object. [`ObjectStore`] is that seam, with
//! three implementations:
//!
//! - [`S3Store`]: anonymous ListObjectsV2 against a public bucket
//! - [`LocalStore`]: a directory tree on disk
//! - [`MemoryStore`]: an in-process map, for tests and dry runs
//!
//! Listings are delimiter-based: each page holds the objects directly under
//! the prefix plus the sub-prefixes one level down.

mod local;
mod memory;
mod s3;

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::{S3Store, S3StoreConfig};

/// Storage class reported for a listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    Standard,
    /// Prefix marker ("directory"); never fetched, always descended into.
    Directory,
    Other,
}

impl StorageClass {
    pub fn parse(value: &str) -> Self {
        match value {
            "STANDARD" | "" => StorageClass::Standard,
            "DIRECTORY" => StorageClass::Directory,
            _ => StorageClass::Other,
        }
    }
}

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub storage_class: StorageClass,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            storage_class: StorageClass::Standard,
        }
    }

    pub fn directory(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size: 0,
            storage_class: StorageClass::Directory,
        }
    }
}

/// Entry of a listing page, in the order the driver should visit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEntry {
    Object(ObjectEntry),
    Prefix(String),
}

/// One page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectListing {
    pub objects: Vec<ObjectEntry>,
    pub prefixes: Vec<String>,
    /// Token for the next page of the same prefix, if any.
    pub next_token: Option<String>,
}

impl ObjectListing {
    /// Flattens the page into visit order: objects as listed, with
    /// directory-class objects turned into prefixes, then common prefixes.
    pub fn into_entries(self) -> Vec<PageEntry> {
        let mut entries = Vec::with_capacity(self.objects.len() + self.prefixes.len());
        for object in self.objects {
            if object.storage_class == StorageClass::Directory {
                entries.push(PageEntry::Prefix(object.key));
            } else {
                entries.push(PageEntry::Object(object));
            }
        }
        entries.extend(self.prefixes.into_iter().map(PageEntry::Prefix));
        entries
    }
}

/// A paginated, hierarchical object namespace.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Lists one page of entries directly under `prefix`.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Namespace prefix; empty string for the root
    /// * `token` - Continuation token from the previous page
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<ObjectListing, StoreError>;

    /// Fetches the full contents of one object.
    ///
    /// Returns [`StoreError::NotFound`] if the key no longer exists.
    async fn get_object_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Opens the local directory store when `local_root` is set, otherwise the
/// S3 bucket described by `s3`.
pub fn open_store(local_root: Option<&Path>, s3: &S3StoreConfig) -> Box<dyn ObjectStore> {
    match local_root {
        Some(root) => Box::new(LocalStore::new(root).with_page_size(s3.page_size)),
        None => Box::new(S3Store::new(s3.clone())),
    }
}

/// Checks the store is reachable and returns the first object key found
/// under `prefix`, descending into sub-prefixes as needed.
pub async fn first_object_key(store: &dyn ObjectStore, prefix: &str) -> Result<Option<String>, StoreError> {
    let mut pending = vec![prefix.to_string()];
    while let Some(current) = pending.pop() {
        let mut token: Option<String> = None;
        let mut children = Vec::new();
        loop {
            let listing = store.list_page(&current, token.as_deref()).await?;
            token = listing.next_token.clone();
            for entry in listing.into_entries() {
                match entry {
                    PageEntry::Object(object) => return Ok(Some(object.key)),
                    PageEntry::Prefix(p) => children.push(p),
                }
            }
            if token.is_none() {
                break;
            }
        }
        pending.extend(children.into_iter().rev());
    }
    Ok(None)
}

/// Every sub-prefix directly under `prefix`, across all listing pages.
pub async fn list_prefixes(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<String>, StoreError> {
    let mut prefixes = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let listing = store.list_page(prefix, token.as_deref()).await?;
        token = listing.next_token.clone();
        prefixes.extend(listing.into_entries().into_iter().filter_map(|entry| match entry {
            PageEntry::Prefix(p) => Some(p),
            PageEntry::Object(_) => None,
        }));
        if token.is_none() {
            return Ok(prefixes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_objects_become_prefixes() {
        let listing = ObjectListing {
            objects: vec![
                ObjectEntry::new("a/1.dcm", 10),
                ObjectEntry::directory("a/sub/"),
            ],
            prefixes: vec!["a/other/".to_string()],
            next_token: None,
        };
        assert_eq!(
            listing.into_entries(),
            vec![
                PageEntry::Object(ObjectEntry::new("a/1.dcm", 10)),
                PageEntry::Prefix("a/sub/".to_string()),
                PageEntry::Prefix("a/other/".to_string()),
            ]
        );
    }

    #[test]
    fn test_storage_class_parse() {
        assert_eq!(StorageClass::parse("DIRECTORY"), StorageClass::Directory);
        assert_eq!(StorageClass::parse("STANDARD"), StorageClass::Standard);
        assert_eq!(StorageClass::parse("GLACIER"), StorageClass::Other);
    }

    #[tokio::test]
    async fn test_first_object_key_descends() {
        let store = MemoryStore::new()
            .with_object("x/y/z/first.dcm", vec![1])
            .with_object("x/y/z/second.dcm", vec![2]);
        let found = first_object_key(&store, "x/").await.unwrap();
        assert_eq!(found.as_deref(), Some("x/y/z/first.dcm"));
    }

    #[tokio::test]
    async fn test_list_prefixes_spans_pages() {
        let store = MemoryStore::new()
            .with_page_size(2)
            .with_object("top.dcm", vec![0])
            .with_object("a/1.dcm", vec![1])
            .with_object("b/1.dcm", vec![2])
            .with_object("c/d/1.dcm", vec![3]);
        let prefixes = list_prefixes(&store, "").await.unwrap();
        assert_eq!(prefixes, vec!["a/", "b/", "c/"]);
        assert!(list_prefixes(&store, "a/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_object_key_empty_store() {
        let store = MemoryStore::new();
        assert_eq!(first_object_key(&store, "").await.unwrap(), None);
    }
}
