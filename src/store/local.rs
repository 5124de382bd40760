//! Directory tree exposed as an object namespace.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use super::{ObjectEntry, ObjectListing, ObjectStore};
use crate::error::StoreError;

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Keys are `/`-separated paths relative to `root`; sub-directories are
/// listed as prefixes with a trailing `/`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Maps a key or prefix onto the filesystem, refusing anything that
    /// would escape the root.
    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key.trim_end_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
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
        let dir = match prefix {
            "" => self.root.clone(),
            p => self
                .resolve(p)
                .ok_or_else(|| StoreError::NotFound(p.to_string()))?,
        };
        if !dir.is_dir() {
            return Ok(ObjectListing::default());
        }

        let entries: Vec<_> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .collect::<Result<_, _>>()
            .map_err(|e| StoreError::Io(e.into()))?;

        let mut listing = ObjectListing::default();
        for entry in entries.iter().skip(offset).take(self.page_size) {
            let name = entry.file_name().to_string_lossy();
            let key = format!("{}{}", prefix, name);
            if entry.file_type().is_dir() {
                listing.prefixes.push(format!("{}/", key));
            } else if entry.file_type().is_file() {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                listing.objects.push(ObjectEntry::new(key, size));
            }
        }
        let end = offset + self.page_size;
        if end < entries.len() {
            listing.next_token = Some(end.to_string());
        }
        Ok(listing)
    }

    async fn get_object_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self
            .resolve(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.root.display())
    }
}
