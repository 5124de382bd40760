//! Anonymous access to a public S3 bucket.
//!
//! Uses unsigned ListObjectsV2 requests with `delimiter=/`, so every page
//! carries the objects at one level plus its common prefixes. Objects are
//! fetched with a plain path-style `GET`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ObjectEntry, ObjectListing, ObjectStore, StorageClass};
use crate::error::StoreError;

/// Public IDC bucket holding the DICOM collections.
pub const DEFAULT_BUCKET: &str = "idc-open-data-two";

pub const DEFAULT_ENDPOINT: &str = "https://s3.amazonaws.com";

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3StoreConfig {
    pub bucket: String,
    pub endpoint: String,
    /// `max-keys` for each listing request (S3 caps this at 1000).
    pub page_size: usize,
    pub timeout_secs: u64,
}

impl Default for S3StoreConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            page_size: 1000,
            timeout_secs: 60,
        }
    }
}

impl S3StoreConfig {
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// ListObjectsV2 response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    contents: Vec<Contents>,
    #[serde(default)]
    common_prefixes: Vec<CommonPrefix>,
    #[serde(default)]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Contents {
    key: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    storage_class: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefix {
    prefix: String,
}

impl From<ListBucketResult> for ObjectListing {
    fn from(result: ListBucketResult) -> Self {
        let objects = result
            .contents
            .into_iter()
            .map(|c| ObjectEntry {
                key: c.key,
                size: c.size,
                storage_class: StorageClass::parse(&c.storage_class),
            })
            .collect();
        let prefixes = result.common_prefixes.into_iter().map(|p| p.prefix).collect();
        let next_token = if result.is_truncated {
            result.next_continuation_token
        } else {
            None
        };
        ObjectListing {
            objects,
            prefixes,
            next_token,
        }
    }
}

fn parse_listing(body: &str) -> Result<ObjectListing, StoreError> {
    let result: ListBucketResult =
        quick_xml::de::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;
    Ok(result.into())
}

/// Unsigned client for one bucket.
pub struct S3Store {
    config: S3StoreConfig,
    http_client: Client,
}

impl S3Store {
    pub fn new(config: S3StoreConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            config,
            http_client,
        }
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket
        )
    }

    fn list_url(&self, prefix: &str, token: Option<&str>) -> String {
        let mut url = format!(
            "{}?list-type=2&delimiter=%2F&max-keys={}&prefix={}",
            self.bucket_url(),
            self.config.page_size,
            urlencoding::encode(prefix)
        );
        if let Some(token) = token {
            url.push_str("&continuation-token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    fn object_url(&self, key: &str) -> String {
        let path = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.bucket_url(), path)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_page(
        &self,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<ObjectListing, StoreError> {
        let url = self.list_url(prefix, token);
        debug!(prefix, url = %url, "Listing objects");

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Http {
                status: status.as_u16(),
                target: prefix.to_string(),
                message,
            });
        }
        let body = response.text().await?;
        parse_listing(&body)
    }

    async fn get_object_bytes(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.http_client.get(self.object_url(key)).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::Http {
                status: status.as_u16(),
                target: key.to_string(),
                message,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn describe(&self) -> String {
        format!("s3://{} via {}", self.config.bucket, self.config.endpoint)
    }
}
