//! Sampler configuration.
//!
//! Settings are layered: defaults, then an optional YAML file, then
//! `SAMPLER_*` environment variables. The CLI applies its flags last.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diversity::{SelectionPolicy, SequencePolicy};
use crate::export::HeaderPolicy;
use crate::metadata::ExtractionProfile;
use crate::store::S3StoreConfig;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for this schema.
    #[error("Invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration for one sampling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of accepted records after which traversal stops.
    pub target_count: usize,
    /// Namespace prefixes to start from, visited in order.
    pub prefixes: Vec<String>,
    /// Only keys ending with this suffix are fetched.
    pub extension: String,
    /// CSV destination.
    pub output_path: PathBuf,
    pub profile: ExtractionProfile,
    pub sequence_policy: SequencePolicy,
    pub header_policy: HeaderPolicy,
    pub selection: SelectionPolicy,
    /// Fields left out of the novelty check (e.g. `S3Key`). Empty by default.
    pub excluded_fields: Vec<String>,
    /// Replace each start prefix with one of its sub-prefixes, picked at random.
    pub random_prefix: bool,
    /// Seed for the random prefix choice; entropy-seeded when unset.
    pub seed: Option<u64>,
    /// Remote bucket settings.
    pub s3: S3StoreConfig,
    /// Read from this directory instead of the bucket.
    pub local_root: Option<PathBuf>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            target_count: 5,
            prefixes: vec![String::new()],
            extension: ".dcm".to_string(),
            output_path: PathBuf::from("dicom_metadata.csv"),
            profile: ExtractionProfile::default(),
            sequence_policy: SequencePolicy::default(),
            header_policy: HeaderPolicy::default(),
            selection: SelectionPolicy::default(),
            excluded_fields: Vec::new(),
            random_prefix: false,
            seed: None,
            s3: S3StoreConfig::default(),
            local_root: None,
        }
    }
}

impl SamplerConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a YAML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Overrides fields from `lookup`, which maps a variable name to its value.
    ///
    /// # Environment Variables
    ///
    /// - `SAMPLER_TARGET_COUNT`: Records to accept before stopping (default: 5)
    /// - `SAMPLER_PREFIXES`: Comma-separated start prefixes (default: bucket root)
    /// - `SAMPLER_EXTENSION`: Object key suffix (default: .dcm)
    /// - `SAMPLER_OUTPUT`: CSV output path (default: dicom_metadata.csv)
    /// - `SAMPLER_PROFILE`: `basic` or `enriched` (default: enriched)
    /// - `SAMPLER_SEQUENCE_POLICY`: `ordered` or `unordered` (default: ordered)
    /// - `SAMPLER_HEADER_POLICY`: `first-record` or `union` (default: first-record)
    /// - `SAMPLER_SELECTION`: `diverse` or `first` (default: diverse)
    /// - `SAMPLER_EXCLUDED_FIELDS`: Comma-separated fields ignored by the novelty check
    /// - `SAMPLER_RANDOM_PREFIX`: `true` to start from a random sub-prefix (default: false)
    /// - `SAMPLER_SEED`: Seed for the random prefix choice
    /// - `SAMPLER_BUCKET`: Bucket name (default: idc-open-data-two)
    /// - `SAMPLER_ENDPOINT`: S3 endpoint (default: https://s3.amazonaws.com)
    /// - `SAMPLER_LOCAL_ROOT`: Sample a local directory instead of S3
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable cannot be parsed.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("SAMPLER_TARGET_COUNT") {
            self.target_count = parse_env_value(&val, "SAMPLER_TARGET_COUNT")?;
        }

        if let Some(val) = lookup("SAMPLER_PREFIXES") {
            self.prefixes = val.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Some(val) = lookup("SAMPLER_EXTENSION") {
            self.extension = val;
        }

        if let Some(val) = lookup("SAMPLER_OUTPUT") {
            self.output_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("SAMPLER_PROFILE") {
            self.profile = parse_env_enum(&val, "SAMPLER_PROFILE")?;
        }

        if let Some(val) = lookup("SAMPLER_SEQUENCE_POLICY") {
            self.sequence_policy = parse_env_enum(&val, "SAMPLER_SEQUENCE_POLICY")?;
        }

        if let Some(val) = lookup("SAMPLER_HEADER_POLICY") {
            self.header_policy = parse_env_enum(&val, "SAMPLER_HEADER_POLICY")?;
        }

        if let Some(val) = lookup("SAMPLER_SELECTION") {
            self.selection = parse_env_enum(&val, "SAMPLER_SELECTION")?;
        }

        if let Some(val) = lookup("SAMPLER_EXCLUDED_FIELDS") {
            self.excluded_fields = val
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(val) = lookup("SAMPLER_RANDOM_PREFIX") {
            self.random_prefix = parse_env_value(&val, "SAMPLER_RANDOM_PREFIX")?;
        }

        if let Some(val) = lookup("SAMPLER_SEED") {
            self.seed = Some(parse_env_value(&val, "SAMPLER_SEED")?);
        }

        // Store settings
        if let Some(val) = lookup("SAMPLER_BUCKET") {
            self.s3.bucket = val;
        }

        if let Some(val) = lookup("SAMPLER_ENDPOINT") {
            self.s3.endpoint = val;
        }

        if let Some(val) = lookup("SAMPLER_LOCAL_ROOT") {
            self.local_root = Some(PathBuf::from(val));
        }

        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_count == 0 {
            return Err(ConfigError::ValidationFailed(
                "target_count must be greater than 0".to_string(),
            ));
        }

        if self.extension.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "extension cannot be empty".to_string(),
            ));
        }

        if self.prefixes.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "prefixes must contain at least one entry".to_string(),
            ));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "output_path cannot be empty".to_string(),
            ));
        }

        if self.local_root.is_none() {
            if self.s3.bucket.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "s3.bucket cannot be empty".to_string(),
                ));
            }
            if self.s3.page_size == 0 || self.s3.page_size > 1000 {
                return Err(ConfigError::ValidationFailed(
                    "s3.page_size must be between 1 and 1000".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Builder method to set the target sample size.
    pub fn with_target_count(mut self, count: usize) -> Self {
        self.target_count = count;
        self
    }

    /// Builder method to set the start prefixes.
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to set the object key suffix.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Builder method to set the CSV output path.
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_profile(mut self, profile: ExtractionProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_sequence_policy(mut self, policy: SequencePolicy) -> Self {
        self.sequence_policy = policy;
        self
    }

    pub fn with_header_policy(mut self, policy: HeaderPolicy) -> Self {
        self.header_policy = policy;
        self
    }

    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Builder method to leave fields out of the novelty check.
    pub fn with_excluded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Builder method to start from randomly chosen sub-prefixes.
    pub fn with_random_prefix(mut self, seed: Option<u64>) -> Self {
        self.random_prefix = true;
        self.seed = seed;
        self
    }

    /// Builder method to sample a local directory.
    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable naming one variant of a CLI enum.
fn parse_env_enum<T: ValueEnum>(value: &str, key: &str) -> Result<T, ConfigError> {
    T::from_str(value.trim(), true).map_err(|message| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    })
}
