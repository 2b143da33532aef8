use crate::imaging::ResizeFilter;
use crate::output_key::{KeyTemplate, DEFAULT_KEY_TEMPLATE};
use crate::profile::{Profile, ProfileOverride, ProfileResolver};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// S3 rejects multipart parts smaller than this (except the last one)
const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Main configuration for the resizer service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Source object store configuration
    pub s3: S3Config,
    /// Output profiles and key naming
    #[serde(default)]
    pub output: OutputConfig,
    /// Parameters applied to every derivative upload
    #[serde(default)]
    pub upload: UploadConfig,
    /// Resize engine configuration
    #[serde(default)]
    pub resize: ResizeConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (json or pretty)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// Bucket holding the source images
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Multipart upload threshold in bytes (5MB default)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: usize,
    /// Part size for multipart uploads in bytes (5MB default)
    #[serde(default = "default_part_size")]
    pub part_size_bytes: usize,
}

/// Output profile table and key template
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Template for derivative keys, see `output_key`
    #[serde(default = "default_key_template")]
    pub key_template: String,
    /// Profile for keys without a matching directory override
    #[serde(default)]
    pub default: Profile,
    /// Per-directory overrides
    #[serde(default)]
    pub profiles: Vec<ProfileOverride>,
}

/// Fixed parameters for derivative uploads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadConfig {
    /// Destination bucket (defaults to the source bucket)
    pub bucket: Option<String>,
    /// Canned ACL, e.g. `public-read`
    pub acl: Option<String>,
    /// Cache-Control header
    pub cache_control: Option<String>,
    /// Storage class, e.g. `STANDARD_IA`
    pub storage_class: Option<String>,
    /// User metadata attached to every derivative
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Resize engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ResizeConfig {
    /// JPEG quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Resampling filter
    #[serde(default)]
    pub filter: ResizeFilter,
    /// Upper bound on pixels per derivative
    #[serde(default = "default_max_pixels")]
    pub max_pixels: u64,
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

// Default value functions
fn default_service_name() -> String {
    "resizer-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_multipart_threshold() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_part_size() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_key_template() -> String {
    DEFAULT_KEY_TEMPLATE.to_string()
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_max_pixels() -> u64 {
    100_000_000
}

impl Config {
    /// Load configuration from config files and environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("service.name", "resizer-service")?
            .set_default("service.log_level", "info")?
            // Add config file if present
            .add_source(config::File::with_name("config/resizer").required(false))
            .add_source(config::File::with_name("/etc/resizer/resizer").required(false))
            // Override with environment variables
            // RESIZER__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("RESIZER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.s3.bucket.is_empty() {
            return Err(ConfigValidationError::MissingField("s3.bucket".to_string()));
        }

        if matches!(self.upload.bucket.as_deref(), Some("")) {
            return Err(ConfigValidationError::InvalidValue {
                field: "upload.bucket".to_string(),
                message: "Bucket name must not be empty".to_string(),
            });
        }

        if self.s3.part_size_bytes < MIN_PART_SIZE {
            return Err(ConfigValidationError::InvalidValue {
                field: "s3.part_size_bytes".to_string(),
                message: format!("Part size must be at least {MIN_PART_SIZE} bytes"),
            });
        }

        KeyTemplate::parse(&self.output.key_template).map_err(|e| {
            ConfigValidationError::InvalidValue {
                field: "output.key_template".to_string(),
                message: e.to_string(),
            }
        })?;

        validate_dimensions(
            "output.default",
            self.output.default.max_width,
            self.output.default.max_height,
        )?;

        let mut directories = HashSet::new();
        for profile in &self.output.profiles {
            let field = format!("output.profiles[{}]", profile.directory);

            if profile.directory.is_empty() {
                return Err(ConfigValidationError::InvalidValue {
                    field: "output.profiles".to_string(),
                    message: "Profile directory must not be empty".to_string(),
                });
            }
            if profile.directory.starts_with('/') || profile.directory.ends_with('/') {
                return Err(ConfigValidationError::InvalidValue {
                    field,
                    message: "Directory must not start or end with '/'".to_string(),
                });
            }
            if !directories.insert(profile.directory.as_str()) {
                return Err(ConfigValidationError::InvalidValue {
                    field,
                    message: "Duplicate profile directory".to_string(),
                });
            }

            validate_dimensions(&field, profile.max_width, profile.max_height)?;
        }

        if self.resize.jpeg_quality == 0 || self.resize.jpeg_quality > 100 {
            return Err(ConfigValidationError::InvalidValue {
                field: "resize.jpeg_quality".to_string(),
                message: format!("Quality must be 1-100, got {}", self.resize.jpeg_quality),
            });
        }

        if self.resize.max_pixels == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "resize.max_pixels".to_string(),
                message: "Pixel limit must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Parsed output key template
    pub fn key_template(&self) -> Result<KeyTemplate, ConfigValidationError> {
        KeyTemplate::parse(&self.output.key_template).map_err(|e| {
            ConfigValidationError::InvalidValue {
                field: "output.key_template".to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Profile lookup table built from the output section
    pub fn profile_resolver(&self) -> ProfileResolver {
        ProfileResolver::new(self.output.default.clone(), &self.output.profiles)
    }

    /// Bucket derivatives are written to
    pub fn upload_bucket(&self) -> &str {
        self.upload.bucket.as_deref().unwrap_or(&self.s3.bucket)
    }
}

fn validate_dimensions(
    field: &str,
    max_width: u32,
    max_height: Option<u32>,
) -> Result<(), ConfigValidationError> {
    if max_width == 0 || max_height == Some(0) {
        return Err(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            message: "Dimensions must be greater than 0".to_string(),
        });
    }
    Ok(())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            key_template: default_key_template(),
            default: Profile::default(),
            profiles: Vec::new(),
        }
    }
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            filter: ResizeFilter::default(),
            max_pixels: default_max_pixels(),
        }
    }
}
