use serde::Deserialize;
use std::collections::HashMap;
use tracing::trace;

/// How target widths are derived from the source width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformMode {
    /// Fractions of the source width (1/6 .. 1)
    #[default]
    Sizes,
    /// The source width and its multiples (1x, 1.5x, 2x, 3x)
    Responsive,
}

impl TransformMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sizes => "sizes",
            Self::Responsive => "responsive",
        }
    }
}

/// Output settings applied to one source object
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Profile {
    /// Width denominator for the fixed height ratio
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// When set, heights follow `max_height / max_width` instead of the source aspect ratio
    #[serde(default)]
    pub max_height: Option<u32>,
    /// Directory prefix for derived objects
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub transform_mode: TransformMode,
}

/// Per-directory override; absent fields fall back when merged
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileOverride {
    /// Source directory this override applies to (no trailing slash)
    pub directory: String,
    pub max_width: u32,
    #[serde(default)]
    pub max_height: Option<u32>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub transform_mode: Option<TransformMode>,
}

fn default_max_width() -> u32 {
    1920
}

fn default_output_dir() -> String {
    "resized".to_string()
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            max_height: None,
            output_dir: default_output_dir(),
            transform_mode: TransformMode::default(),
        }
    }
}

impl ProfileOverride {
    /// Layer this override over the default profile.
    ///
    /// Only the output directory inherits from the default; a missing
    /// height stays unset and a missing mode is `sizes`.
    pub fn merge_over(&self, default: &Profile) -> Profile {
        Profile {
            max_width: self.max_width,
            max_height: self.max_height,
            output_dir: self
                .output_dir
                .clone()
                .unwrap_or_else(|| default.output_dir.clone()),
            transform_mode: self.transform_mode.unwrap_or_default(),
        }
    }
}

/// Directory portion of an object key: every segment but the last
pub fn directory_of(key: &str) -> &str {
    key.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Maps object directories to output profiles
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    default: Profile,
    profiles: HashMap<String, Profile>,
}

impl ProfileResolver {
    /// Build the lookup table, merging each override over the default once
    pub fn new(default: Profile, overrides: &[ProfileOverride]) -> Self {
        let profiles = overrides
            .iter()
            .map(|o| (o.directory.clone(), o.merge_over(&default)))
            .collect();

        Self { default, profiles }
    }

    /// Resolve the profile for a decoded object key
    pub fn resolve(&self, key: &str) -> Profile {
        let directory = directory_of(key);

        if directory.is_empty() {
            return self.default.clone();
        }

        match self.profiles.get(directory) {
            Some(profile) => {
                trace!(directory = %directory, "Using directory profile");
                profile.clone()
            }
            None => self.default.clone(),
        }
    }

    pub fn default_profile(&self) -> &Profile {
        &self.default
    }
}
