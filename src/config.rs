// src/config.rs

use crate::constants::*;
use crate::error::Result;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Session sizing and commit policy. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub review_batch_size: usize,
    pub new_batch_size: usize,
    /// How many times a submission is recomputed after losing a version race.
    pub max_commit_attempts: u32,
}

impl Default for StudyConfig {
    fn default() -> Self {
        StudyConfig {
            review_batch_size: DEFAULT_REVIEW_BATCH_SIZE,
            new_batch_size: DEFAULT_NEW_BATCH_SIZE,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
        }
    }
}

/// Per-field values that replace whatever the file or the defaults set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub review_batch_size: Option<usize>,
    pub new_batch_size: Option<usize>,
    pub max_commit_attempts: Option<u32>,
}

impl StudyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: StudyConfig = serde_json::from_str(&raw)?;
        info!("Loaded study config from {:?}: {:?}", path, config);
        Ok(config)
    }

    /// Reads `path` when given, otherwise falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(n) = overrides.review_batch_size {
            self.review_batch_size = n;
        }
        if let Some(n) = overrides.new_batch_size {
            self.new_batch_size = n;
        }
        if let Some(n) = overrides.max_commit_attempts {
            self.max_commit_attempts = n;
        }
        if overrides != ConfigOverrides::default() {
            info!("Applied command-line overrides: {:?}", self);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: StudyConfig = serde_json::from_str(r#"{"new_batch_size": 3}"#).unwrap();
        assert_eq!(config.new_batch_size, 3);
        assert_eq!(config.review_batch_size, DEFAULT_REVIEW_BATCH_SIZE);
        assert_eq!(config.max_commit_attempts, DEFAULT_MAX_COMMIT_ATTEMPTS);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"review_batch_size": 25, "max_commit_attempts": 5}}"#).unwrap();

        let config = StudyConfig::load(file.path()).unwrap();
        assert_eq!(config.review_batch_size, 25);
        assert_eq!(config.max_commit_attempts, 5);
        assert_eq!(config.new_batch_size, DEFAULT_NEW_BATCH_SIZE);
    }

    #[test]
    fn test_overrides_replace_only_the_given_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"review_batch_size": 25, "new_batch_size": 4}}"#).unwrap();

        let config = StudyConfig::load_or_default(Some(file.path()))
            .unwrap()
            .with_overrides(ConfigOverrides {
                new_batch_size: Some(2),
                max_commit_attempts: Some(7),
                ..ConfigOverrides::default()
            });
        assert_eq!(config.review_batch_size, 25);
        assert_eq!(config.new_batch_size, 2);
        assert_eq!(config.max_commit_attempts, 7);
    }

    #[test]
    fn test_empty_overrides_keep_config() {
        let config = StudyConfig::default().with_overrides(ConfigOverrides::default());
        assert_eq!(config, StudyConfig::default());
    }

    #[test]
    fn test_missing_path_uses_defaults() {
        assert_eq!(StudyConfig::load_or_default(None).unwrap(), StudyConfig::default());
    }
}
