//! Pipeline configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::{DEFAULT_SUFFIX, OutputNaming, ReadOptions, WriteOptions};
use crate::raster::RasterFormat;

/// Errors from config loading and saving.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(cbz::config::read),
        help("Check that the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    #[diagnostic(
        code(cbz::config::parse),
        help("See the [read] and [write] tables documented on PackConfig.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(cbz::config::write),
        help("Check that the parent directory is writable.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// `[read]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadSection {
    pub image_load_cap: usize,
    pub start_index: usize,
    pub sort_images: bool,
}

impl Default for ReadSection {
    fn default() -> Self {
        let options = ReadOptions::default();
        Self {
            image_load_cap: options.image_load_cap,
            start_index: options.start_index,
            sort_images: options.sort_images,
        }
    }
}

/// `[write]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteSection {
    pub format: RasterFormat,
    pub quality: u8,
    pub preserve_filenames: bool,
    pub suffix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for WriteSection {
    fn default() -> Self {
        let options = WriteOptions::default();
        Self {
            format: options.format,
            quality: options.quality,
            preserve_filenames: options.preserve_filenames,
            suffix: DEFAULT_SUFFIX.into(),
            output_dir: None,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub read: ReadSection,
    pub write: WriteSection,
}

impl PackConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.display().to_string(),
            message,
        })
    }

    fn from_toml(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        if !(1..=100).contains(&config.write.quality) {
            return Err(format!(
                "write.quality must be between 1 and 100, got {}",
                config.write.quality
            ));
        }
        Ok(config)
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            image_load_cap: self.read.image_load_cap,
            start_index: self.read.start_index,
            sort_images: self.read.sort_images,
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            format: self.write.format,
            quality: self.write.quality,
            preserve_filenames: self.write.preserve_filenames,
            output_dir: self.write.output_dir.clone(),
            output_path: None,
        }
    }

    pub fn output_naming(&self) -> OutputNaming {
        OutputNaming {
            output_dir: self.write.output_dir.clone(),
            suffix: self.write.suffix.clone(),
        }
    }
}
