//! Configuration for file writers.

use serde::{Deserialize, Serialize};

use crate::backend::OpenFlags;

/// Options applied when creating or reopening a file for writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterOptions {
    /// Deflate level (0-9) for every defined variable; 0 disables compression.
    /// Any non-zero level requires NetCDF-4 storage.
    pub compression: u32,

    /// Open with unbuffered shared access.
    pub share: bool,

    /// Command used to compile textual schemas into files.
    pub schema_compiler: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: 0,
            share: false,
            schema_compiler: "ncgen".to_string(),
        }
    }
}

impl WriterOptions {
    /// Load options from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("NCFILE_COMPRESSION") {
            if let Ok(level) = val.trim().parse() {
                config.compression = level;
            }
        }

        if let Some(val) = lookup("NCFILE_SHARE") {
            config.share = val.to_lowercase() == "true" || val == "1";
        }

        if let Some(val) = lookup("NCFILE_SCHEMA_COMPILER") {
            if !val.trim().is_empty() {
                config.schema_compiler = val.trim().to_string();
            }
        }

        config
    }

    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = level;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.compression > 9 {
            return Err("compression must be 0-9".to_string());
        }

        if self.schema_compiler.trim().is_empty() {
            return Err("schema_compiler must not be empty".to_string());
        }

        Ok(())
    }

    /// Flags for opening or creating a writable file.
    pub fn open_flags(&self) -> OpenFlags {
        OpenFlags {
            write: true,
            share: self.share,
            netcdf4: self.compression > 0,
            clobber: true,
        }
    }
}
