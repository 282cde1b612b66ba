//! Stream configuration.
//!
//! Loaded from TOML; every field is optional and falls back to its default:
//!
//! ```toml
//! write_buffer_size = 8192
//! read_buffer_size = 8192
//! chunk_size = 4096
//! framing = "compact"      # or "rfc7230"
//! max_chunk_size = 1048576
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Result, StreamError};
use crate::streaming::{
    ChunkFraming, DEFAULT_CHUNK_SIZE, DEFAULT_READ_BUFFER_SIZE, DEFAULT_WRITE_BUFFER_SIZE,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamConfig {
    /// Capacity of the buffered writer in front of the transport
    pub write_buffer_size: usize,
    /// Read-ahead used when wrapping a `std::io::Read` transport
    pub read_buffer_size: usize,
    /// Chunk-assembly buffer of the chunked writer
    pub chunk_size: usize,
    /// Terminal-chunk framing for both directions
    pub framing: ChunkFraming,
    /// Largest chunk size the reader accepts; unlimited if absent
    pub max_chunk_size: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            framing: ChunkFraming::Compact,
            max_chunk_size: None,
        }
    }
}

impl StreamConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            StreamError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded stream config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("write_buffer_size", self.write_buffer_size),
            ("read_buffer_size", self.read_buffer_size),
            ("chunk_size", self.chunk_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(StreamError::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.max_chunk_size == Some(0) {
            return Err(StreamError::Config(
                "max_chunk_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
