//! Checkpoint format definitions

use serde::{Deserialize, Serialize};

/// Supported checkpoint serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointFormat {
    /// JSON format (human-readable, larger file size)
    Json,

    /// SafeTensors format (HuggingFace compatible, efficient binary)
    SafeTensors,
}

impl CheckpointFormat {
    /// Get file extension for this format
    pub fn extension(&self) -> &str {
        match self {
            CheckpointFormat::Json => "json",
            CheckpointFormat::SafeTensors => "safetensors",
        }
    }

    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(CheckpointFormat::Json),
            "safetensors" => Some(CheckpointFormat::SafeTensors),
            _ => None,
        }
    }
}

impl Default for CheckpointFormat {
    fn default() -> Self {
        CheckpointFormat::SafeTensors
    }
}

/// Options for writing checkpoints
#[derive(Debug, Clone)]
pub struct SaveOptions {
    /// Serialization format
    pub format: CheckpointFormat,

    /// Whether to pretty-print (for text formats)
    pub pretty: bool,
}

impl SaveOptions {
    /// Create new save options with format
    pub fn new(format: CheckpointFormat) -> Self {
        Self {
            format,
            pretty: true,
        }
    }

    /// Enable/disable pretty printing
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self::new(CheckpointFormat::default())
    }
}
