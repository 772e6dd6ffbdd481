// SPDX-License-Identifier: MIT OR Apache-2.0
//! String-keyed meta-data blobs attached to networks and processors.
//!
//! Values are stored as RON text so that the network does not need to know
//! the types the editor persists.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Key of the per-processor position record
pub const POSITION_KEY: &str = "ProcessorGraphicsItem";

/// Error reading or writing meta-data
#[derive(Debug, thiserror::Error)]
pub enum MetaDataError {
    /// Value could not be encoded
    #[error("Failed to encode meta-data '{key}': {source}")]
    Encode {
        /// Meta-data key
        key: String,
        /// Underlying error
        source: ron::Error,
    },

    /// Stored text could not be decoded as the requested type
    #[error("Failed to decode meta-data '{key}': {source}")]
    Decode {
        /// Meta-data key
        key: String,
        /// Underlying error
        source: ron::error::SpannedError,
    },
}

/// Container of named meta-data entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetaDataContainer {
    entries: IndexMap<String, String>,
}

impl MetaDataContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`, replacing any previous entry
    pub fn set<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), MetaDataError> {
        let text = ron::to_string(value).map_err(|source| MetaDataError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), text);
        Ok(())
    }

    /// Read the value stored under `key`
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MetaDataError> {
        let Some(text) = self.entries.get(key) else {
            return Ok(None);
        };
        ron::from_str(text)
            .map(Some)
            .map_err(|source| MetaDataError::Decode {
                key: key.to_string(),
                source,
            })
    }

    /// Remove an entry
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    /// Whether an entry exists
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entry keys
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Position of a processor in the editor scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionMetaData {
    /// X coordinate
    pub x: i32,
    /// Y coordinate
    pub y: i32,
}

impl PositionMetaData {
    /// Create from scene coordinates, rounding to whole units
    pub fn from_point(point: [f32; 2]) -> Self {
        Self {
            x: point[0].round() as i32,
            y: point[1].round() as i32,
        }
    }

    /// Scene coordinates
    pub fn to_point(self) -> [f32; 2] {
        [self.x as f32, self.y as f32]
    }
}
