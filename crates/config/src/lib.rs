//! Shared configuration for canvas-pipe sessions
//!
//! This crate provides the single source of truth for the mode flags and
//! transport sizing that an encoder and every decoder replaying its stream
//! must agree on. There is no in-stream negotiation, so both sides are
//! expected to be built from the same [`PipeConfig`].

use serde::{Deserialize, Serialize};

/// Default minimum block size handed out by transports, in bytes
pub const DEFAULT_MIN_BLOCK_SIZE: usize = 4096;

/// Default multiple applied to a block request by growable transports
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// Default tile edge length for tiled broadcast playback
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How raster images are shared between an encoder and its decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeapMode {
    /// Pixels are inlined into the stream with each bitmap definition
    #[default]
    None,
    /// One reader at a time borrows heap entries directly
    Exclusive,
    /// Every reader deep-copies heap entries on first touch
    CopyOnRead,
}

impl HeapMode {
    /// Whether bitmap definitions carry heap indices instead of pixels
    pub fn uses_heap(self) -> bool {
        !matches!(self, HeapMode::None)
    }
}

/// Session-wide mode flags, fixed when a session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFlags {
    /// Serialize sub-objects and fonts by reconstructable value
    pub cross_process: bool,
    /// Shared bitmap heap sub-mode
    pub heap_mode: HeapMode,
}

impl SessionFlags {
    /// Flags for an in-process session with inlined bitmaps
    pub fn same_process() -> Self {
        Self::default()
    }

    /// Flags for a session whose stream leaves the process
    pub fn cross_process() -> Self {
        Self {
            cross_process: true,
            heap_mode: HeapMode::None,
        }
    }

    /// Builder-style setter for the heap sub-mode
    pub fn with_heap_mode(mut self, heap_mode: HeapMode) -> Self {
        self.heap_mode = heap_mode;
        self
    }
}

/// Block sizing used by transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Smallest block a transport hands out
    pub min_block_size: usize,
    /// Multiple of the requested size used when growing
    pub growth_factor: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            min_block_size: DEFAULT_MIN_BLOCK_SIZE,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl TransportConfig {
    /// Capacity of the block to hand out for a request of `min_bytes`
    pub fn block_size_for(&self, min_bytes: usize) -> usize {
        min_bytes
            .saturating_mul(self.growth_factor.max(1))
            .max(self.min_block_size)
            .max(min_bytes)
    }
}

/// Geometry of a tiled broadcast target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Full surface width in pixels
    pub width: u32,
    /// Full surface height in pixels
    pub height: u32,
    /// Tile edge length in pixels
    pub tile_size: u32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_TILE_SIZE,
            height: DEFAULT_TILE_SIZE,
            tile_size: DEFAULT_TILE_SIZE,
        }
    }
}

impl TileConfig {
    /// Create a tile config for a surface of the given size
    pub fn new(width: u32, height: u32, tile_size: u32) -> Self {
        Self {
            width,
            height,
            tile_size,
        }
    }

    /// Number of tiles in x direction
    pub fn tiles_x(&self) -> u32 {
        self.width.div_ceil(self.tile_size.max(1))
    }

    /// Number of tiles in y direction
    pub fn tiles_y(&self) -> u32 {
        self.height.div_ceil(self.tile_size.max(1))
    }

    /// Top-left pixel origin of every tile, row-major
    pub fn tile_origins(&self) -> Vec<(u32, u32)> {
        let mut origins = Vec::with_capacity((self.tiles_x() * self.tiles_y()) as usize);
        for ty in 0..self.tiles_y() {
            for tx in 0..self.tiles_x() {
                origins.push((tx * self.tile_size, ty * self.tile_size));
            }
        }
        origins
    }
}

/// Complete configuration shared by both ends of a pipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    pub session: SessionFlags,
    pub transport: TransportConfig,
    pub tiles: TileConfig,
}

impl PipeConfig {
    /// Parse and validate a config from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PipeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every size is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.min_block_size < 16 {
            return Err(ConfigError::Invalid {
                field: "transport.min_block_size",
                reason: format!("{} is below 16 bytes", self.transport.min_block_size),
            });
        }
        if self.transport.growth_factor == 0 {
            return Err(ConfigError::Invalid {
                field: "transport.growth_factor",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.tiles.tile_size == 0 {
            return Err(ConfigError::Invalid {
                field: "tiles.tile_size",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
