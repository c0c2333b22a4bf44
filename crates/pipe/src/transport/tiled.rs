//! Tiled broadcast transport

use canvas_pipe_config::{TileConfig, TransportConfig};
use tracing::{debug, warn};

use super::{Block, BlockTransport};
use crate::canvas::Canvas;
use crate::decoder::{Decoder, PlaybackStatus};
use crate::error::TransportError;

/// One tile's decoder and its latest status
pub struct TileDecoder<C: Canvas> {
    /// Top-left pixel of the tile in full-surface coordinates
    pub origin: (u32, u32),
    decoder: Decoder<C>,
    status: PlaybackStatus,
}

impl<C: Canvas> TileDecoder<C> {
    pub fn decoder(&self) -> &Decoder<C> {
        &self.decoder
    }

    pub fn canvas(&self) -> &C {
        self.decoder.canvas()
    }

    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }

    fn replay(&mut self, bytes: &[u8]) {
        self.status = self.decoder.playback(bytes, false);
        if let PlaybackStatus::Error { offset, error } = &self.status {
            warn!(origin = ?self.origin, offset, %error, "Tile playback failed");
        }
    }
}

/// Replays every finished block into one decoder per tile
///
/// Each tile decoder sees the identical stream and applies its own
/// translation offset. Tiles are always replayed in non-atomic mode.
pub struct TiledTransport<C: Canvas + Send> {
    tiles: Vec<TileDecoder<C>>,
    config: TransportConfig,
    parallel: bool,
}

impl<C: Canvas + Send> TiledTransport<C> {
    /// One decoder per tile of `tiles`, each offset by minus its origin
    ///
    /// `make_decoder` receives the tile origin and returns a decoder without
    /// an offset applied.
    pub fn new(
        tiles: &TileConfig,
        config: TransportConfig,
        mut make_decoder: impl FnMut(u32, u32) -> Decoder<C>,
    ) -> Self {
        let tiles = tiles
            .tile_origins()
            .into_iter()
            .map(|(x, y)| TileDecoder {
                origin: (x, y),
                decoder: make_decoder(x, y).with_offset(-(x as f32), -(y as f32)),
                status: PlaybackStatus::NeedMoreData,
            })
            .collect::<Vec<_>>();
        debug!(tiles = tiles.len(), "Created tiled transport");
        Self {
            tiles,
            config,
            parallel: false,
        }
    }

    /// Use decoders as given, with whatever offsets they already carry
    pub fn from_decoders(decoders: Vec<Decoder<C>>, config: TransportConfig) -> Self {
        let tiles = decoders
            .into_iter()
            .map(|decoder| TileDecoder {
                origin: (0, 0),
                decoder,
                status: PlaybackStatus::NeedMoreData,
            })
            .collect();
        Self {
            tiles,
            config,
            parallel: false,
        }
    }

    /// Replay blocks on one scoped thread per tile
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn tiles(&self) -> &[TileDecoder<C>] {
        &self.tiles
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Whether every tile reached the terminal opcode
    pub fn is_done(&self) -> bool {
        self.tiles
            .iter()
            .all(|tile| tile.status == PlaybackStatus::Done)
    }

    /// Replay `bytes` into every tile on the calling thread
    pub fn replay(&mut self, bytes: &[u8]) {
        for tile in &mut self.tiles {
            tile.replay(bytes);
        }
    }

    /// Replay `bytes` into every tile, one scoped thread per tile
    pub fn replay_parallel(&mut self, bytes: &[u8]) {
        std::thread::scope(|s| {
            for tile in &mut self.tiles {
                s.spawn(move || tile.replay(bytes));
            }
        });
    }
}

impl<C: Canvas + Send> BlockTransport for TiledTransport<C> {
    fn request_block(&mut self, min_bytes: usize) -> Block {
        Block::with_capacity(self.config.block_size_for(min_bytes))
    }

    fn notify_written(&mut self, block: Block) -> Result<(), TransportError> {
        if self.parallel {
            self.replay_parallel(block.as_bytes());
        } else {
            self.replay(block.as_bytes());
        }
        Ok(())
    }
}
