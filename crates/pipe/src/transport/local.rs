//! Single-buffer transport with eager in-process playback

use canvas_pipe_config::TransportConfig;
use tracing::{trace, warn};

use super::{Block, BlockTransport};
use crate::canvas::Canvas;
use crate::decoder::{Decoder, PlaybackStatus};
use crate::error::TransportError;

/// Replays every finished block into one attached decoder right away
///
/// Only one buffer is live at a time. Once a block is replayed its
/// allocation is kept and handed out again for the next request.
pub struct LocalTransport<C: Canvas> {
    decoder: Decoder<C>,
    config: TransportConfig,
    spare: Option<Vec<u8>>,
    status: PlaybackStatus,
}

impl<C: Canvas> LocalTransport<C> {
    pub fn new(decoder: Decoder<C>, config: TransportConfig) -> Self {
        Self {
            decoder,
            config,
            spare: None,
            status: PlaybackStatus::NeedMoreData,
        }
    }

    pub fn decoder(&self) -> &Decoder<C> {
        &self.decoder
    }

    pub fn decoder_mut(&mut self) -> &mut Decoder<C> {
        &mut self.decoder
    }

    pub fn canvas(&self) -> &C {
        self.decoder.canvas()
    }

    /// Status returned by the most recent replay
    pub fn status(&self) -> &PlaybackStatus {
        &self.status
    }
}

impl<C: Canvas> BlockTransport for LocalTransport<C> {
    fn request_block(&mut self, min_bytes: usize) -> Block {
        let capacity = self.config.block_size_for(min_bytes);
        match self.spare.take() {
            Some(buffer) => Block::from_buffer(buffer, capacity),
            None => Block::with_capacity(capacity),
        }
    }

    fn notify_written(&mut self, block: Block) -> Result<(), TransportError> {
        self.status = self.decoder.playback(block.as_bytes(), false);
        trace!(len = block.len(), status = ?self.status, "Replayed local block");
        if let PlaybackStatus::Error { offset, error } = &self.status {
            warn!(offset, %error, "Local playback failed");
        }
        self.spare = Some(block.into_bytes());
        Ok(())
    }
}

impl<C: Canvas> std::fmt::Debug for LocalTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("config", &self.config)
            .field("status", &self.status)
            .field("bytes_consumed", &self.decoder.bytes_consumed())
            .finish()
    }
}
