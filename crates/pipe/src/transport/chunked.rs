//! Transport that forwards finished blocks to a byte sink

use std::io::Write;

use canvas_pipe_config::TransportConfig;
use tracing::{debug, trace};

use super::{Block, BlockTransport};
use crate::error::TransportError;

/// How a finished block is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// Written to the sink immediately; irreversible
    #[default]
    Append,
    /// Held back as the pending send; the next replace send discards it
    Replace,
}

/// Sends finished blocks to a [`Write`] sink (file, socket)
///
/// In [`SendMode::Replace`] a block is kept pending instead of written, and
/// a later replace send supersedes it before it reaches the sink. This is
/// for upstream drawing that is still being revised. A pending send reaches
/// the sink on [`ChunkedTransport::commit`], on the next append, or when the
/// session finishes.
///
/// A superseded block is dropped whole, definitions and paint updates
/// included, while the encoder still counts them as delivered. Replace only
/// blocks whose effects no later block relies on: end each one with a flush
/// and keep its paint and object use to itself, or have the upstream resend
/// its full state after replacing.
#[derive(Debug)]
pub struct ChunkedTransport<W: Write> {
    sink: W,
    config: TransportConfig,
    mode: SendMode,
    pending: Option<Vec<u8>>,
    bytes_sent: u64,
    closed: bool,
}

impl<W: Write> ChunkedTransport<W> {
    pub fn new(sink: W, config: TransportConfig) -> Self {
        Self {
            sink,
            config,
            mode: SendMode::Append,
            pending: None,
            bytes_sent: 0,
            closed: false,
        }
    }

    pub fn send_mode(&self) -> SendMode {
        self.mode
    }

    pub fn set_send_mode(&mut self, mode: SendMode) {
        self.mode = mode;
    }

    /// Whether a replaceable send is waiting
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Make the pending send permanent
    pub fn commit(&mut self) -> Result<(), TransportError> {
        if let Some(bytes) = self.pending.take() {
            self.send(&bytes)?;
        }
        Ok(())
    }

    /// Bytes that reached the sink
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.sink.write_all(bytes)?;
        self.bytes_sent += bytes.len() as u64;
        trace!(len = bytes.len(), total = self.bytes_sent, "Sent chunk");
        Ok(())
    }
}

impl<W: Write> BlockTransport for ChunkedTransport<W> {
    fn request_block(&mut self, min_bytes: usize) -> Block {
        Block::with_capacity(self.config.block_size_for(min_bytes))
    }

    fn notify_written(&mut self, block: Block) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        match self.mode {
            SendMode::Append => {
                self.commit()?;
                self.send(block.as_bytes())
            }
            SendMode::Replace => {
                if let Some(previous) = self.pending.replace(block.into_bytes()) {
                    debug!(len = previous.len(), "Replaced pending chunk");
                }
                Ok(())
            }
        }
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        self.commit()?;
        self.sink.flush()?;
        self.closed = true;
        debug!(bytes = self.bytes_sent, "Chunked transport finished");
        Ok(())
    }
}
