//! Block transports
//!
//! An encoder writes its stream into [`Block`]s obtained from a
//! [`BlockTransport`] and hands each one back once it is full or flushed.
//! What happens to a finished block depends on the transport:
//! - [`MemoryTransport`] - Keeps every block for later replay
//! - [`LocalTransport`] - Replays each block into one attached decoder immediately
//! - [`ChunkedTransport`] - Writes blocks to a byte sink, with replaceable sends
//! - [`TiledTransport`] - Replays each block into one decoder per tile
//! - [`SharedBlockWriter`] - Appends blocks to a list that reader threads replay
//!
//! An opcode never spans two blocks: the encoder only starts an opcode in a
//! block that can hold all of it.

mod chunked;
mod local;
mod memory;
mod shared;
mod tiled;

pub use chunked::{ChunkedTransport, SendMode};
pub use local::LocalTransport;
pub use memory::MemoryTransport;
pub use shared::{SharedBlockList, SharedBlockReader, SharedBlockWriter};
pub use tiled::{TileDecoder, TiledTransport};

use crate::error::TransportError;

/// A contiguous region the encoder writes opcodes into
///
/// The encoder never writes past [`Block::capacity`].
#[derive(Debug, Clone, Default)]
pub struct Block {
    data: Vec<u8>,
    capacity: usize,
}

impl Block {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Reuse an existing allocation for a new block
    pub fn from_buffer(mut buffer: Vec<u8>, capacity: usize) -> Self {
        buffer.clear();
        buffer.reserve(capacity);
        Self {
            data: buffer,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Append `bytes`, refusing if they do not fit
    pub fn write(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > self.remaining() {
            return false;
        }
        self.data.extend_from_slice(bytes);
        true
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Supplier of blocks to an encoder and destination of finished ones
pub trait BlockTransport {
    /// Hand out an empty block whose capacity is at least `min_bytes`
    fn request_block(&mut self, min_bytes: usize) -> Block;

    /// Take back a finished block; it is immutable from here on
    fn notify_written(&mut self, block: Block) -> Result<(), TransportError>;

    /// Called once after the terminal opcode's block was handed back
    fn finish(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

impl<T: BlockTransport + ?Sized> BlockTransport for &mut T {
    fn request_block(&mut self, min_bytes: usize) -> Block {
        (**self).request_block(min_bytes)
    }

    fn notify_written(&mut self, block: Block) -> Result<(), TransportError> {
        (**self).notify_written(block)
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        (**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_refuses_overflow() {
        let mut block = Block::with_capacity(8);
        assert!(block.write(&[1, 2, 3, 4]));
        assert!(!block.write(&[0; 5]));
        assert!(block.write(&[5, 6, 7, 8]));
        assert_eq!(block.remaining(), 0);
        assert_eq!(block.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_block_from_buffer_clears() {
        let block = Block::from_buffer(vec![9; 16], 32);
        assert!(block.is_empty());
        assert_eq!(block.capacity(), 32);
    }
}
