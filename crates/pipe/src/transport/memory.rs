//! Transport that keeps every finished block in memory

use canvas_pipe_config::TransportConfig;
use tracing::debug;

use super::{Block, BlockTransport};
use crate::error::TransportError;

/// Collects finished blocks in order
///
/// The concatenation of [`MemoryTransport::blocks`] is the session's
/// capture stream.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    config: TransportConfig,
    blocks: Vec<Vec<u8>>,
    finished: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Finished blocks, oldest first
    pub fn blocks(&self) -> &[Vec<u8>] {
        &self.blocks
    }

    /// The whole stream as one buffer
    pub fn stream(&self) -> Vec<u8> {
        self.blocks.concat()
    }

    /// Whether the encoder has finished the session
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl BlockTransport for MemoryTransport {
    fn request_block(&mut self, min_bytes: usize) -> Block {
        Block::with_capacity(self.config.block_size_for(min_bytes))
    }

    fn notify_written(&mut self, block: Block) -> Result<(), TransportError> {
        if self.finished {
            return Err(TransportError::Closed);
        }
        self.blocks.push(block.into_bytes());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        self.finished = true;
        debug!(
            blocks = self.blocks.len(),
            bytes = self.blocks.iter().map(Vec::len).sum::<usize>(),
            "Memory transport finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_concatenate() {
        let mut transport = MemoryTransport::with_config(TransportConfig {
            min_block_size: 16,
            growth_factor: 1,
        });
        let mut block = transport.request_block(4);
        assert_eq!(block.capacity(), 16);
        block.write(&[1, 0, 0, 0]);
        transport.notify_written(block).unwrap();

        let mut block = transport.request_block(4);
        block.write(&[2, 0, 0, 0]);
        transport.notify_written(block).unwrap();

        assert_eq!(transport.blocks().len(), 2);
        assert_eq!(transport.stream(), vec![1, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_closed_after_finish() {
        let mut transport = MemoryTransport::new();
        transport.finish().unwrap();
        let block = transport.request_block(4);
        assert!(matches!(
            transport.notify_written(block),
            Err(TransportError::Closed)
        ));
    }
}
