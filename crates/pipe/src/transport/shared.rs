//! Thread-safe append-only block list with multiple readers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use canvas_pipe_config::TransportConfig;
use tracing::debug;

use super::{Block, BlockTransport};
use crate::canvas::Canvas;
use crate::decoder::{Decoder, PlaybackStatus};
use crate::error::TransportError;

/// Finished blocks of one session, shared between a writer and readers
///
/// Writers only append and an appended block is never mutated. Readers
/// either wait for [`SharedBlockList::is_finished`] or read only the prefix
/// appended so far.
#[derive(Default)]
pub struct SharedBlockList {
    blocks: RwLock<Vec<Arc<[u8]>>>,
    finished: AtomicBool,
}

impl std::fmt::Debug for SharedBlockList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBlockList")
            .field("block_count", &self.len())
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl SharedBlockList {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn append(&self, bytes: Vec<u8>) {
        let mut blocks = self.blocks.write().expect("SharedBlockList lock poisoned");
        blocks.push(Arc::from(bytes));
    }

    /// Mark the writer as done; no block is appended afterwards
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.blocks.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks from `start` onward, as of now
    pub fn blocks_from(&self, start: usize) -> Vec<Arc<[u8]>> {
        let blocks = self.blocks.read().expect("SharedBlockList lock poisoned");
        blocks.get(start..).map(<[_]>::to_vec).unwrap_or_default()
    }
}

/// Transport appending finished blocks to a [`SharedBlockList`]
#[derive(Debug)]
pub struct SharedBlockWriter {
    list: Arc<SharedBlockList>,
    config: TransportConfig,
}

impl SharedBlockWriter {
    pub fn new(list: Arc<SharedBlockList>, config: TransportConfig) -> Self {
        Self { list, config }
    }

    pub fn list(&self) -> &Arc<SharedBlockList> {
        &self.list
    }
}

impl BlockTransport for SharedBlockWriter {
    fn request_block(&mut self, min_bytes: usize) -> Block {
        Block::with_capacity(self.config.block_size_for(min_bytes))
    }

    fn notify_written(&mut self, block: Block) -> Result<(), TransportError> {
        if self.list.is_finished() {
            return Err(TransportError::Closed);
        }
        self.list.append(block.into_bytes());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TransportError> {
        self.list.finish();
        debug!(blocks = self.list.len(), "Shared block list finished");
        Ok(())
    }
}

/// One reader replaying a [`SharedBlockList`] into its own decoder
pub struct SharedBlockReader<C: Canvas> {
    list: Arc<SharedBlockList>,
    decoder: Decoder<C>,
    next_block: usize,
    status: PlaybackStatus,
}

impl<C: Canvas> SharedBlockReader<C> {
    pub fn new(list: Arc<SharedBlockList>, decoder: Decoder<C>) -> Self {
        Self {
            list,
            decoder,
            next_block: 0,
            status: PlaybackStatus::NeedMoreData,
        }
    }

    /// Replay the whole list, `None` while the writer is still appending
    pub fn replay(&mut self) -> Option<PlaybackStatus> {
        if !self.list.is_finished() {
            return None;
        }
        Some(self.replay_prefix())
    }

    /// Replay the blocks appended since the last call
    pub fn replay_prefix(&mut self) -> PlaybackStatus {
        let blocks = self.list.blocks_from(self.next_block);
        for block in blocks {
            self.next_block += 1;
            self.status = self.decoder.playback(&block, false);
            if self.status.is_terminal() {
                break;
            }
        }
        self.status.clone()
    }

    pub fn decoder(&self) -> &Decoder<C> {
        &self.decoder
    }

    pub fn canvas(&self) -> &C {
        self.decoder.canvas()
    }

    pub fn into_canvas(self) -> C {
        self.decoder.into_canvas()
    }
}
