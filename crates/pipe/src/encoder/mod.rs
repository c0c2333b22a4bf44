//! Recording side of a session
//!
//! The [`Encoder`] presents the [`Canvas`](crate::canvas::Canvas) interface
//! and turns each call into opcode words written into transport blocks.
//!
//! ## Emission
//!
//! Every opcode is assembled in a scratch buffer first and then copied into
//! the current block as a whole. If it does not fit, the current block is
//! handed back to the transport and a block of at least the opcode's size
//! is requested, so an opcode never straddles two blocks.
//!
//! ## Failure
//!
//! Encoder operations never return errors. Values that cannot be encoded
//! are elided with a warning. If the transport fails, the encoder is
//! poisoned: the failure is kept in [`Encoder::transport_error`] and every
//! later operation is elided.

mod references;
mod surface;

use std::sync::Arc;

use canvas_pipe_config::SessionFlags;
use image::RgbaImage;
use tracing::{debug, trace, warn};

use crate::codec::{count_fits, WordWriter};
use crate::error::TransportError;
use crate::heap::BitmapHeap;
use crate::objects::{PaintObject, Typeface};
use crate::opcode::Op;
use crate::paint::Paint;
use crate::tables::{HandleRegistry, IndexAssigner};
use crate::transport::{Block, BlockTransport};

use self::references::PaintRefs;

/// Recording surface writing an opcode stream into a [`BlockTransport`]
///
/// Dropping the encoder finishes the session if [`Encoder::finish`] was not
/// called.
pub struct Encoder<T: BlockTransport> {
    transport: T,
    flags: SessionFlags,
    block: Option<Block>,
    scratch: WordWriter,
    /// Paint the decoder holds after the last paint update
    baseline: Paint,
    baseline_refs: PaintRefs,
    objects: IndexAssigner<PaintObject>,
    typefaces: IndexAssigner<Arc<Typeface>>,
    bitmaps: IndexAssigner<Arc<RgbaImage>>,
    handles: Option<Arc<HandleRegistry>>,
    heap: Option<Arc<BitmapHeap>>,
    bytes_written: u64,
    finished: bool,
    failed: Option<TransportError>,
}

impl<T: BlockTransport> Encoder<T> {
    /// Start a session
    ///
    /// Same-process sessions get a fresh [`HandleRegistry`] and heap modes
    /// other than `None` a fresh [`BitmapHeap`]; replace them with
    /// [`Encoder::with_handles`] and [`Encoder::with_heap`] to share them
    /// with decoders built beforehand.
    pub fn new(transport: T, flags: SessionFlags) -> Self {
        debug!(
            cross_process = flags.cross_process,
            heap_mode = ?flags.heap_mode,
            "Encoder session started"
        );
        Self {
            transport,
            flags,
            block: None,
            scratch: WordWriter::new(),
            baseline: Paint::default(),
            baseline_refs: PaintRefs::default(),
            objects: IndexAssigner::default(),
            typefaces: IndexAssigner::default(),
            bitmaps: IndexAssigner::default(),
            handles: (!flags.cross_process).then(HandleRegistry::shared),
            heap: flags.heap_mode.uses_heap().then(BitmapHeap::shared),
            bytes_written: 0,
            finished: false,
            failed: None,
        }
    }

    /// Share `handles` with same-process decoders
    pub fn with_handles(mut self, handles: Arc<HandleRegistry>) -> Self {
        self.handles = Some(handles);
        self
    }

    /// Share `heap` with decoders reading heap-backed bitmaps
    pub fn with_heap(mut self, heap: Arc<BitmapHeap>) -> Self {
        self.heap = Some(heap);
        self
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    pub fn handles(&self) -> Option<&Arc<HandleRegistry>> {
        self.handles.as_ref()
    }

    pub fn heap(&self) -> Option<&Arc<BitmapHeap>> {
        self.heap.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Total bytes of opcodes written, including unflushed ones
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The transport failure that poisoned this encoder, if any
    pub fn transport_error(&self) -> Option<&TransportError> {
        self.failed.as_ref()
    }

    /// Emit the terminal opcode and hand off the last block
    ///
    /// Only the first call has an effect.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.record(Op::Done, 0, 0, |_| {});
        self.hand_off();
        if self.failed.is_none() {
            if let Err(error) = self.transport.finish() {
                self.poison(error);
            }
        }
        self.finished = true;
        debug!(bytes = self.bytes_written, "Encoder session finished");
    }

    fn is_active(&self) -> bool {
        !self.finished && self.failed.is_none()
    }

    /// Assemble one opcode in scratch and emit it
    fn record(
        &mut self,
        op: Op,
        flags: u32,
        data: u32,
        payload: impl FnOnce(&mut WordWriter),
    ) -> bool {
        if !self.is_active() {
            return false;
        }
        self.scratch.clear();
        self.scratch.write_op(op, flags, data);
        payload(&mut self.scratch);
        self.emit(op)
    }

    /// Copy the scratch opcode into the current block
    fn emit(&mut self, op: Op) -> bool {
        if !self.is_active() {
            return false;
        }
        let len = self.scratch.len();
        if self.block.as_ref().is_none_or(|block| block.remaining() < len) {
            self.hand_off();
            if self.failed.is_some() {
                return false;
            }
            self.block = Some(self.transport.request_block(len));
        }
        let Some(block) = self.block.as_mut() else {
            return false;
        };
        if !block.write(self.scratch.as_bytes()) {
            warn!(
                ?op,
                len,
                capacity = block.capacity(),
                "Transport returned an undersized block, operation elided"
            );
            return false;
        }
        self.bytes_written += len as u64;
        trace!(?op, len, "Encoded op");
        true
    }

    /// Hand the current block back to the transport
    fn hand_off(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };
        if block.is_empty() || self.failed.is_some() {
            return;
        }
        let len = block.len();
        match self.transport.notify_written(block) {
            Ok(()) => debug!(len, "Block handed off"),
            Err(error) => self.poison(error),
        }
    }

    fn poison(&mut self, error: TransportError) {
        warn!(%error, "Transport failed, further operations are elided");
        self.failed = Some(error);
    }
}

/// Whether a count field passes the decoder's payload limit; warns if not
fn payload_fits(op: Op, count: usize, bytes_per_item: usize) -> bool {
    if count_fits(count, bytes_per_item) {
        return true;
    }
    warn!(?op, count, "Payload exceeds the stream limit, operation elided");
    false
}

impl<T: BlockTransport> Drop for Encoder<T> {
    fn drop(&mut self) {
        self.finish();
    }
}

impl<T: BlockTransport + std::fmt::Debug> std::fmt::Debug for Encoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("transport", &self.transport)
            .field("flags", &self.flags)
            .field("bytes_written", &self.bytes_written)
            .field("objects", &self.objects.len())
            .field("typefaces", &self.typefaces.len())
            .field("bitmaps", &self.bitmaps.len())
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::codec::WordReader;
    use crate::constants::{MAX_PAYLOAD_BYTES, POINT_BYTES};
    use crate::opcode::{unpack_data, unpack_flags, unpack_op, PAINT_CHANGE_LAST};
    use crate::paint::{PaintField, COLOR_RED};
    use crate::transport::MemoryTransport;
    use crate::types::{Point, PointMode, Rect};
    use std::io;

    /// Every op in `stream`, in order
    fn ops(stream: &[u8]) -> Vec<Op> {
        let mut reader = WordReader::new(stream);
        let mut ops = Vec::new();
        while reader.remaining() > 0 {
            let word = reader.read_u32().unwrap();
            let op = Op::from_wire(unpack_op(word) as u32).unwrap();
            skip_payload(&mut reader, op);
            ops.push(op);
        }
        ops
    }

    fn skip_payload(reader: &mut WordReader<'_>, op: Op) {
        match op {
            Op::PaintUpdate => loop {
                let entry = reader.read_u32().unwrap();
                let field = PaintField::from_wire(unpack_op(entry) as u32).unwrap();
                if field.has_payload() {
                    reader.read_u32().unwrap();
                }
                if unpack_flags(entry) & PAINT_CHANGE_LAST != 0 {
                    break;
                }
            },
            Op::DrawRect => {
                reader.read_rect().unwrap();
            }
            Op::Save | Op::Restore | Op::Done | Op::Flush => {}
            other => panic!("No payload skipper for {other:?}"),
        }
    }

    #[test]
    fn test_concrete_scenario_stream() {
        let mut encoder = Encoder::new(MemoryTransport::new(), SessionFlags::cross_process());
        let mut paint = Paint::default();
        encoder.save();
        paint.color = COLOR_RED;
        encoder.draw_rect(&Rect::new(0.0, 0.0, 10.0, 10.0), &paint);
        paint.stroke_width = 3.0;
        encoder.draw_rect(&Rect::new(20.0, 0.0, 30.0, 10.0), &paint);
        encoder.restore();
        encoder.finish();

        let stream = encoder.transport().stream();
        assert_eq!(
            ops(&stream),
            vec![
                Op::Save,
                Op::PaintUpdate,
                Op::DrawRect,
                Op::PaintUpdate,
                Op::DrawRect,
                Op::Restore,
                Op::Done
            ]
        );
    }

    #[test]
    fn test_single_change_single_entry() {
        let mut encoder = Encoder::new(MemoryTransport::new(), SessionFlags::cross_process());
        let mut paint = Paint::with_color(COLOR_RED);
        encoder.draw_paint(&paint);
        let before = encoder.bytes_written();
        paint.stroke_width = 3.0;
        encoder.draw_paint(&paint);
        encoder.finish();

        let stream = encoder.transport().stream();
        // PaintUpdate word, one entry word, one payload word, DrawPaint word
        let second = &stream[before as usize..];
        let mut reader = WordReader::new(second);
        let word = reader.read_u32().unwrap();
        assert_eq!(unpack_op(word), Op::PaintUpdate as u8);
        let entry = reader.read_u32().unwrap();
        assert_eq!(unpack_op(entry), PaintField::StrokeWidth as u8);
        assert_eq!(unpack_flags(entry), PAINT_CHANGE_LAST);
        assert_eq!(reader.read_f32().unwrap(), 3.0);
        let word = reader.read_u32().unwrap();
        assert_eq!(unpack_op(word), Op::DrawPaint as u8);
        assert_eq!(unpack_data(word), 0);
    }

    #[test]
    fn test_unchanged_paint_emits_no_update() {
        let mut encoder = Encoder::new(MemoryTransport::new(), SessionFlags::cross_process());
        let paint = Paint::default();
        encoder.draw_paint(&paint);
        encoder.draw_paint(&paint);
        // Two bare draw words
        assert_eq!(encoder.bytes_written(), 8);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut once = Encoder::new(MemoryTransport::new(), SessionFlags::cross_process());
        once.save();
        once.finish();

        let mut twice = Encoder::new(MemoryTransport::new(), SessionFlags::cross_process());
        twice.save();
        twice.finish();
        twice.finish();
        twice.restore();

        assert_eq!(once.transport().stream(), twice.transport().stream());
        assert!(twice.is_finished());
    }

    #[test]
    fn test_ops_never_straddle_blocks() {
        let transport = MemoryTransport::with_config(canvas_pipe_config::TransportConfig {
            min_block_size: 16,
            growth_factor: 1,
        });
        let mut encoder = Encoder::new(transport, SessionFlags::cross_process());
        for i in 0..10 {
            encoder.draw_rect(&Rect::from_xywh(i as f32, 0.0, 1.0, 1.0), &Paint::default());
        }
        encoder.draw_text("a longer text run than one block", 0.0, 0.0, &Paint::default());
        encoder.finish();

        for block in encoder.transport().blocks() {
            assert!(!block.is_empty());
            assert_eq!(block.len() % 4, 0);
            let word = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
            assert!(Op::from_wire(unpack_op(word) as u32).is_some());
        }
        assert!(encoder.transport().blocks().len() > 1);
    }

    #[test]
    fn test_oversized_counts_elided() {
        let mut encoder = Encoder::new(MemoryTransport::new(), SessionFlags::cross_process());
        let paint = Paint::with_color(COLOR_RED);
        let points = vec![Point::new(1.0, 1.0); MAX_PAYLOAD_BYTES / POINT_BYTES + 1];
        encoder.draw_points(PointMode::Points, &points, &paint);
        encoder.draw_text(&"a".repeat(MAX_PAYLOAD_BYTES + 1), 0.0, 0.0, &paint);
        // Nothing written, not even the paint update
        assert_eq!(encoder.bytes_written(), 0);

        encoder.draw_points(PointMode::Points, &points[..2], &paint);
        assert!(encoder.bytes_written() > 0);
    }

    #[derive(Debug, Default)]
    struct FailingTransport {
        attempts: usize,
    }

    impl BlockTransport for FailingTransport {
        fn request_block(&mut self, min_bytes: usize) -> Block {
            Block::with_capacity(min_bytes)
        }

        fn notify_written(&mut self, _block: Block) -> Result<(), TransportError> {
            self.attempts += 1;
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone").into())
        }
    }

    #[test]
    fn test_transport_failure_poisons() {
        let mut encoder = Encoder::new(FailingTransport::default(), SessionFlags::cross_process());
        encoder.save();
        encoder.flush();
        assert!(matches!(
            encoder.transport_error(),
            Some(TransportError::Io(_))
        ));
        let written = encoder.bytes_written();
        encoder.restore();
        encoder.flush();
        encoder.finish();
        assert_eq!(encoder.bytes_written(), written);
        assert_eq!(encoder.transport().attempts, 1);
    }
}
