//! Playback side of a session
//!
//! A [`Decoder`] reads opcode words, rebuilds paint and object-table state,
//! and replays each operation against its target [`Canvas`].
//!
//! ## Resumable playback
//!
//! [`Decoder::playback`] takes the next chunk of stream bytes. An opcode is
//! only applied once all of its bytes are available; if a chunk ends inside
//! an opcode the incomplete tail is kept and the call returns
//! [`PlaybackStatus::NeedMoreData`]. The next call passes only the bytes that
//! follow, so a capture can be replayed while it is still being written.
//!
//! ## Atomic playback
//!
//! With `atomic` set, playback stops after one surface-affecting opcode and
//! returns [`PlaybackStatus::ReadOneStep`]. Paint updates and definitions do
//! not end a step. Remaining bytes stay buffered; call `playback(&[], true)`
//! to take the next step.

mod define;
mod dispatch;
mod paint_update;

use std::sync::Arc;

use canvas_pipe_config::SessionFlags;
use image::RgbaImage;
use tracing::{debug, trace, warn};

use crate::canvas::Canvas;
use crate::codec::{Interrupt, WordReader};
use crate::error::{DecodeError, HeapError};
use crate::heap::{BitmapHeap, HeapReader};
use crate::objects::{FactoryTable, PaintObject, Typeface};
use crate::opcode::Op;
use crate::paint::Paint;
use crate::tables::{HandleRegistry, ObjectTable};
use crate::types::Matrix;

/// Outcome of a [`Decoder::playback`] call
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackStatus {
    /// The terminal opcode was read; terminal
    Done,
    /// The bytes ran out; call again with more
    NeedMoreData,
    /// Atomic mode completed one surface operation
    ReadOneStep,
    /// The stream is malformed at absolute byte `offset`; terminal
    Error { offset: u64, error: DecodeError },
}

impl PlaybackStatus {
    /// Whether no further playback is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackStatus::Done | PlaybackStatus::Error { .. })
    }
}

/// Playback state machine for one session
pub struct Decoder<C: Canvas> {
    canvas: C,
    flags: SessionFlags,
    paint: Paint,
    objects: ObjectTable<PaintObject>,
    typefaces: ObjectTable<Arc<Typeface>>,
    bitmaps: ObjectTable<Arc<RgbaImage>>,
    handles: Option<Arc<HandleRegistry>>,
    factories: FactoryTable,
    heap: Option<Box<dyn HeapReader>>,
    /// Applied ahead of the stream's own transforms
    offset: Matrix,
    /// Bytes of an incomplete opcode carried to the next call
    pending: Vec<u8>,
    consumed: u64,
    terminal: Option<PlaybackStatus>,
}

impl<C: Canvas> Decoder<C> {
    /// Create a decoder; `flags` must match the encoder's
    pub fn new(canvas: C, flags: SessionFlags) -> Self {
        Self {
            canvas,
            flags,
            paint: Paint::default(),
            objects: ObjectTable::new("object"),
            typefaces: ObjectTable::new("typeface"),
            bitmaps: ObjectTable::new("bitmap"),
            handles: None,
            factories: FactoryTable::new(),
            heap: None,
            offset: Matrix::IDENTITY,
            pending: Vec::new(),
            consumed: 0,
            terminal: None,
        }
    }

    /// Registry resolving same-process handles
    pub fn with_handles(mut self, handles: Arc<HandleRegistry>) -> Self {
        self.handles = Some(handles);
        self
    }

    /// Constructors for cross-process object definitions
    pub fn with_factories(mut self, factories: FactoryTable) -> Self {
        self.factories = factories;
        self
    }

    /// Read heap-backed bitmaps through `heap` in the session's heap mode
    pub fn with_heap(self, heap: &Arc<BitmapHeap>) -> Result<Self, HeapError> {
        let reader = heap.reader(self.flags.heap_mode)?;
        Ok(self.with_heap_reader(reader))
    }

    pub fn with_heap_reader(mut self, reader: Box<dyn HeapReader>) -> Self {
        self.heap = Some(reader);
        self
    }

    /// Translate everything the stream draws by `(dx, dy)`
    ///
    /// Must be applied before the first playback call.
    pub fn with_offset(mut self, dx: f32, dy: f32) -> Self {
        if dx == 0.0 && dy == 0.0 {
            return self;
        }
        let translate = Matrix::translate(dx, dy);
        self.offset = self.offset.concat(&translate);
        self.canvas.concat(&translate);
        self
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    /// Paint state after the paint updates played so far
    pub fn paint(&self) -> &Paint {
        &self.paint
    }

    /// Stream bytes fully played so far
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    /// Bytes of an incomplete opcode waiting for more data
    pub fn bytes_pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Play the next chunk of stream bytes
    ///
    /// After [`PlaybackStatus::Done`] or [`PlaybackStatus::Error`] every
    /// call returns the same status without reading.
    pub fn playback(&mut self, bytes: &[u8], atomic: bool) -> PlaybackStatus {
        if let Some(status) = &self.terminal {
            return status.clone();
        }

        let status = if self.pending.is_empty() {
            let (used, status) = self.run(bytes, atomic);
            self.pending.extend_from_slice(&bytes[used..]);
            status
        } else {
            let mut buffer = std::mem::take(&mut self.pending);
            buffer.extend_from_slice(bytes);
            let (used, status) = self.run(&buffer, atomic);
            buffer.drain(..used);
            self.pending = buffer;
            status
        };

        if status.is_terminal() {
            self.pending = Vec::new();
        }
        status
    }

    /// Play whole opcodes from `data`, returning the bytes used
    fn run(&mut self, data: &[u8], atomic: bool) -> (usize, PlaybackStatus) {
        let mut reader = WordReader::new(data);
        loop {
            let start = reader.position();
            if reader.remaining() == 0 {
                return (start, PlaybackStatus::NeedMoreData);
            }
            match self.step(&mut reader) {
                Ok(op) => {
                    let end = reader.position();
                    self.consumed += (end - start) as u64;
                    trace!(?op, offset = self.consumed, "Played op");
                    if op == Op::Done {
                        debug!(bytes = self.consumed, "Playback done");
                        self.terminal = Some(PlaybackStatus::Done);
                        return (end, PlaybackStatus::Done);
                    }
                    if atomic && op.is_surface_affecting() {
                        return (end, PlaybackStatus::ReadOneStep);
                    }
                }
                Err(Interrupt::NeedMoreData) => {
                    return (start, PlaybackStatus::NeedMoreData);
                }
                Err(Interrupt::Malformed(error)) => {
                    let offset = self.consumed;
                    warn!(offset, %error, "Malformed stream, playback stopped");
                    let status = PlaybackStatus::Error { offset, error };
                    self.terminal = Some(status.clone());
                    return (start, status);
                }
            }
        }
    }
}

impl<C: Canvas + std::fmt::Debug> std::fmt::Debug for Decoder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("canvas", &self.canvas)
            .field("flags", &self.flags)
            .field("objects", &self.objects.len())
            .field("typefaces", &self.typefaces.len())
            .field("bitmaps", &self.bitmaps.len())
            .field("consumed", &self.consumed)
            .field("pending", &self.pending.len())
            .field("terminal", &self.terminal)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{CanvasCall, DrawCall, RecordingCanvas};
    use crate::codec::WordWriter;
    use crate::constants::{MAX_PAYLOAD_BYTES, POINT_BYTES};
    use crate::encoder::Encoder;
    use crate::objects::{
        BlendColorFilter, BlurMaskFilter, BlurStyle, ColorFilter, DashPathEffect, LinearGradient,
        MaskFilter, ObjectKind, PathEffect, Shader, TileMode,
    };
    use crate::opcode::{pack, DEFINE_FLATTENED, PAINT_CHANGE_LAST};
    use crate::paint::{
        BlendMode, PaintField, PaintStyle, COLOR_BLUE, COLOR_GREEN, COLOR_RED, COLOR_WHITE,
    };
    use crate::transport::MemoryTransport;
    use crate::types::{ClipOp, Path, Point, PointMode, Rect, VertexMode, Vertices};
    use canvas_pipe_config::HeapMode;

    fn encode(
        flags: SessionFlags,
        draw: impl FnOnce(&mut Encoder<MemoryTransport>),
    ) -> Encoder<MemoryTransport> {
        let mut encoder = Encoder::new(MemoryTransport::new(), flags);
        draw(&mut encoder);
        encoder.finish();
        encoder
    }

    fn checker_image() -> Arc<RgbaImage> {
        let mut image = RgbaImage::new(2, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(1, 1, image::Rgba([0, 0, 255, 128]));
        Arc::new(image)
    }

    /// One call of every kind, sharing sub-objects between draws
    fn draw_everything<C: Canvas>(canvas: &mut C) {
        let image = checker_image();
        let gradient = Arc::new(Shader::LinearGradient(LinearGradient {
            start: Point::new(0.0, 0.0),
            end: Point::new(50.0, 0.0),
            colors: vec![COLOR_RED, COLOR_BLUE],
            stops: Some(vec![0.0, 1.0]),
            tile_mode: TileMode::Repeat,
        }));
        let typeface = Arc::new(Typeface::new("Sans"));

        let mut paint = Paint::with_color(COLOR_GREEN);
        paint.set_anti_alias(true);

        canvas.save();
        canvas.save_layer(Some(&Rect::new(0.0, 0.0, 64.0, 64.0)), Some(&paint));
        canvas.save_layer(None, None);
        canvas.concat(&Matrix::translate(4.0, 2.0));
        canvas.clip_rect(&Rect::new(1.0, 1.0, 60.0, 60.0), ClipOp::Intersect, true);

        let mut clip = Path::new();
        clip.move_to(0.0, 0.0).line_to(30.0, 0.0).line_to(0.0, 30.0).close();
        canvas.clip_path(&clip, ClipOp::Difference, false);
        canvas.clear(COLOR_WHITE);

        paint.shader = Some(Arc::clone(&gradient));
        canvas.draw_paint(&paint);

        paint.shader = None;
        paint.style = PaintStyle::Stroke;
        paint.stroke_width = 2.5;
        paint.path_effect = Some(Arc::new(PathEffect::Dash(DashPathEffect {
            intervals: vec![4.0, 2.0],
            phase: 1.0,
        })));
        canvas.draw_rect(&Rect::new(5.0, 5.0, 20.0, 20.0), &paint);

        paint.mask_filter = Some(Arc::new(MaskFilter::Blur(BlurMaskFilter {
            style: BlurStyle::Outer,
            sigma: 1.5,
        })));
        canvas.draw_oval(&Rect::new(10.0, 10.0, 30.0, 20.0), &paint);

        let mut path = Path::new();
        path.move_to(1.0, 1.0)
            .quad_to(5.0, 0.0, 9.0, 1.0)
            .cubic_to(Point::new(9.0, 5.0), Point::new(5.0, 9.0), Point::new(1.0, 9.0))
            .close();
        paint.color_filter = Some(Arc::new(ColorFilter::Blend(BlendColorFilter {
            color: COLOR_BLUE,
            mode: BlendMode::Multiply,
        })));
        canvas.draw_path(&path, &paint);

        let points = [Point::new(0.0, 0.0), Point::new(3.0, 4.0), Point::new(6.0, 0.0)];
        canvas.draw_points(PointMode::Polygon, &points, &paint);

        let plain = Paint::default();
        canvas.draw_bitmap(&image, 8.0, 8.0, &plain);
        canvas.draw_bitmap_rect(
            &image,
            Some(&Rect::new(0.0, 0.0, 1.0, 1.0)),
            &Rect::new(0.0, 0.0, 16.0, 16.0),
            &plain,
        );
        canvas.draw_bitmap_rect(&image, None, &Rect::new(16.0, 0.0, 32.0, 16.0), &plain);

        let mut text_paint = Paint::with_color(COLOR_BLUE);
        text_paint.typeface = Some(Arc::clone(&typeface));
        text_paint.text_size = 18.0;
        canvas.draw_text("hello", 2.0, 20.0, &text_paint);
        canvas.draw_pos_text("ab", &[Point::new(1.0, 2.0), Point::new(3.0, 4.0)], &text_paint);

        let vertices = Vertices {
            mode: VertexMode::TriangleFan,
            positions: vec![Point::new(0.0, 0.0), Point::new(8.0, 0.0), Point::new(0.0, 8.0)],
            tex_coords: Some(vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(0.0, 1.0),
            ]),
            colors: Some(vec![COLOR_RED, COLOR_GREEN, COLOR_BLUE]),
            indices: Some(vec![0, 1, 2]),
        };
        canvas.draw_vertices(&vertices, &plain);

        canvas.set_matrix(&Matrix::scale(2.0, 2.0));
        canvas.draw_rect(&Rect::new(0.0, 0.0, 1.0, 1.0), &paint);
        canvas.restore();
        canvas.restore();
        canvas.restore();
        canvas.flush();
    }

    fn expected_calls() -> Vec<CanvasCall> {
        let mut canvas = RecordingCanvas::new();
        draw_everything(&mut canvas);
        canvas.into_calls()
    }

    #[test]
    fn test_cross_process_roundtrip() {
        let flags = SessionFlags::cross_process();
        let encoder = encode(flags, draw_everything);
        let stream = encoder.transport().stream();

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
        assert_eq!(decoder.playback(&stream, false), PlaybackStatus::Done);
        assert_eq!(decoder.canvas().calls(), expected_calls().as_slice());
        assert_eq!(decoder.bytes_consumed(), stream.len() as u64);
    }

    #[test]
    fn test_same_process_roundtrip_shares_objects() {
        let flags = SessionFlags::same_process();
        let encoder = encode(flags, draw_everything);
        let stream = encoder.transport().stream();
        let handles = encoder.handles().cloned().unwrap();
        assert!(handles.object_count() > 0);
        assert_eq!(handles.typeface_count(), 1);

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags).with_handles(handles);
        assert_eq!(decoder.playback(&stream, false), PlaybackStatus::Done);
        assert_eq!(decoder.canvas().calls(), expected_calls().as_slice());
    }

    #[test]
    fn test_replay_into_encoder_reencodes() {
        let flags = SessionFlags::cross_process();
        let stream = encode(flags, draw_everything).transport().stream();

        let reencoder = Encoder::new(MemoryTransport::new(), flags);
        let mut relay = Decoder::new(reencoder, flags);
        assert_eq!(relay.playback(&stream, false), PlaybackStatus::Done);
        let mut reencoder = relay.into_canvas();
        reencoder.finish();
        let restream = reencoder.transport().stream();

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
        assert_eq!(decoder.playback(&restream, false), PlaybackStatus::Done);
        assert_eq!(decoder.canvas().calls(), expected_calls().as_slice());
    }

    fn scenario(encoder: &mut Encoder<MemoryTransport>) {
        let mut paint = Paint::default();
        encoder.save();
        paint.color = COLOR_RED;
        encoder.draw_rect(&Rect::new(0.0, 0.0, 10.0, 10.0), &paint);
        paint.stroke_width = 3.0;
        encoder.draw_rect(&Rect::new(20.0, 0.0, 30.0, 10.0), &paint);
        encoder.restore();
    }

    #[test]
    fn test_concrete_scenario_replay() {
        let flags = SessionFlags::cross_process();
        let stream = encode(flags, scenario).transport().stream();

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
        assert_eq!(decoder.playback(&stream, false), PlaybackStatus::Done);

        let calls = decoder.canvas().calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], CanvasCall::Save);
        assert_eq!(calls[3], CanvasCall::Restore);
        match &calls[1] {
            CanvasCall::Draw { call, paint, .. } => {
                assert_eq!(*call, DrawCall::Rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
                assert_eq!(paint.color, COLOR_RED);
                assert_eq!(paint.stroke_width, 0.0);
            }
            other => panic!("Expected draw, got {other:?}"),
        }
        match &calls[2] {
            CanvasCall::Draw { call, paint, .. } => {
                assert_eq!(*call, DrawCall::Rect(Rect::new(20.0, 0.0, 30.0, 10.0)));
                assert_eq!(paint.color, COLOR_RED);
                assert_eq!(paint.stroke_width, 3.0);
            }
            other => panic!("Expected draw, got {other:?}"),
        }
    }

    #[test]
    fn test_split_at_every_offset() {
        let flags = SessionFlags::cross_process();
        let stream = encode(flags, draw_everything).transport().stream();
        let expected = expected_calls();

        for split in 0..=stream.len() {
            let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
            let first = decoder.playback(&stream[..split], false);
            if split < stream.len() {
                assert_eq!(first, PlaybackStatus::NeedMoreData, "split at {split}");
            }
            assert_eq!(
                decoder.playback(&stream[split..], false),
                PlaybackStatus::Done,
                "split at {split}"
            );
            assert_eq!(decoder.canvas().calls(), expected.as_slice(), "split at {split}");
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let flags = SessionFlags::cross_process();
        let stream = encode(flags, draw_everything).transport().stream();

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
        let mut status = PlaybackStatus::NeedMoreData;
        for byte in &stream {
            status = decoder.playback(std::slice::from_ref(byte), false);
        }
        assert_eq!(status, PlaybackStatus::Done);
        assert_eq!(decoder.canvas().calls(), expected_calls().as_slice());
        assert_eq!(decoder.bytes_pending(), 0);
    }

    #[test]
    fn test_atomic_steps_one_surface_op() {
        let flags = SessionFlags::cross_process();
        let stream = encode(flags, scenario).transport().stream();

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
        assert_eq!(decoder.playback(&stream, true), PlaybackStatus::ReadOneStep);
        assert_eq!(decoder.canvas().calls(), &[CanvasCall::Save]);

        // Paint update is stepped over together with the draw it prepares
        assert_eq!(decoder.playback(&[], true), PlaybackStatus::ReadOneStep);
        assert_eq!(decoder.canvas().calls().len(), 2);
        assert_eq!(decoder.paint().color, COLOR_RED);

        assert_eq!(decoder.playback(&[], true), PlaybackStatus::ReadOneStep);
        assert_eq!(decoder.playback(&[], true), PlaybackStatus::ReadOneStep);
        assert_eq!(decoder.canvas().calls().len(), 4);
        assert_eq!(decoder.playback(&[], true), PlaybackStatus::Done);
        assert_eq!(decoder.bytes_consumed(), stream.len() as u64);
    }

    #[test]
    fn test_unknown_op_reports_offset() {
        let mut w = WordWriter::new();
        w.write_op(Op::Save, 0, 0);
        w.write_u32(pack(0x7F, 0, 0));
        w.write_op(Op::Restore, 0, 0);

        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::default());
        let status = decoder.playback(w.as_bytes(), false);
        assert_eq!(
            status,
            PlaybackStatus::Error {
                offset: 4,
                error: DecodeError::UnknownOp(0x7F)
            }
        );
        assert_eq!(decoder.canvas().calls(), &[CanvasCall::Save]);
        assert_eq!(decoder.bytes_pending(), 0);
    }

    #[test]
    fn test_terminal_status_is_sticky() {
        let mut w = WordWriter::new();
        w.write_op(Op::Save, 0, 0);
        w.write_op(Op::Done, 0, 0);

        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::default());
        assert_eq!(decoder.playback(w.as_bytes(), false), PlaybackStatus::Done);
        assert!(decoder.is_terminal());
        assert_eq!(decoder.playback(w.as_bytes(), false), PlaybackStatus::Done);
        assert_eq!(decoder.canvas().calls().len(), 1);
        assert_eq!(decoder.bytes_consumed(), 8);

        let mut bad = Decoder::new(RecordingCanvas::new(), SessionFlags::default());
        let status = bad.playback(&pack(0x7E, 0, 0).to_le_bytes(), false);
        assert!(status.is_terminal());
        assert_eq!(bad.playback(w.as_bytes(), false), status);
        assert!(bad.canvas().calls().is_empty());
    }

    #[test]
    fn test_undefined_bitmap_index() {
        let mut w = WordWriter::new();
        w.write_op(Op::DrawBitmap, 0, 5);
        w.write_f32(0.0);
        w.write_f32(0.0);

        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::default());
        assert_eq!(
            decoder.playback(w.as_bytes(), false),
            PlaybackStatus::Error {
                offset: 0,
                error: DecodeError::UndefinedIndex {
                    table: "bitmap",
                    index: 5
                }
            }
        );
    }

    #[test]
    fn test_failed_paint_update_leaves_paint_untouched() {
        let mut w = WordWriter::new();
        w.write_op(Op::PaintUpdate, 0, 0);
        w.write_u32(pack(PaintField::Color as u8, 0, 0));
        w.write_u32(COLOR_BLUE);
        w.write_u32(pack(PaintField::Shader as u8, PAINT_CHANGE_LAST, 3));

        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::cross_process());
        let status = decoder.playback(w.as_bytes(), false);
        assert!(matches!(
            status,
            PlaybackStatus::Error {
                error: DecodeError::UndefinedIndex {
                    table: "object",
                    index: 3
                },
                ..
            }
        ));
        assert_eq!(decoder.paint(), &Paint::default());
    }

    #[test]
    fn test_out_of_order_define() {
        let mut w = WordWriter::new();
        w.write_op(Op::DefineTypeface, DEFINE_FLATTENED, 2);
        w.write_str("Serif");
        w.write_u32(400);
        w.write_u32(0);

        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::cross_process());
        assert_eq!(
            decoder.playback(w.as_bytes(), false),
            PlaybackStatus::Error {
                offset: 0,
                error: DecodeError::OutOfOrderDefine {
                    table: "typeface",
                    expected: 1,
                    got: 2
                }
            }
        );
    }

    #[test]
    fn test_object_kind_must_match_factory() {
        let dash = PaintObject::from(PathEffect::Dash(DashPathEffect {
            intervals: vec![1.0, 1.0],
            phase: 0.0,
        }))
        .flatten()
        .unwrap();
        let mut w = WordWriter::new();
        w.write_op(Op::DefineObject, DEFINE_FLATTENED, 1);
        w.write_u32(ObjectKind::Shader.to_wire());
        w.write_str(&dash.name);
        w.write_bytes(&dash.data);

        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::cross_process());
        assert!(matches!(
            decoder.playback(w.as_bytes(), false),
            PlaybackStatus::Error {
                error: DecodeError::KindMismatch {
                    index: 1,
                    expected: "shader",
                    found: "path effect"
                },
                ..
            }
        ));
    }

    #[test]
    fn test_session_mode_mismatch() {
        let stream = encode(SessionFlags::cross_process(), draw_everything)
            .transport()
            .stream();
        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::same_process());
        assert!(matches!(
            decoder.playback(&stream, false),
            PlaybackStatus::Error {
                error: DecodeError::ModeMismatch(true),
                ..
            }
        ));
    }

    #[test]
    fn test_missing_factory() {
        let flags = SessionFlags::cross_process();
        let stream = encode(flags, draw_everything).transport().stream();
        let mut decoder =
            Decoder::new(RecordingCanvas::new(), flags).with_factories(FactoryTable::empty());
        assert!(matches!(
            decoder.playback(&stream, false),
            PlaybackStatus::Error {
                error: DecodeError::UnknownFactory(name),
                ..
            } if name == "LinearGradient"
        ));
    }

    #[test]
    fn test_same_process_without_registry() {
        let flags = SessionFlags::same_process();
        let stream = encode(flags, draw_everything).transport().stream();
        let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
        assert!(matches!(
            decoder.playback(&stream, false),
            PlaybackStatus::Error {
                error: DecodeError::NoHandleRegistry,
                ..
            }
        ));
    }

    fn draw_image_twice(encoder: &mut Encoder<MemoryTransport>) {
        let image = checker_image();
        encoder.draw_bitmap(&image, 0.0, 0.0, &Paint::default());
        encoder.draw_bitmap(&image, 4.0, 0.0, &Paint::default());
    }

    fn drawn_images(canvas: &RecordingCanvas) -> Vec<Arc<RgbaImage>> {
        canvas
            .calls()
            .iter()
            .filter_map(|call| match call {
                CanvasCall::Draw {
                    call: DrawCall::Bitmap { image, .. },
                    ..
                } => Some(Arc::clone(image)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_exclusive_heap_playback() {
        let flags = SessionFlags::same_process().with_heap_mode(HeapMode::Exclusive);
        let encoder = encode(flags, draw_image_twice);
        let heap = encoder.heap().cloned().unwrap();
        assert_eq!(heap.len(), 1);
        let stream = encoder.transport().stream();

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags)
            .with_heap(&heap)
            .unwrap();
        assert!(matches!(
            Decoder::new(RecordingCanvas::new(), flags).with_heap(&heap),
            Err(HeapError::AlreadyClaimed)
        ));
        assert_eq!(decoder.playback(&stream, false), PlaybackStatus::Done);

        let images = drawn_images(decoder.canvas());
        assert_eq!(images.len(), 2);
        // Exclusive readers see the heap's own allocation
        assert!(Arc::ptr_eq(&images[0], &heap.get(1).unwrap()));

        drop(decoder);
        assert!(!heap.is_claimed());
    }

    #[test]
    fn test_copy_on_read_heap_playback() {
        let flags = SessionFlags::same_process().with_heap_mode(HeapMode::CopyOnRead);
        let encoder = encode(flags, draw_image_twice);
        let heap = encoder.heap().cloned().unwrap();
        let stream = encoder.transport().stream();

        let mut first = Decoder::new(RecordingCanvas::new(), flags)
            .with_heap(&heap)
            .unwrap();
        let mut second = Decoder::new(RecordingCanvas::new(), flags)
            .with_heap(&heap)
            .unwrap();
        assert_eq!(first.playback(&stream, false), PlaybackStatus::Done);
        assert_eq!(second.playback(&stream, false), PlaybackStatus::Done);

        let shared = heap.get(1).unwrap();
        let a = drawn_images(first.canvas());
        let b = drawn_images(second.canvas());
        assert_eq!(*a[0], *shared);
        assert!(!Arc::ptr_eq(&a[0], &shared));
        assert!(!Arc::ptr_eq(&a[0], &b[0]));
        assert!(Arc::ptr_eq(&a[0], &a[1]));
    }

    #[test]
    fn test_heap_stream_without_reader() {
        let flags = SessionFlags::same_process().with_heap_mode(HeapMode::CopyOnRead);
        let stream = encode(flags, draw_image_twice).transport().stream();
        let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
        assert!(matches!(
            decoder.playback(&stream, false),
            PlaybackStatus::Error {
                error: DecodeError::NoHeap,
                ..
            }
        ));
    }

    #[test]
    fn test_offset_applies_before_set_matrix() {
        let flags = SessionFlags::cross_process();
        let stream = encode(flags, |e| {
            e.set_matrix(&Matrix::scale(2.0, 2.0));
            e.draw_rect(&Rect::new(50.0, 0.0, 60.0, 10.0), &Paint::default());
        })
        .transport()
        .stream();

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags).with_offset(-100.0, 0.0);
        assert_eq!(decoder.playback(&stream, false), PlaybackStatus::Done);

        let shift = Matrix::translate(-100.0, 0.0);
        let total = shift.concat(&Matrix::scale(2.0, 2.0));
        let calls = decoder.canvas().calls();
        assert_eq!(calls[0], CanvasCall::Concat(shift));
        assert_eq!(calls[1], CanvasCall::SetMatrix(total));
        assert_eq!(
            total.map_point(Point::new(50.0, 0.0)),
            Point::new(0.0, 0.0)
        );
    }

    #[test]
    fn test_zero_offset_is_noop() {
        let decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::default())
            .with_offset(0.0, 0.0);
        assert!(decoder.canvas().calls().is_empty());
    }

    #[test]
    fn test_flattened_typeface_rejects_bad_weight() {
        let mut w = WordWriter::new();
        w.write_op(Op::DefineTypeface, DEFINE_FLATTENED, 1);
        w.write_str("Mono");
        w.write_u32(70_000);
        w.write_u32(0);

        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::cross_process());
        assert!(matches!(
            decoder.playback(w.as_bytes(), false),
            PlaybackStatus::Error {
                error: DecodeError::InvalidEnum {
                    kind: "font weight",
                    value: 70_000
                },
                ..
            }
        ));
    }

    #[test]
    fn test_oversized_draws_leave_a_readable_stream() {
        let flags = SessionFlags::cross_process();
        let encoder = encode(flags, |encoder| {
            let paint = Paint::with_color(COLOR_BLUE);
            let points = vec![Point::new(0.0, 0.0); MAX_PAYLOAD_BYTES / POINT_BYTES + 1];
            encoder.draw_points(PointMode::Lines, &points, &paint);
            encoder.draw_pos_text("ab", &points, &paint);
            let image = Arc::new(RgbaImage::new(4096, 4097));
            encoder.draw_bitmap(&image, 0.0, 0.0, &paint);
            encoder.clear(COLOR_RED);
        });
        let stream = encoder.transport().stream();

        let mut decoder = Decoder::new(RecordingCanvas::new(), flags);
        assert_eq!(decoder.playback(&stream, false), PlaybackStatus::Done);
        assert_eq!(decoder.canvas().calls(), &[CanvasCall::Clear(COLOR_RED)]);
    }

    #[test]
    fn test_inline_bitmap_size_mismatch() {
        let mut w = WordWriter::new();
        w.write_op(Op::DefineBitmap, 0, 1);
        w.write_u32(2);
        w.write_u32(2);
        w.write_bytes(&[0u8; 12]);

        let mut decoder = Decoder::new(RecordingCanvas::new(), SessionFlags::default());
        assert_eq!(
            decoder.playback(w.as_bytes(), false),
            PlaybackStatus::Error {
                offset: 0,
                error: DecodeError::BitmapSize {
                    width: 2,
                    height: 2,
                    len: 12
                }
            }
        );
    }
}
