//! Target surface interface
//!
//! [`Canvas`] is what a decoder replays into and what the encoder itself
//! presents to callers. Rendering semantics are left to implementors.
//! [`RecordingCanvas`] keeps every call as a [`CanvasCall`] value, which is
//! what debugging tools and tests compare against.

use std::sync::Arc;

use image::RgbaImage;

use crate::paint::{Color, Paint};
use crate::types::{ClipOp, Matrix, Path, Point, PointMode, Rect, Vertices};

/// A drawing surface
pub trait Canvas {
    fn save(&mut self);
    fn save_layer(&mut self, bounds: Option<&Rect>, paint: Option<&Paint>);
    fn restore(&mut self);

    /// Pre-multiply the current matrix by `matrix`
    fn concat(&mut self, matrix: &Matrix);
    fn set_matrix(&mut self, matrix: &Matrix);

    fn clip_rect(&mut self, rect: &Rect, op: ClipOp, anti_alias: bool);
    fn clip_path(&mut self, path: &Path, op: ClipOp, anti_alias: bool);

    fn clear(&mut self, color: Color);
    fn draw_paint(&mut self, paint: &Paint);
    fn draw_rect(&mut self, rect: &Rect, paint: &Paint);
    fn draw_oval(&mut self, oval: &Rect, paint: &Paint);
    fn draw_path(&mut self, path: &Path, paint: &Paint);
    fn draw_points(&mut self, mode: PointMode, points: &[Point], paint: &Paint);
    fn draw_bitmap(&mut self, image: &Arc<RgbaImage>, left: f32, top: f32, paint: &Paint);
    fn draw_bitmap_rect(
        &mut self,
        image: &Arc<RgbaImage>,
        src: Option<&Rect>,
        dst: &Rect,
        paint: &Paint,
    );
    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &Paint);
    fn draw_pos_text(&mut self, text: &str, positions: &[Point], paint: &Paint);
    fn draw_vertices(&mut self, vertices: &Vertices, paint: &Paint);

    /// Submit pending work
    fn flush(&mut self) {}
}

/// Geometry of one draw call
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Paint,
    Rect(Rect),
    Oval(Rect),
    Path(Path),
    Points(PointMode, Vec<Point>),
    Bitmap {
        image: Arc<RgbaImage>,
        left: f32,
        top: f32,
    },
    BitmapRect {
        image: Arc<RgbaImage>,
        src: Option<Rect>,
        dst: Rect,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
    },
    PosText {
        text: String,
        positions: Vec<Point>,
    },
    Vertices(Vertices),
}

/// One recorded surface call
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasCall {
    Save,
    SaveLayer {
        bounds: Option<Rect>,
        paint: Option<Paint>,
    },
    Restore,
    Concat(Matrix),
    SetMatrix(Matrix),
    ClipRect {
        rect: Rect,
        op: ClipOp,
        anti_alias: bool,
    },
    ClipPath {
        path: Path,
        op: ClipOp,
        anti_alias: bool,
    },
    Clear(Color),
    /// A draw, with the paint in effect and the matrix it was drawn under
    Draw {
        call: DrawCall,
        paint: Paint,
        matrix: Matrix,
    },
    Flush,
}

impl CanvasCall {
    pub fn is_draw(&self) -> bool {
        matches!(self, CanvasCall::Draw { .. })
    }
}

/// Surface that records calls instead of rendering them
///
/// Tracks the current matrix through save/restore so each recorded draw
/// carries the transform it would have been rendered with.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    calls: Vec<CanvasCall>,
    matrix: Matrix,
    saved: Vec<Matrix>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[CanvasCall] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<CanvasCall> {
        self.calls
    }

    /// Only the draw calls, in order
    pub fn draws(&self) -> Vec<&CanvasCall> {
        self.calls.iter().filter(|c| c.is_draw()).collect()
    }

    /// Current total matrix
    pub fn matrix(&self) -> Matrix {
        self.matrix
    }

    /// Current save depth
    pub fn save_count(&self) -> usize {
        self.saved.len()
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn push_draw(&mut self, call: DrawCall, paint: &Paint) {
        self.calls.push(CanvasCall::Draw {
            call,
            paint: paint.clone(),
            matrix: self.matrix,
        });
    }
}

impl Canvas for RecordingCanvas {
    fn save(&mut self) {
        self.saved.push(self.matrix);
        self.calls.push(CanvasCall::Save);
    }

    fn save_layer(&mut self, bounds: Option<&Rect>, paint: Option<&Paint>) {
        self.saved.push(self.matrix);
        self.calls.push(CanvasCall::SaveLayer {
            bounds: bounds.copied(),
            paint: paint.cloned(),
        });
    }

    fn restore(&mut self) {
        if let Some(matrix) = self.saved.pop() {
            self.matrix = matrix;
        }
        self.calls.push(CanvasCall::Restore);
    }

    fn concat(&mut self, matrix: &Matrix) {
        self.matrix = self.matrix.concat(matrix);
        self.calls.push(CanvasCall::Concat(*matrix));
    }

    fn set_matrix(&mut self, matrix: &Matrix) {
        self.matrix = *matrix;
        self.calls.push(CanvasCall::SetMatrix(*matrix));
    }

    fn clip_rect(&mut self, rect: &Rect, op: ClipOp, anti_alias: bool) {
        self.calls.push(CanvasCall::ClipRect {
            rect: *rect,
            op,
            anti_alias,
        });
    }

    fn clip_path(&mut self, path: &Path, op: ClipOp, anti_alias: bool) {
        self.calls.push(CanvasCall::ClipPath {
            path: path.clone(),
            op,
            anti_alias,
        });
    }

    fn clear(&mut self, color: Color) {
        self.calls.push(CanvasCall::Clear(color));
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.push_draw(DrawCall::Paint, paint);
    }

    fn draw_rect(&mut self, rect: &Rect, paint: &Paint) {
        self.push_draw(DrawCall::Rect(*rect), paint);
    }

    fn draw_oval(&mut self, oval: &Rect, paint: &Paint) {
        self.push_draw(DrawCall::Oval(*oval), paint);
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        self.push_draw(DrawCall::Path(path.clone()), paint);
    }

    fn draw_points(&mut self, mode: PointMode, points: &[Point], paint: &Paint) {
        self.push_draw(DrawCall::Points(mode, points.to_vec()), paint);
    }

    fn draw_bitmap(&mut self, image: &Arc<RgbaImage>, left: f32, top: f32, paint: &Paint) {
        self.push_draw(
            DrawCall::Bitmap {
                image: Arc::clone(image),
                left,
                top,
            },
            paint,
        );
    }

    fn draw_bitmap_rect(
        &mut self,
        image: &Arc<RgbaImage>,
        src: Option<&Rect>,
        dst: &Rect,
        paint: &Paint,
    ) {
        self.push_draw(
            DrawCall::BitmapRect {
                image: Arc::clone(image),
                src: src.copied(),
                dst: *dst,
            },
            paint,
        );
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &Paint) {
        self.push_draw(
            DrawCall::Text {
                text: text.to_string(),
                x,
                y,
            },
            paint,
        );
    }

    fn draw_pos_text(&mut self, text: &str, positions: &[Point], paint: &Paint) {
        self.push_draw(
            DrawCall::PosText {
                text: text.to_string(),
                positions: positions.to_vec(),
            },
            paint,
        );
    }

    fn draw_vertices(&mut self, vertices: &Vertices, paint: &Paint) {
        self.push_draw(DrawCall::Vertices(vertices.clone()), paint);
    }

    fn flush(&mut self) {
        self.calls.push(CanvasCall::Flush);
    }
}
