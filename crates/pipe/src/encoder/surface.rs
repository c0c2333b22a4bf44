//! [`Canvas`] implementation of the encoder

use std::sync::Arc;

use image::RgbaImage;
use tracing::warn;

use super::{payload_fits, Encoder};
use crate::canvas::Canvas;
use crate::constants::{NULL_INDEX, POINT_BYTES, WORD_SIZE};
use crate::opcode::{
    Op, BITMAP_RECT_HAS_SRC, CLIP_ANTI_ALIAS, SAVE_LAYER_HAS_BOUNDS, SAVE_LAYER_HAS_PAINT,
    VERTICES_HAS_COLORS, VERTICES_HAS_INDICES, VERTICES_HAS_TEX_COORDS,
};
use crate::paint::{Color, Paint};
use crate::transport::BlockTransport;
use crate::types::{ClipOp, Matrix, Path, Point, PointMode, Rect, Vertices};

fn clip_flags(anti_alias: bool) -> u32 {
    if anti_alias { CLIP_ANTI_ALIAS } else { 0 }
}

impl<T: BlockTransport> Canvas for Encoder<T> {
    fn save(&mut self) {
        self.record(Op::Save, 0, 0, |_| {});
    }

    fn save_layer(&mut self, bounds: Option<&Rect>, paint: Option<&Paint>) {
        let mut flags = 0;
        if bounds.is_some() {
            flags |= SAVE_LAYER_HAS_BOUNDS;
        }
        if let Some(paint) = paint {
            self.sync_paint(paint);
            flags |= SAVE_LAYER_HAS_PAINT;
        }
        self.record(Op::SaveLayer, flags, 0, |w| {
            if let Some(bounds) = bounds {
                w.write_rect(bounds);
            }
        });
    }

    fn restore(&mut self) {
        self.record(Op::Restore, 0, 0, |_| {});
    }

    fn concat(&mut self, matrix: &Matrix) {
        self.record(Op::Concat, 0, 0, |w| w.write_matrix(matrix));
    }

    fn set_matrix(&mut self, matrix: &Matrix) {
        self.record(Op::SetMatrix, 0, 0, |w| w.write_matrix(matrix));
    }

    fn clip_rect(&mut self, rect: &Rect, op: ClipOp, anti_alias: bool) {
        self.record(Op::ClipRect, clip_flags(anti_alias), op.to_wire(), |w| {
            w.write_rect(rect)
        });
    }

    fn clip_path(&mut self, path: &Path, op: ClipOp, anti_alias: bool) {
        if !payload_fits(Op::ClipPath, path.verbs.len(), WORD_SIZE) {
            return;
        }
        self.record(Op::ClipPath, clip_flags(anti_alias), op.to_wire(), |w| {
            w.write_path(path)
        });
    }

    fn clear(&mut self, color: Color) {
        self.record(Op::Clear, 0, 0, |w| w.write_u32(color));
    }

    fn draw_paint(&mut self, paint: &Paint) {
        self.sync_paint(paint);
        self.record(Op::DrawPaint, 0, 0, |_| {});
    }

    fn draw_rect(&mut self, rect: &Rect, paint: &Paint) {
        self.sync_paint(paint);
        self.record(Op::DrawRect, 0, 0, |w| w.write_rect(rect));
    }

    fn draw_oval(&mut self, oval: &Rect, paint: &Paint) {
        self.sync_paint(paint);
        self.record(Op::DrawOval, 0, 0, |w| w.write_rect(oval));
    }

    fn draw_path(&mut self, path: &Path, paint: &Paint) {
        if !payload_fits(Op::DrawPath, path.verbs.len(), WORD_SIZE) {
            return;
        }
        self.sync_paint(paint);
        self.record(Op::DrawPath, 0, 0, |w| w.write_path(path));
    }

    fn draw_points(&mut self, mode: PointMode, points: &[Point], paint: &Paint) {
        if !payload_fits(Op::DrawPoints, points.len(), POINT_BYTES) {
            return;
        }
        self.sync_paint(paint);
        self.record(Op::DrawPoints, 0, mode.to_wire(), |w| {
            w.write_u32(points.len() as u32);
            w.write_points(points);
        });
    }

    fn draw_bitmap(&mut self, image: &Arc<RgbaImage>, left: f32, top: f32, paint: &Paint) {
        self.sync_paint(paint);
        let index = self.bitmap_index(image);
        if index == NULL_INDEX {
            return;
        }
        self.record(Op::DrawBitmap, 0, index, |w| {
            w.write_f32(left);
            w.write_f32(top);
        });
    }

    fn draw_bitmap_rect(
        &mut self,
        image: &Arc<RgbaImage>,
        src: Option<&Rect>,
        dst: &Rect,
        paint: &Paint,
    ) {
        self.sync_paint(paint);
        let index = self.bitmap_index(image);
        if index == NULL_INDEX {
            return;
        }
        let flags = if src.is_some() { BITMAP_RECT_HAS_SRC } else { 0 };
        self.record(Op::DrawBitmapRect, flags, index, |w| {
            if let Some(src) = src {
                w.write_rect(src);
            }
            w.write_rect(dst);
        });
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &Paint) {
        if !payload_fits(Op::DrawText, text.len(), 1) {
            return;
        }
        self.sync_paint(paint);
        self.record(Op::DrawText, 0, 0, |w| {
            w.write_str(text);
            w.write_f32(x);
            w.write_f32(y);
        });
    }

    fn draw_pos_text(&mut self, text: &str, positions: &[Point], paint: &Paint) {
        if !payload_fits(Op::DrawPosText, text.len(), 1)
            || !payload_fits(Op::DrawPosText, positions.len(), POINT_BYTES)
        {
            return;
        }
        self.sync_paint(paint);
        self.record(Op::DrawPosText, 0, 0, |w| {
            w.write_str(text);
            w.write_u32(positions.len() as u32);
            w.write_points(positions);
        });
    }

    fn draw_vertices(&mut self, vertices: &Vertices, paint: &Paint) {
        let count = vertices.positions.len();
        let tex_ok = vertices.tex_coords.as_ref().is_none_or(|t| t.len() == count);
        let colors_ok = vertices.colors.as_ref().is_none_or(|c| c.len() == count);
        if !tex_ok || !colors_ok {
            warn!(count, "Vertex attribute count mismatch, draw elided");
            return;
        }
        let index_count = vertices.indices.as_ref().map_or(0, Vec::len);
        if !payload_fits(Op::DrawVertices, count, POINT_BYTES)
            || !payload_fits(Op::DrawVertices, index_count, 2)
        {
            return;
        }

        let mut flags = 0;
        if vertices.tex_coords.is_some() {
            flags |= VERTICES_HAS_TEX_COORDS;
        }
        if vertices.colors.is_some() {
            flags |= VERTICES_HAS_COLORS;
        }
        if vertices.indices.is_some() {
            flags |= VERTICES_HAS_INDICES;
        }

        self.sync_paint(paint);
        self.record(Op::DrawVertices, flags, vertices.mode.to_wire(), |w| {
            w.write_u32(count as u32);
            w.write_points(&vertices.positions);
            if let Some(tex_coords) = &vertices.tex_coords {
                w.write_points(tex_coords);
            }
            if let Some(colors) = &vertices.colors {
                for color in colors {
                    w.write_u32(*color);
                }
            }
            if let Some(indices) = &vertices.indices {
                w.write_u16s(indices);
            }
        });
    }

    /// Emit a flush opcode and hand the current block to the transport
    fn flush(&mut self) {
        self.record(Op::Flush, 0, 0, |_| {});
        self.hand_off();
    }
}
