//! Opcode dispatch
//!
//! Each handler reads every field of its opcode before touching the canvas
//! or session state, so an opcode cut short by the end of a chunk leaves no
//! trace and can be replayed in full on the next call.

use crate::canvas::Canvas;
use crate::codec::{ReadResult, WordReader};
use crate::constants::POINT_BYTES;
use crate::error::DecodeError;
use crate::opcode::{
    unpack_data, unpack_flags, unpack_op, Op, BITMAP_RECT_HAS_SRC, CLIP_ANTI_ALIAS,
    SAVE_LAYER_HAS_BOUNDS, SAVE_LAYER_HAS_PAINT, VERTICES_HAS_COLORS, VERTICES_HAS_INDICES,
    VERTICES_HAS_TEX_COORDS,
};
use crate::types::{ClipOp, PointMode, VertexMode, Vertices};

use super::Decoder;

/// Decode a wire enum or report which kind was out of range
pub(super) fn decode_enum<E>(
    from_wire: fn(u32) -> Option<E>,
    kind: &'static str,
    value: u32,
) -> Result<E, DecodeError> {
    from_wire(value).ok_or(DecodeError::InvalidEnum { kind, value })
}

impl<C: Canvas> Decoder<C> {
    /// Read and apply one opcode
    pub(super) fn step(&mut self, r: &mut WordReader<'_>) -> ReadResult<Op> {
        let word = r.read_u32()?;
        let raw = unpack_op(word);
        let op = Op::from_wire(u32::from(raw)).ok_or(DecodeError::UnknownOp(raw))?;
        let flags = unpack_flags(word);
        let data = unpack_data(word);

        match op {
            Op::Done => {}
            Op::Save => self.canvas.save(),
            Op::SaveLayer => {
                let bounds = if flags & SAVE_LAYER_HAS_BOUNDS != 0 {
                    Some(r.read_rect()?)
                } else {
                    None
                };
                let paint = (flags & SAVE_LAYER_HAS_PAINT != 0).then_some(&self.paint);
                self.canvas.save_layer(bounds.as_ref(), paint);
            }
            Op::Restore => self.canvas.restore(),
            Op::Concat => {
                let matrix = r.read_matrix()?;
                self.canvas.concat(&matrix);
            }
            Op::SetMatrix => {
                let matrix = r.read_matrix()?;
                self.canvas.set_matrix(&self.offset.concat(&matrix));
            }
            Op::ClipRect => {
                let clip = decode_enum(ClipOp::from_wire, "clip op", data)?;
                let rect = r.read_rect()?;
                self.canvas
                    .clip_rect(&rect, clip, flags & CLIP_ANTI_ALIAS != 0);
            }
            Op::ClipPath => {
                let clip = decode_enum(ClipOp::from_wire, "clip op", data)?;
                let path = r.read_path()?;
                self.canvas
                    .clip_path(&path, clip, flags & CLIP_ANTI_ALIAS != 0);
            }
            Op::DrawPaint => self.canvas.draw_paint(&self.paint),
            Op::Clear => {
                let color = r.read_u32()?;
                self.canvas.clear(color);
            }
            Op::DrawRect => {
                let rect = r.read_rect()?;
                self.canvas.draw_rect(&rect, &self.paint);
            }
            Op::DrawOval => {
                let oval = r.read_rect()?;
                self.canvas.draw_oval(&oval, &self.paint);
            }
            Op::DrawPath => {
                let path = r.read_path()?;
                self.canvas.draw_path(&path, &self.paint);
            }
            Op::DrawPoints => {
                let mode = decode_enum(PointMode::from_wire, "point mode", data)?;
                let count = r.read_count(POINT_BYTES)?;
                let points = r.read_points(count)?;
                self.canvas.draw_points(mode, &points, &self.paint);
            }
            Op::DrawBitmap => {
                let image = self.bitmaps.get(data)?.clone();
                let left = r.read_f32()?;
                let top = r.read_f32()?;
                self.canvas.draw_bitmap(&image, left, top, &self.paint);
            }
            Op::DrawBitmapRect => {
                let image = self.bitmaps.get(data)?.clone();
                let src = if flags & BITMAP_RECT_HAS_SRC != 0 {
                    Some(r.read_rect()?)
                } else {
                    None
                };
                let dst = r.read_rect()?;
                self.canvas
                    .draw_bitmap_rect(&image, src.as_ref(), &dst, &self.paint);
            }
            Op::DrawText => {
                let text = r.read_string()?;
                let x = r.read_f32()?;
                let y = r.read_f32()?;
                self.canvas.draw_text(&text, x, y, &self.paint);
            }
            Op::DrawPosText => {
                let text = r.read_string()?;
                let count = r.read_count(POINT_BYTES)?;
                let positions = r.read_points(count)?;
                self.canvas.draw_pos_text(&text, &positions, &self.paint);
            }
            Op::DrawVertices => {
                let vertices = read_vertices(r, flags, data)?;
                self.canvas.draw_vertices(&vertices, &self.paint);
            }
            Op::PaintUpdate => self.paint_update(r)?,
            Op::DefineObject => self.define_object(r, flags, data)?,
            Op::DefineTypeface => self.define_typeface(r, flags, data)?,
            Op::DefineBitmap => self.define_bitmap(r, flags, data)?,
            Op::Flush => self.canvas.flush(),
        }
        Ok(op)
    }
}

fn read_vertices(r: &mut WordReader<'_>, flags: u32, data: u32) -> ReadResult<Vertices> {
    let mode = decode_enum(VertexMode::from_wire, "vertex mode", data)?;
    let count = r.read_count(POINT_BYTES)?;
    let positions = r.read_points(count)?;
    let tex_coords = if flags & VERTICES_HAS_TEX_COORDS != 0 {
        Some(r.read_points(count)?)
    } else {
        None
    };
    let colors = if flags & VERTICES_HAS_COLORS != 0 {
        Some(r.read_u32s(count)?)
    } else {
        None
    };
    let indices = if flags & VERTICES_HAS_INDICES != 0 {
        Some(r.read_u16s()?)
    } else {
        None
    };
    Ok(Vertices {
        mode,
        positions,
        tex_coords,
        colors,
        indices,
    })
}
