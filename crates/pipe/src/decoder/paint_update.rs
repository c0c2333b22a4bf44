//! Paint update handling

use std::sync::Arc;

use crate::canvas::Canvas;
use crate::codec::{ReadResult, WordReader};
use crate::error::DecodeError;
use crate::objects::{ObjectKind, PaintObject};
use crate::opcode::{unpack_data, unpack_flags, unpack_op, PAINT_CHANGE_LAST};
use crate::paint::{
    BlendMode, Paint, PaintChange, PaintField, PaintStyle, StrokeCap, StrokeJoin, TextAlign,
    PAINT_FLAGS_MASK,
};

use super::Decoder;
use super::dispatch::decode_enum;

/// One entry per attribute is the most an encoder ever sends
const MAX_PAINT_ENTRIES: usize = 17;

fn decode_change(field: PaintField, data: u32, payload: u32) -> Result<PaintChange, DecodeError> {
    Ok(match field {
        PaintField::Color => PaintChange::Color(payload),
        PaintField::Flags => PaintChange::Flags(data & PAINT_FLAGS_MASK),
        PaintField::Style => {
            PaintChange::Style(decode_enum(PaintStyle::from_wire, "paint style", data)?)
        }
        PaintField::StrokeWidth => PaintChange::StrokeWidth(f32::from_bits(payload)),
        PaintField::MiterLimit => PaintChange::MiterLimit(f32::from_bits(payload)),
        PaintField::Join => {
            PaintChange::Join(decode_enum(StrokeJoin::from_wire, "stroke join", data)?)
        }
        PaintField::Cap => {
            PaintChange::Cap(decode_enum(StrokeCap::from_wire, "stroke cap", data)?)
        }
        PaintField::BlendMode => {
            PaintChange::BlendMode(decode_enum(BlendMode::from_wire, "blend mode", data)?)
        }
        PaintField::TextSize => PaintChange::TextSize(f32::from_bits(payload)),
        PaintField::TextScaleX => PaintChange::TextScaleX(f32::from_bits(payload)),
        PaintField::TextSkewX => PaintChange::TextSkewX(f32::from_bits(payload)),
        PaintField::TextAlign => {
            PaintChange::TextAlign(decode_enum(TextAlign::from_wire, "text align", data)?)
        }
        PaintField::Typeface => PaintChange::Typeface(data),
        PaintField::Shader => PaintChange::Shader(data),
        PaintField::ColorFilter => PaintChange::ColorFilter(data),
        PaintField::PathEffect => PaintChange::PathEffect(data),
        PaintField::MaskFilter => PaintChange::MaskFilter(data),
    })
}

impl<C: Canvas> Decoder<C> {
    /// Read a whole diff-record, then apply it to the current paint
    pub(super) fn paint_update(&mut self, r: &mut WordReader<'_>) -> ReadResult<()> {
        let mut changes = Vec::new();
        loop {
            let word = r.read_u32()?;
            let raw = unpack_op(word);
            let field = PaintField::from_wire(u32::from(raw))
                .ok_or(DecodeError::UnknownPaintField(raw))?;
            let payload = if field.has_payload() { r.read_u32()? } else { 0 };
            changes.push(decode_change(field, unpack_data(word), payload)?);
            if unpack_flags(word) & PAINT_CHANGE_LAST != 0 {
                break;
            }
            if changes.len() >= MAX_PAINT_ENTRIES {
                return Err(DecodeError::LengthOverflow(changes.len() as u64 + 1).into());
            }
        }

        let mut paint = self.paint.clone();
        for change in changes {
            self.apply_change(&mut paint, change)?;
        }
        self.paint = paint;
        Ok(())
    }

    fn apply_change(&self, paint: &mut Paint, change: PaintChange) -> Result<(), DecodeError> {
        match change {
            PaintChange::Color(color) => paint.color = color,
            PaintChange::Flags(flags) => paint.flags = flags,
            PaintChange::Style(style) => paint.style = style,
            PaintChange::StrokeWidth(width) => paint.stroke_width = width,
            PaintChange::MiterLimit(limit) => paint.miter_limit = limit,
            PaintChange::Join(join) => paint.join = join,
            PaintChange::Cap(cap) => paint.cap = cap,
            PaintChange::BlendMode(mode) => paint.blend_mode = mode,
            PaintChange::TextSize(size) => paint.text_size = size,
            PaintChange::TextScaleX(scale) => paint.text_scale_x = scale,
            PaintChange::TextSkewX(skew) => paint.text_skew_x = skew,
            PaintChange::TextAlign(align) => paint.text_align = align,
            PaintChange::Typeface(index) => {
                paint.typeface = self.typefaces.get_optional(index)?.cloned();
            }
            PaintChange::Shader(index) => {
                paint.shader = self.object_ref(index, ObjectKind::Shader, PaintObject::as_shader)?;
            }
            PaintChange::ColorFilter(index) => {
                paint.color_filter =
                    self.object_ref(index, ObjectKind::ColorFilter, PaintObject::as_color_filter)?;
            }
            PaintChange::PathEffect(index) => {
                paint.path_effect =
                    self.object_ref(index, ObjectKind::PathEffect, PaintObject::as_path_effect)?;
            }
            PaintChange::MaskFilter(index) => {
                paint.mask_filter =
                    self.object_ref(index, ObjectKind::MaskFilter, PaintObject::as_mask_filter)?;
            }
        }
        Ok(())
    }

    /// Resolve an object reference of the expected kind, index 0 being none
    fn object_ref<T>(
        &self,
        index: u32,
        kind: ObjectKind,
        extract: impl Fn(&PaintObject) -> Option<&Arc<T>>,
    ) -> Result<Option<Arc<T>>, DecodeError> {
        let Some(object) = self.objects.get_optional(index)? else {
            return Ok(None);
        };
        match extract(object) {
            Some(value) => Ok(Some(Arc::clone(value))),
            None => Err(DecodeError::KindMismatch {
                index,
                expected: kind.name(),
                found: object.kind().name(),
            }),
        }
    }
}
