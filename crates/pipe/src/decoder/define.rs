//! Object, typeface and bitmap definitions

use std::sync::Arc;

use image::RgbaImage;
use tracing::trace;

use crate::canvas::Canvas;
use crate::codec::{ReadResult, WordReader};
use crate::error::DecodeError;
use crate::objects::{FontSlant, ObjectKind, Typeface};
use crate::opcode::{BITMAP_FROM_HEAP, DEFINE_FLATTENED};

use super::Decoder;
use super::dispatch::decode_enum;

impl<C: Canvas> Decoder<C> {
    /// Whether a define carries flattened data, checked against the session
    fn flattened(&self, flags: u32) -> Result<bool, DecodeError> {
        let flattened = flags & DEFINE_FLATTENED != 0;
        if flattened != self.flags.cross_process {
            return Err(DecodeError::ModeMismatch(flattened));
        }
        Ok(flattened)
    }

    pub(super) fn define_object(
        &mut self,
        r: &mut WordReader<'_>,
        flags: u32,
        index: u32,
    ) -> ReadResult<()> {
        self.objects.check_define(index)?;
        let flattened = self.flattened(flags)?;
        let kind = decode_enum(ObjectKind::from_wire, "object kind", r.read_u32()?)?;

        let object = if flattened {
            let name = r.read_string()?;
            let data = r.read_bytes()?;
            self.factories.build(&name, data)?
        } else {
            let slot = r.read_u32()?;
            let handles = self.handles.as_ref().ok_or(DecodeError::NoHandleRegistry)?;
            handles.object(slot).ok_or(DecodeError::UnknownHandle(slot))?
        };
        if object.kind() != kind {
            return Err(DecodeError::KindMismatch {
                index,
                expected: kind.name(),
                found: object.kind().name(),
            }
            .into());
        }

        trace!(index, kind = kind.name(), "Defined object");
        self.objects.define(index, object)?;
        Ok(())
    }

    pub(super) fn define_typeface(
        &mut self,
        r: &mut WordReader<'_>,
        flags: u32,
        index: u32,
    ) -> ReadResult<()> {
        self.typefaces.check_define(index)?;

        let typeface = if self.flattened(flags)? {
            let family = r.read_string()?;
            let weight = r.read_u32()?;
            let slant = r.read_u32()?;
            let weight = u16::try_from(weight).map_err(|_| DecodeError::InvalidEnum {
                kind: "font weight",
                value: weight,
            })?;
            let slant = decode_enum(FontSlant::from_wire, "font slant", slant)?;
            Arc::new(Typeface {
                family,
                weight,
                slant,
            })
        } else {
            let slot = r.read_u32()?;
            let handles = self.handles.as_ref().ok_or(DecodeError::NoHandleRegistry)?;
            handles.typeface(slot).ok_or(DecodeError::UnknownHandle(slot))?
        };

        trace!(index, family = %typeface.family, "Defined typeface");
        self.typefaces.define(index, typeface)?;
        Ok(())
    }

    pub(super) fn define_bitmap(
        &mut self,
        r: &mut WordReader<'_>,
        flags: u32,
        index: u32,
    ) -> ReadResult<()> {
        self.bitmaps.check_define(index)?;

        let image = if flags & BITMAP_FROM_HEAP != 0 {
            let heap_index = r.read_u32()?;
            let heap = self.heap.as_mut().ok_or(DecodeError::NoHeap)?;
            heap.fetch(heap_index)
                .ok_or(DecodeError::HeapIndexMissing(heap_index))?
        } else {
            let width = r.read_u32()?;
            let height = r.read_u32()?;
            let pixels = r.read_bytes()?;
            let size_error = DecodeError::BitmapSize {
                width,
                height,
                len: pixels.len(),
            };
            if u64::from(width) * u64::from(height) * 4 != pixels.len() as u64 {
                return Err(size_error.into());
            }
            let image = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or(size_error)?;
            Arc::new(image)
        };

        trace!(index, width = image.width(), height = image.height(), "Defined bitmap");
        self.bitmaps.define(index, image)?;
        Ok(())
    }
}
