//! Paint diffing and object definitions

use std::sync::Arc;

use image::RgbaImage;
use tracing::{trace, warn};

use super::{payload_fits, Encoder};
use crate::codec::WordWriter;
use crate::constants::NULL_INDEX;
use crate::objects::{PaintObject, Typeface};
use crate::opcode::{pack, Op, BITMAP_FROM_HEAP, DEFINE_FLATTENED, PAINT_CHANGE_LAST};
use crate::paint::{Paint, PaintChange};
use crate::transport::BlockTransport;

/// Object-table indices of the references a paint holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct PaintRefs {
    typeface: u32,
    shader: u32,
    color_filter: u32,
    path_effect: u32,
    mask_filter: u32,
}

impl PaintRefs {
    fn diff(&self, baseline: &PaintRefs, out: &mut Vec<PaintChange>) {
        if self.typeface != baseline.typeface {
            out.push(PaintChange::Typeface(self.typeface));
        }
        if self.shader != baseline.shader {
            out.push(PaintChange::Shader(self.shader));
        }
        if self.color_filter != baseline.color_filter {
            out.push(PaintChange::ColorFilter(self.color_filter));
        }
        if self.path_effect != baseline.path_effect {
            out.push(PaintChange::PathEffect(self.path_effect));
        }
        if self.mask_filter != baseline.mask_filter {
            out.push(PaintChange::MaskFilter(self.mask_filter));
        }
    }
}

/// Entry words of a diff-record, the last one flagged
fn write_changes(writer: &mut WordWriter, changes: &[PaintChange]) {
    let last = changes.len().saturating_sub(1);
    for (i, change) in changes.iter().enumerate() {
        let flags = if i == last { PAINT_CHANGE_LAST } else { 0 };
        writer.write_u32(pack(change.field() as u8, flags, change.inline_data()));
        if let Some(payload) = change.payload() {
            writer.write_u32(payload);
        }
    }
}

impl<T: BlockTransport> Encoder<T> {
    /// Bring the decoder's paint in line with `paint`
    ///
    /// Defines any referenced object first, then emits one paint update
    /// holding only the attributes that differ from the baseline.
    pub(super) fn sync_paint(&mut self, paint: &Paint) {
        if !self.is_active() {
            return;
        }
        let refs = PaintRefs {
            typeface: paint
                .typeface
                .as_ref()
                .map_or(NULL_INDEX, |t| self.typeface_index(t)),
            shader: paint.shader.as_ref().map_or(NULL_INDEX, |s| {
                self.object_index(PaintObject::Shader(Arc::clone(s)))
            }),
            color_filter: paint.color_filter.as_ref().map_or(NULL_INDEX, |f| {
                self.object_index(PaintObject::ColorFilter(Arc::clone(f)))
            }),
            path_effect: paint.path_effect.as_ref().map_or(NULL_INDEX, |e| {
                self.object_index(PaintObject::PathEffect(Arc::clone(e)))
            }),
            mask_filter: paint.mask_filter.as_ref().map_or(NULL_INDEX, |m| {
                self.object_index(PaintObject::MaskFilter(Arc::clone(m)))
            }),
        };

        let mut changes = Vec::new();
        paint.diff_values(&self.baseline, &mut changes);
        refs.diff(&self.baseline_refs, &mut changes);
        if changes.is_empty() {
            return;
        }
        if self.record(Op::PaintUpdate, 0, 0, |w| write_changes(w, &changes)) {
            trace!(entries = changes.len(), "Paint update");
            self.baseline.copy_values_from(paint);
            self.baseline_refs = refs;
        }
    }

    /// Index of `object`, defining it on first use; 0 if elided
    pub(super) fn object_index(&mut self, object: PaintObject) -> u32 {
        let identity = object.identity();
        if let Some(index) = self.objects.get(identity) {
            return index;
        }
        let kind = object.kind();
        let Some(index) = self.objects.next_index() else {
            warn!(kind = kind.name(), "Object table is full, reference elided");
            return NULL_INDEX;
        };

        let defined = if self.flags.cross_process {
            let Some(flat) = object.flatten() else {
                warn!(
                    kind = kind.name(),
                    "Object has no cross-process form, reference elided"
                );
                return NULL_INDEX;
            };
            if !payload_fits(Op::DefineObject, flat.name.len(), 1)
                || !payload_fits(Op::DefineObject, flat.data.len(), 1)
            {
                return NULL_INDEX;
            }
            self.record(Op::DefineObject, DEFINE_FLATTENED, index, |w| {
                w.write_u32(kind.to_wire());
                w.write_str(&flat.name);
                w.write_bytes(&flat.data);
            })
        } else {
            let Some(handles) = &self.handles else {
                warn!(kind = kind.name(), "No handle registry, reference elided");
                return NULL_INDEX;
            };
            let slot = handles.register_object(&object);
            self.record(Op::DefineObject, 0, index, |w| {
                w.write_u32(kind.to_wire());
                w.write_u32(slot);
            })
        };
        if !defined {
            return NULL_INDEX;
        }
        trace!(index, kind = kind.name(), "Defined object");
        self.objects.insert(identity, object)
    }

    /// Index of `typeface`, defining it on first use; 0 if elided
    pub(super) fn typeface_index(&mut self, typeface: &Arc<Typeface>) -> u32 {
        let identity = Arc::as_ptr(typeface) as usize;
        if let Some(index) = self.typefaces.get(identity) {
            return index;
        }
        let Some(index) = self.typefaces.next_index() else {
            warn!(family = %typeface.family, "Typeface table is full, reference elided");
            return NULL_INDEX;
        };

        let defined = if self.flags.cross_process {
            if !payload_fits(Op::DefineTypeface, typeface.family.len(), 1) {
                return NULL_INDEX;
            }
            self.record(Op::DefineTypeface, DEFINE_FLATTENED, index, |w| {
                w.write_str(&typeface.family);
                w.write_u32(u32::from(typeface.weight));
                w.write_u32(typeface.slant.to_wire());
            })
        } else {
            let Some(handles) = &self.handles else {
                warn!(family = %typeface.family, "No handle registry, reference elided");
                return NULL_INDEX;
            };
            let slot = handles.register_typeface(typeface);
            self.record(Op::DefineTypeface, 0, index, |w| w.write_u32(slot))
        };
        if !defined {
            return NULL_INDEX;
        }
        trace!(index, family = %typeface.family, "Defined typeface");
        self.typefaces.insert(identity, Arc::clone(typeface))
    }

    /// Index of `image`, defining it on first use; 0 if elided
    pub(super) fn bitmap_index(&mut self, image: &Arc<RgbaImage>) -> u32 {
        let identity = Arc::as_ptr(image) as usize;
        if let Some(index) = self.bitmaps.get(identity) {
            return index;
        }
        let Some(index) = self.bitmaps.next_index() else {
            warn!("Bitmap table is full, draw elided");
            return NULL_INDEX;
        };

        let defined = if let Some(heap) = &self.heap {
            let heap_index = heap.insert(image);
            self.record(Op::DefineBitmap, BITMAP_FROM_HEAP, index, |w| {
                w.write_u32(heap_index)
            })
        } else {
            let pixels = image.as_raw();
            if !payload_fits(Op::DefineBitmap, pixels.len(), 1) {
                return NULL_INDEX;
            }
            self.record(Op::DefineBitmap, 0, index, |w| {
                w.write_u32(image.width());
                w.write_u32(image.height());
                w.write_bytes(pixels);
            })
        };
        if !defined {
            return NULL_INDEX;
        }
        trace!(index, "Defined bitmap");
        self.bitmaps.insert(identity, Arc::clone(image))
    }
}
