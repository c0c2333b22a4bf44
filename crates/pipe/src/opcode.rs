//! Opcode set and opcode word packing
//!
//! Every stream entry starts with one 32-bit word:
//!
//! ```text
//!  31      24 23  20 19                 0
//! +----------+------+--------------------+
//! |    op    | flags|   inline data      |
//! +----------+------+--------------------+
//! ```
//!
//! Packing always goes through shifts and masks, never a bitfield layout.

use crate::constants::{FLAGS_MASK, FLAGS_SHIFT, MAX_INLINE_DATA, OP_SHIFT};

wire_enum! {
    /// Every operation the stream can carry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Op {
        /// Terminal op, ends the session
        Done = 0,

        Save = 1,
        SaveLayer = 2,
        Restore = 3,
        Concat = 4,
        SetMatrix = 5,
        ClipRect = 6,
        ClipPath = 7,

        DrawPaint = 16,
        Clear = 17,
        DrawRect = 18,
        DrawOval = 19,
        DrawPath = 20,
        DrawPoints = 21,
        DrawBitmap = 22,
        DrawBitmapRect = 23,
        DrawText = 24,
        DrawPosText = 25,
        DrawVertices = 26,

        /// Diff-record against the decoder's current paint follows
        PaintUpdate = 32,

        DefineObject = 48,
        DefineTypeface = 49,
        DefineBitmap = 50,

        Flush = 64,
    }
}

impl Op {
    /// Whether this op ends a single step in atomic playback
    ///
    /// Paint updates and definitions only prepare state for the next
    /// surface call and are stepped over transparently.
    pub fn is_surface_affecting(self) -> bool {
        !matches!(
            self,
            Op::PaintUpdate | Op::DefineObject | Op::DefineTypeface | Op::DefineBitmap
        )
    }
}

// Flags for SaveLayer
pub const SAVE_LAYER_HAS_BOUNDS: u32 = 0x1;
pub const SAVE_LAYER_HAS_PAINT: u32 = 0x2;

// Flags for ClipRect / ClipPath
pub const CLIP_ANTI_ALIAS: u32 = 0x1;

// Flags for DrawBitmapRect
pub const BITMAP_RECT_HAS_SRC: u32 = 0x1;

// Flags for DrawVertices
pub const VERTICES_HAS_TEX_COORDS: u32 = 0x1;
pub const VERTICES_HAS_COLORS: u32 = 0x2;
pub const VERTICES_HAS_INDICES: u32 = 0x4;

// Flags for DefineBitmap
pub const BITMAP_FROM_HEAP: u32 = 0x1;

// Flags for DefineObject / DefineTypeface
pub const DEFINE_FLATTENED: u32 = 0x1;

// Flags for diff-record entries
pub const PAINT_CHANGE_LAST: u32 = 0x1;

/// Pack an operation byte, flags and inline data into one word
#[inline]
pub fn pack(op: u8, flags: u32, data: u32) -> u32 {
    debug_assert!(flags <= FLAGS_MASK, "flags {flags:#x} exceed 4 bits");
    debug_assert!(data <= MAX_INLINE_DATA, "data {data:#x} exceeds 20 bits");
    ((op as u32) << OP_SHIFT) | ((flags & FLAGS_MASK) << FLAGS_SHIFT) | (data & MAX_INLINE_DATA)
}

/// Pack an [`Op`] word
#[inline]
pub fn pack_op(op: Op, flags: u32, data: u32) -> u32 {
    pack(op as u8, flags, data)
}

/// Operation byte of a word
#[inline]
pub fn unpack_op(word: u32) -> u8 {
    (word >> OP_SHIFT) as u8
}

/// Flags of a word
#[inline]
pub fn unpack_flags(word: u32) -> u32 {
    (word >> FLAGS_SHIFT) & FLAGS_MASK
}

/// Inline data of a word
#[inline]
pub fn unpack_data(word: u32) -> u32 {
    word & MAX_INLINE_DATA
}

/// Check whether a value fits the inline data field
#[inline]
pub fn fits_inline(value: u32) -> bool {
    value <= MAX_INLINE_DATA
}
