//! Paint descriptor and its diff-record representation
//!
//! A [`Paint`] is the bag of style attributes that accompanies every draw
//! call. On the wire only the attributes that changed since the previous
//! draw are sent, as a list of [`PaintChange`] entries ("diff-record").

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::objects::{ColorFilter, MaskFilter, PathEffect, Shader, Typeface};

/// ARGB color packed as `0xAARRGGBB`
pub type Color = u32;

pub const COLOR_TRANSPARENT: Color = 0x0000_0000;
pub const COLOR_BLACK: Color = 0xFF00_0000;
pub const COLOR_WHITE: Color = 0xFFFF_FFFF;
pub const COLOR_RED: Color = 0xFFFF_0000;
pub const COLOR_GREEN: Color = 0xFF00_FF00;
pub const COLOR_BLUE: Color = 0xFF00_00FF;

/// Pack 8-bit channels into a [`Color`]
pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Color {
    ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// Paint flag bits
pub const FLAG_ANTI_ALIAS: u32 = 0x01;
pub const FLAG_DITHER: u32 = 0x02;
pub const FLAG_FAKE_BOLD: u32 = 0x04;
pub const FLAG_UNDERLINE: u32 = 0x08;
pub const FLAG_STRIKE_THRU: u32 = 0x10;
/// All flag bits the stream can carry
pub const PAINT_FLAGS_MASK: u32 = 0x1F;

wire_enum! {
    /// Geometry fill style
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum PaintStyle {
        #[default]
        Fill = 0,
        Stroke = 1,
        StrokeAndFill = 2,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum StrokeJoin {
        #[default]
        Miter = 0,
        Round = 1,
        Bevel = 2,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum StrokeCap {
        #[default]
        Butt = 0,
        Round = 1,
        Square = 2,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum TextAlign {
        #[default]
        Left = 0,
        Center = 1,
        Right = 2,
    }
}

wire_enum! {
    /// Porter-Duff and separable blend modes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum BlendMode {
        Clear = 0,
        Src = 1,
        Dst = 2,
        #[default]
        SrcOver = 3,
        DstOver = 4,
        SrcIn = 5,
        DstIn = 6,
        SrcOut = 7,
        DstOut = 8,
        Multiply = 9,
        Screen = 10,
    }
}

/// Style attributes for a draw call
///
/// Equality compares every attribute by value, including the shared
/// sub-objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub flags: u32,
    pub style: PaintStyle,
    pub stroke_width: f32,
    pub miter_limit: f32,
    pub join: StrokeJoin,
    pub cap: StrokeCap,
    pub blend_mode: BlendMode,
    pub text_size: f32,
    pub text_scale_x: f32,
    pub text_skew_x: f32,
    pub text_align: TextAlign,
    pub typeface: Option<Arc<Typeface>>,
    pub shader: Option<Arc<Shader>>,
    pub color_filter: Option<Arc<ColorFilter>>,
    pub path_effect: Option<Arc<PathEffect>>,
    pub mask_filter: Option<Arc<MaskFilter>>,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: COLOR_BLACK,
            flags: 0,
            style: PaintStyle::Fill,
            stroke_width: 0.0,
            miter_limit: 4.0,
            join: StrokeJoin::Miter,
            cap: StrokeCap::Butt,
            blend_mode: BlendMode::SrcOver,
            text_size: 12.0,
            text_scale_x: 1.0,
            text_skew_x: 0.0,
            text_align: TextAlign::Left,
            typeface: None,
            shader: None,
            color_filter: None,
            path_effect: None,
            mask_filter: None,
        }
    }
}

impl Paint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solid fill paint of the given color
    pub fn with_color(color: Color) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    pub fn is_anti_alias(&self) -> bool {
        self.flags & FLAG_ANTI_ALIAS != 0
    }

    pub fn set_anti_alias(&mut self, on: bool) {
        if on {
            self.flags |= FLAG_ANTI_ALIAS;
        } else {
            self.flags &= !FLAG_ANTI_ALIAS;
        }
    }

    /// Append the value-typed attributes of `self` that differ from `baseline`.
    ///
    /// Floats compare by bit pattern so that a NaN attribute is sent once and
    /// not on every draw. Shared sub-object references are not covered here;
    /// they are diffed by object-table index.
    pub fn diff_values(&self, baseline: &Paint, out: &mut Vec<PaintChange>) {
        if self.color != baseline.color {
            out.push(PaintChange::Color(self.color));
        }
        if self.flags & PAINT_FLAGS_MASK != baseline.flags & PAINT_FLAGS_MASK {
            out.push(PaintChange::Flags(self.flags & PAINT_FLAGS_MASK));
        }
        if self.style != baseline.style {
            out.push(PaintChange::Style(self.style));
        }
        if self.stroke_width.to_bits() != baseline.stroke_width.to_bits() {
            out.push(PaintChange::StrokeWidth(self.stroke_width));
        }
        if self.miter_limit.to_bits() != baseline.miter_limit.to_bits() {
            out.push(PaintChange::MiterLimit(self.miter_limit));
        }
        if self.join != baseline.join {
            out.push(PaintChange::Join(self.join));
        }
        if self.cap != baseline.cap {
            out.push(PaintChange::Cap(self.cap));
        }
        if self.blend_mode != baseline.blend_mode {
            out.push(PaintChange::BlendMode(self.blend_mode));
        }
        if self.text_size.to_bits() != baseline.text_size.to_bits() {
            out.push(PaintChange::TextSize(self.text_size));
        }
        if self.text_scale_x.to_bits() != baseline.text_scale_x.to_bits() {
            out.push(PaintChange::TextScaleX(self.text_scale_x));
        }
        if self.text_skew_x.to_bits() != baseline.text_skew_x.to_bits() {
            out.push(PaintChange::TextSkewX(self.text_skew_x));
        }
        if self.text_align != baseline.text_align {
            out.push(PaintChange::TextAlign(self.text_align));
        }
    }

    /// Copy the value-typed attributes of `other` into `self`
    pub fn copy_values_from(&mut self, other: &Paint) {
        self.color = other.color;
        self.flags = other.flags & PAINT_FLAGS_MASK;
        self.style = other.style;
        self.stroke_width = other.stroke_width;
        self.miter_limit = other.miter_limit;
        self.join = other.join;
        self.cap = other.cap;
        self.blend_mode = other.blend_mode;
        self.text_size = other.text_size;
        self.text_scale_x = other.text_scale_x;
        self.text_skew_x = other.text_skew_x;
        self.text_align = other.text_align;
    }
}

wire_enum! {
    /// Paint attribute named by a diff-record entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum PaintField {
        Color = 0,
        Flags = 1,
        Style = 2,
        StrokeWidth = 3,
        MiterLimit = 4,
        Join = 5,
        Cap = 6,
        BlendMode = 7,
        TextSize = 8,
        TextScaleX = 9,
        TextSkewX = 10,
        TextAlign = 11,
        Typeface = 12,
        Shader = 13,
        ColorFilter = 14,
        PathEffect = 15,
        MaskFilter = 16,
    }
}

impl PaintField {
    /// Whether the value travels in a payload word rather than inline
    pub fn has_payload(self) -> bool {
        matches!(
            self,
            PaintField::Color
                | PaintField::StrokeWidth
                | PaintField::MiterLimit
                | PaintField::TextSize
                | PaintField::TextScaleX
                | PaintField::TextSkewX
        )
    }
}

/// One entry of a diff-record
///
/// Reference variants carry an object-table index, `0` meaning "none".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaintChange {
    Color(Color),
    Flags(u32),
    Style(PaintStyle),
    StrokeWidth(f32),
    MiterLimit(f32),
    Join(StrokeJoin),
    Cap(StrokeCap),
    BlendMode(BlendMode),
    TextSize(f32),
    TextScaleX(f32),
    TextSkewX(f32),
    TextAlign(TextAlign),
    Typeface(u32),
    Shader(u32),
    ColorFilter(u32),
    PathEffect(u32),
    MaskFilter(u32),
}

impl PaintChange {
    pub fn field(&self) -> PaintField {
        match self {
            PaintChange::Color(_) => PaintField::Color,
            PaintChange::Flags(_) => PaintField::Flags,
            PaintChange::Style(_) => PaintField::Style,
            PaintChange::StrokeWidth(_) => PaintField::StrokeWidth,
            PaintChange::MiterLimit(_) => PaintField::MiterLimit,
            PaintChange::Join(_) => PaintField::Join,
            PaintChange::Cap(_) => PaintField::Cap,
            PaintChange::BlendMode(_) => PaintField::BlendMode,
            PaintChange::TextSize(_) => PaintField::TextSize,
            PaintChange::TextScaleX(_) => PaintField::TextScaleX,
            PaintChange::TextSkewX(_) => PaintField::TextSkewX,
            PaintChange::TextAlign(_) => PaintField::TextAlign,
            PaintChange::Typeface(_) => PaintField::Typeface,
            PaintChange::Shader(_) => PaintField::Shader,
            PaintChange::ColorFilter(_) => PaintField::ColorFilter,
            PaintChange::PathEffect(_) => PaintField::PathEffect,
            PaintChange::MaskFilter(_) => PaintField::MaskFilter,
        }
    }

    /// Value carried in the 20-bit data field of the entry word
    pub fn inline_data(&self) -> u32 {
        match *self {
            PaintChange::Flags(flags) => flags & PAINT_FLAGS_MASK,
            PaintChange::Style(v) => v.to_wire(),
            PaintChange::Join(v) => v.to_wire(),
            PaintChange::Cap(v) => v.to_wire(),
            PaintChange::BlendMode(v) => v.to_wire(),
            PaintChange::TextAlign(v) => v.to_wire(),
            PaintChange::Typeface(i)
            | PaintChange::Shader(i)
            | PaintChange::ColorFilter(i)
            | PaintChange::PathEffect(i)
            | PaintChange::MaskFilter(i) => i,
            _ => 0,
        }
    }

    /// Value carried in the payload word, if any
    pub fn payload(&self) -> Option<u32> {
        match *self {
            PaintChange::Color(c) => Some(c),
            PaintChange::StrokeWidth(v)
            | PaintChange::MiterLimit(v)
            | PaintChange::TextSize(v)
            | PaintChange::TextScaleX(v)
            | PaintChange::TextSkewX(v) => Some(v.to_bits()),
            _ => None,
        }
    }
}
