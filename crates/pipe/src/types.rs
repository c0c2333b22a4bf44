//! Geometry value types carried by the stream

use glam::{Affine2, Vec2};
use serde::{Deserialize, Serialize};

/// A point in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Vec2> for Point {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

impl From<Point> for Vec2 {
    fn from(p: Point) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// Axis-aligned rectangle stored as edges
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rect from origin and size
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// True if the rect encloses no area
    pub fn is_empty(&self) -> bool {
        !(self.left < self.right && self.top < self.bottom)
    }

    /// Return a copy shifted by (dx, dy)
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }
}

/// 2D affine transform in row-major `[sx kx tx; ky sy ty]` order
///
/// Wire layout is six consecutive f32 values in field order. Composition is
/// delegated to [`glam::Affine2`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Matrix {
    pub scale_x: f32,
    pub skew_x: f32,
    pub trans_x: f32,
    pub skew_y: f32,
    pub scale_y: f32,
    pub trans_y: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        scale_x: 1.0,
        skew_x: 0.0,
        trans_x: 0.0,
        skew_y: 0.0,
        scale_y: 1.0,
        trans_y: 0.0,
    };

    /// Pure translation
    pub fn translate(dx: f32, dy: f32) -> Self {
        Self {
            trans_x: dx,
            trans_y: dy,
            ..Self::IDENTITY
        }
    }

    /// Pure scale
    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            scale_x: sx,
            scale_y: sy,
            ..Self::IDENTITY
        }
    }

    /// Rotation about the origin, radians counter-clockwise
    pub fn rotate(radians: f32) -> Self {
        Affine2::from_angle(radians).into()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// `self * other`: `other` is applied first, then `self`
    pub fn concat(&self, other: &Matrix) -> Matrix {
        (Affine2::from(*self) * Affine2::from(*other)).into()
    }

    /// Map a point through this transform
    pub fn map_point(&self, point: Point) -> Point {
        Affine2::from(*self).transform_point2(point.into()).into()
    }
}

impl From<Matrix> for Affine2 {
    fn from(m: Matrix) -> Self {
        Affine2::from_cols_array(&[m.scale_x, m.skew_y, m.skew_x, m.scale_y, m.trans_x, m.trans_y])
    }
}

impl From<Affine2> for Matrix {
    fn from(a: Affine2) -> Self {
        let [scale_x, skew_y, skew_x, scale_y, trans_x, trans_y] = a.to_cols_array();
        Self {
            scale_x,
            skew_x,
            trans_x,
            skew_y,
            scale_y,
            trans_y,
        }
    }
}

wire_enum! {
    /// How a clip combines with the current clip
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum ClipOp {
        #[default]
        Intersect = 0,
        Difference = 1,
    }
}

wire_enum! {
    /// Interpretation of a point list
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum PointMode {
        #[default]
        Points = 0,
        Lines = 1,
        Polygon = 2,
    }
}

wire_enum! {
    /// Path fill rule
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum FillType {
        #[default]
        Winding = 0,
        EvenOdd = 1,
    }
}

wire_enum! {
    /// Primitive assembly for a vertex mesh
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum VertexMode {
        #[default]
        Triangles = 0,
        TriangleStrip = 1,
        TriangleFan = 2,
    }
}

wire_enum! {
    /// Path segment tag as written to the stream
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum VerbTag {
        Move = 0,
        Line = 1,
        Quad = 2,
        Cubic = 3,
        Close = 4,
    }
}

/// A single path segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathVerb {
    MoveTo(Point),
    LineTo(Point),
    QuadTo(Point, Point),
    CubicTo(Point, Point, Point),
    Close,
}

impl PathVerb {
    /// Stream tag for this segment
    pub fn tag(&self) -> VerbTag {
        match self {
            PathVerb::MoveTo(_) => VerbTag::Move,
            PathVerb::LineTo(_) => VerbTag::Line,
            PathVerb::QuadTo(..) => VerbTag::Quad,
            PathVerb::CubicTo(..) => VerbTag::Cubic,
            PathVerb::Close => VerbTag::Close,
        }
    }

    /// Points carried by this segment, in stream order
    pub fn points(&self) -> Vec<Point> {
        match *self {
            PathVerb::MoveTo(p) | PathVerb::LineTo(p) => vec![p],
            PathVerb::QuadTo(c, p) => vec![c, p],
            PathVerb::CubicTo(c1, c2, p) => vec![c1, c2, p],
            PathVerb::Close => Vec::new(),
        }
    }
}

impl VerbTag {
    /// Number of points following this tag on the wire
    pub fn point_count(self) -> usize {
        match self {
            VerbTag::Move | VerbTag::Line => 1,
            VerbTag::Quad => 2,
            VerbTag::Cubic => 3,
            VerbTag::Close => 0,
        }
    }
}

/// Vector path geometry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Path {
    pub fill_type: FillType,
    pub verbs: Vec<PathVerb>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.verbs.push(PathVerb::MoveTo(Point::new(x, y)));
        self
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.verbs.push(PathVerb::LineTo(Point::new(x, y)));
        self
    }

    pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) -> &mut Self {
        self.verbs
            .push(PathVerb::QuadTo(Point::new(cx, cy), Point::new(x, y)));
        self
    }

    pub fn cubic_to(&mut self, c1: Point, c2: Point, end: Point) -> &mut Self {
        self.verbs.push(PathVerb::CubicTo(c1, c2, end));
        self
    }

    pub fn close(&mut self) -> &mut Self {
        self.verbs.push(PathVerb::Close);
        self
    }

    /// Total point count over all segments
    pub fn point_count(&self) -> usize {
        self.verbs.iter().map(|v| v.tag().point_count()).sum()
    }
}

/// Triangle mesh with optional per-vertex attributes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Vertices {
    pub mode: VertexMode,
    pub positions: Vec<Point>,
    pub tex_coords: Option<Vec<Point>>,
    /// Per-vertex ARGB colors
    pub colors: Option<Vec<u32>>,
    pub indices: Option<Vec<u16>>,
}
