//! Shared sub-objects referenced from a paint
//!
//! The set of kinds is closed: [`PaintObject`] is a sum type over shaders,
//! color filters, path effects and mask filters. Each concrete variant has a
//! name and a serialized form so it can be rebuilt on the far side of a
//! process boundary through a [`FactoryTable`].

use std::sync::Arc;

use image::RgbaImage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::paint::{BlendMode, Color};
use crate::types::Point;

wire_enum! {
    /// Edge behavior for shaders
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum TileMode {
        #[default]
        Clamp = 0,
        Repeat = 1,
        Mirror = 2,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub enum BlurStyle {
        #[default]
        Normal = 0,
        Solid = 1,
        Outer = 2,
        Inner = 3,
    }
}

wire_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub enum FontSlant {
        #[default]
        Upright = 0,
        Italic = 1,
        Oblique = 2,
    }
}

/// Font reference, rebuilt by family name across processes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Typeface {
    pub family: String,
    /// CSS-style weight, 100..=900
    pub weight: u16,
    pub slant: FontSlant,
}

impl Typeface {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            weight: 400,
            slant: FontSlant::Upright,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorShader {
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    pub start: Point,
    pub end: Point,
    pub colors: Vec<Color>,
    /// Evenly spaced when `None`
    pub stops: Option<Vec<f32>>,
    pub tile_mode: TileMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialGradient {
    pub center: Point,
    pub radius: f32,
    pub colors: Vec<Color>,
    pub stops: Option<Vec<f32>>,
    pub tile_mode: TileMode,
}

/// Shader sampling a raster image held in this process
///
/// Has no cross-process form.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmapShader {
    pub image: Arc<RgbaImage>,
    pub tile_x: TileMode,
    pub tile_y: TileMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shader {
    Color(ColorShader),
    LinearGradient(LinearGradient),
    RadialGradient(RadialGradient),
    Bitmap(BitmapShader),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendColorFilter {
    pub color: Color,
    pub mode: BlendMode,
}

/// 4x5 row-major color matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixColorFilter {
    pub matrix: [f32; 20],
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColorFilter {
    Blend(BlendColorFilter),
    Matrix(MatrixColorFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashPathEffect {
    pub intervals: Vec<f32>,
    pub phase: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerPathEffect {
    pub radius: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathEffect {
    Dash(DashPathEffect),
    Corner(CornerPathEffect),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlurMaskFilter {
    pub style: BlurStyle,
    pub sigma: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaskFilter {
    Blur(BlurMaskFilter),
}

wire_enum! {
    /// Which paint slot a sub-object belongs to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ObjectKind {
        Shader = 0,
        ColorFilter = 1,
        PathEffect = 2,
        MaskFilter = 3,
    }
}

impl ObjectKind {
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Shader => "shader",
            ObjectKind::ColorFilter => "color filter",
            ObjectKind::PathEffect => "path effect",
            ObjectKind::MaskFilter => "mask filter",
        }
    }
}

/// Any shared sub-object a paint can reference
#[derive(Debug, Clone, PartialEq)]
pub enum PaintObject {
    Shader(Arc<Shader>),
    ColorFilter(Arc<ColorFilter>),
    PathEffect(Arc<PathEffect>),
    MaskFilter(Arc<MaskFilter>),
}

/// Name plus construction data for rebuilding an object in another process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenedObject {
    pub name: String,
    pub data: Vec<u8>,
}

impl PaintObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            PaintObject::Shader(_) => ObjectKind::Shader,
            PaintObject::ColorFilter(_) => ObjectKind::ColorFilter,
            PaintObject::PathEffect(_) => ObjectKind::PathEffect,
            PaintObject::MaskFilter(_) => ObjectKind::MaskFilter,
        }
    }

    pub fn as_shader(&self) -> Option<&Arc<Shader>> {
        match self {
            PaintObject::Shader(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_color_filter(&self) -> Option<&Arc<ColorFilter>> {
        match self {
            PaintObject::ColorFilter(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_path_effect(&self) -> Option<&Arc<PathEffect>> {
        match self {
            PaintObject::PathEffect(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_mask_filter(&self) -> Option<&Arc<MaskFilter>> {
        match self {
            PaintObject::MaskFilter(m) => Some(m),
            _ => None,
        }
    }

    /// Address of the shared allocation, used as the identity key
    pub(crate) fn identity(&self) -> usize {
        match self {
            PaintObject::Shader(s) => Arc::as_ptr(s) as usize,
            PaintObject::ColorFilter(f) => Arc::as_ptr(f) as usize,
            PaintObject::PathEffect(e) => Arc::as_ptr(e) as usize,
            PaintObject::MaskFilter(m) => Arc::as_ptr(m) as usize,
        }
    }

    /// Reduce to cross-process data, `None` if this object has no such form
    pub fn flatten(&self) -> Option<FlattenedObject> {
        match self {
            PaintObject::Shader(shader) => match shader.as_ref() {
                Shader::Color(s) => flatten_value(s),
                Shader::LinearGradient(g) => flatten_value(g),
                Shader::RadialGradient(g) => flatten_value(g),
                Shader::Bitmap(_) => None,
            },
            PaintObject::ColorFilter(filter) => match filter.as_ref() {
                ColorFilter::Blend(f) => flatten_value(f),
                ColorFilter::Matrix(f) => flatten_value(f),
            },
            PaintObject::PathEffect(effect) => match effect.as_ref() {
                PathEffect::Dash(e) => flatten_value(e),
                PathEffect::Corner(e) => flatten_value(e),
            },
            PaintObject::MaskFilter(filter) => match filter.as_ref() {
                MaskFilter::Blur(f) => flatten_value(f),
            },
        }
    }
}

/// A concrete sub-object variant with a cross-process form
pub trait Flattenable: Serialize + DeserializeOwned {
    /// Factory name written to the stream
    const NAME: &'static str;

    fn into_object(self) -> PaintObject;
}

impl Flattenable for ColorShader {
    const NAME: &'static str = "ColorShader";
    fn into_object(self) -> PaintObject {
        PaintObject::Shader(Arc::new(Shader::Color(self)))
    }
}

impl Flattenable for LinearGradient {
    const NAME: &'static str = "LinearGradient";
    fn into_object(self) -> PaintObject {
        PaintObject::Shader(Arc::new(Shader::LinearGradient(self)))
    }
}

impl Flattenable for RadialGradient {
    const NAME: &'static str = "RadialGradient";
    fn into_object(self) -> PaintObject {
        PaintObject::Shader(Arc::new(Shader::RadialGradient(self)))
    }
}

impl Flattenable for BlendColorFilter {
    const NAME: &'static str = "BlendColorFilter";
    fn into_object(self) -> PaintObject {
        PaintObject::ColorFilter(Arc::new(ColorFilter::Blend(self)))
    }
}

impl Flattenable for MatrixColorFilter {
    const NAME: &'static str = "MatrixColorFilter";
    fn into_object(self) -> PaintObject {
        PaintObject::ColorFilter(Arc::new(ColorFilter::Matrix(self)))
    }
}

impl Flattenable for DashPathEffect {
    const NAME: &'static str = "DashPathEffect";
    fn into_object(self) -> PaintObject {
        PaintObject::PathEffect(Arc::new(PathEffect::Dash(self)))
    }
}

impl Flattenable for CornerPathEffect {
    const NAME: &'static str = "CornerPathEffect";
    fn into_object(self) -> PaintObject {
        PaintObject::PathEffect(Arc::new(PathEffect::Corner(self)))
    }
}

impl Flattenable for BlurMaskFilter {
    const NAME: &'static str = "BlurMaskFilter";
    fn into_object(self) -> PaintObject {
        PaintObject::MaskFilter(Arc::new(MaskFilter::Blur(self)))
    }
}

/// Serialize `value`, refusing data its own factory would reject
///
/// JSON has no non-finite numbers, so a NaN or infinite float is written as
/// `null` and fails to read back.
fn flatten_value<T: Flattenable>(value: &T) -> Option<FlattenedObject> {
    let data = serde_json::to_vec(value).ok()?;
    serde_json::from_slice::<T>(&data).ok()?;
    Some(FlattenedObject {
        name: T::NAME.to_string(),
        data,
    })
}

/// Rebuild a [`Flattenable`] from its construction data
pub fn unflatten<T: Flattenable>(data: &[u8]) -> Result<PaintObject, serde_json::Error> {
    Ok(serde_json::from_slice::<T>(data)?.into_object())
}

/// Constructor invoked for a factory name
pub type FactoryFn = fn(&[u8]) -> Result<PaintObject, serde_json::Error>;

const BUILTIN_FACTORIES: &[(&str, FactoryFn)] = &[
    (ColorShader::NAME, unflatten::<ColorShader>),
    (LinearGradient::NAME, unflatten::<LinearGradient>),
    (RadialGradient::NAME, unflatten::<RadialGradient>),
    (BlendColorFilter::NAME, unflatten::<BlendColorFilter>),
    (MatrixColorFilter::NAME, unflatten::<MatrixColorFilter>),
    (DashPathEffect::NAME, unflatten::<DashPathEffect>),
    (CornerPathEffect::NAME, unflatten::<CornerPathEffect>),
    (BlurMaskFilter::NAME, unflatten::<BlurMaskFilter>),
];

/// Name to constructor mapping supplied to a cross-process decoder
///
/// Defaults to every built-in kind. Lookups only ever consult this table;
/// there is no global registration.
#[derive(Clone)]
pub struct FactoryTable {
    entries: Vec<(&'static str, FactoryFn)>,
}

impl std::fmt::Debug for FactoryTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

impl Default for FactoryTable {
    fn default() -> Self {
        Self {
            entries: BUILTIN_FACTORIES.to_vec(),
        }
    }
}

impl FactoryTable {
    /// Table with every built-in kind
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with no entries
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add or replace the constructor for `name`
    pub fn register(&mut self, name: &'static str, factory: FactoryFn) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = factory;
        } else {
            self.entries.push((name, factory));
        }
    }

    pub fn get(&self, name: &str) -> Option<FactoryFn> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, factory)| *factory)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild an object from its name and data
    pub fn build(&self, name: &str, data: &[u8]) -> Result<PaintObject, DecodeError> {
        let factory = self
            .get(name)
            .ok_or_else(|| DecodeError::UnknownFactory(name.to_string()))?;
        factory(data).map_err(|e| DecodeError::FactoryData {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }
}

impl From<Shader> for PaintObject {
    fn from(shader: Shader) -> Self {
        PaintObject::Shader(Arc::new(shader))
    }
}

impl From<ColorFilter> for PaintObject {
    fn from(filter: ColorFilter) -> Self {
        PaintObject::ColorFilter(Arc::new(filter))
    }
}

impl From<PathEffect> for PaintObject {
    fn from(effect: PathEffect) -> Self {
        PaintObject::PathEffect(Arc::new(effect))
    }
}

impl From<MaskFilter> for PaintObject {
    fn from(filter: MaskFilter) -> Self {
        PaintObject::MaskFilter(Arc::new(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::{COLOR_BLUE, COLOR_RED};

    #[test]
    fn test_flatten_and_build_gradient() {
        let gradient = LinearGradient {
            start: Point::new(0.0, 0.0),
            end: Point::new(100.0, 0.0),
            colors: vec![COLOR_RED, COLOR_BLUE],
            stops: None,
            tile_mode: TileMode::Mirror,
        };
        let object = PaintObject::from(Shader::LinearGradient(gradient));

        let flat = object.flatten().unwrap();
        assert_eq!(flat.name, "LinearGradient");

        let rebuilt = FactoryTable::new().build(&flat.name, &flat.data).unwrap();
        assert_eq!(rebuilt, object);
    }

    #[test]
    fn test_bitmap_shader_has_no_flat_form() {
        let object = PaintObject::from(Shader::Bitmap(BitmapShader {
            image: Arc::new(RgbaImage::new(2, 2)),
            tile_x: TileMode::Repeat,
            tile_y: TileMode::Repeat,
        }));
        assert!(object.flatten().is_none());
    }

    #[test]
    fn test_non_finite_floats_have_no_flat_form() {
        let dash = PaintObject::from(PathEffect::Dash(DashPathEffect {
            intervals: vec![4.0, 2.0],
            phase: f32::INFINITY,
        }));
        assert!(dash.flatten().is_none());

        let blur = PaintObject::from(MaskFilter::Blur(BlurMaskFilter {
            style: BlurStyle::Normal,
            sigma: f32::NAN,
        }));
        assert!(blur.flatten().is_none());

        let gradient = PaintObject::from(Shader::RadialGradient(RadialGradient {
            center: Point::new(0.0, 0.0),
            radius: 10.0,
            colors: vec![COLOR_RED, COLOR_BLUE],
            stops: Some(vec![0.0, f32::NEG_INFINITY]),
            tile_mode: TileMode::Clamp,
        }));
        assert!(gradient.flatten().is_none());
    }

    #[test]
    fn test_unknown_factory_name() {
        let result = FactoryTable::new().build("NoSuchShader", b"{}");
        assert!(matches!(result, Err(DecodeError::UnknownFactory(name)) if name == "NoSuchShader"));
    }

    #[test]
    fn test_empty_table_rejects_builtin() {
        let table = FactoryTable::empty();
        assert!(table.is_empty());
        let flat = PaintObject::from(MaskFilter::Blur(BlurMaskFilter {
            style: BlurStyle::Outer,
            sigma: 2.5,
        }))
        .flatten()
        .unwrap();
        assert!(table.build(&flat.name, &flat.data).is_err());
    }

    #[test]
    fn test_factory_rejects_bad_data() {
        let result = FactoryTable::new().build(DashPathEffect::NAME, b"not json");
        assert!(matches!(result, Err(DecodeError::FactoryData { .. })));
    }

    #[test]
    fn test_register_overrides() {
        fn always_red(_: &[u8]) -> Result<PaintObject, serde_json::Error> {
            Ok(ColorShader { color: COLOR_RED }.into_object())
        }
        let mut table = FactoryTable::new();
        let before = table.len();
        table.register(ColorShader::NAME, always_red);
        assert_eq!(table.len(), before);
        let built = table.build(ColorShader::NAME, b"ignored").unwrap();
        assert_eq!(built, ColorShader { color: COLOR_RED }.into_object());
    }
}
