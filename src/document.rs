use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// IDENTIFIERS & GEOMETRY
// ============================================================================

/// Opaque identifier for layers and drawable objects.
///
/// Freshly created entities get their id from an
/// [`IdGenerator`](crate::ids::IdGenerator); recalled snapshots keep theirs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub const ORIGIN: Coordinate = Coordinate { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Both axes rounded with [`round_half_up`].
    pub fn rounded(self) -> Self {
        Self {
            x: round_half_up(self.x),
            y: round_half_up(self.y),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Round to the nearest integer, halves going toward positive infinity
/// (`2.5 -> 3`, `-2.5 -> -2`).
pub fn round_half_up(v: f64) -> f64 {
    // `(v + 0.5).floor()` is off by one where the addition itself rounds.
    let r = v.floor();
    if v - r >= 0.5 { r + 1.0 } else { r }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };

    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

// ============================================================================
// IMAGE REFERENCES
// ============================================================================

/// An externally owned image resource with known dimensions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl ImageDescriptor {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

/// A generated image waiting in the staging area, with its offset from the
/// generation bounding box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StagingAreaImage {
    pub image: ImageDescriptor,
    pub offset_x: f64,
    pub offset_y: f64,
}

// ============================================================================
// DRAWABLE OBJECTS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrushLine {
    pub id: EntityId,
    /// Flat `x0, y0, x1, y1, ...` list.
    pub points: Vec<f64>,
    pub stroke_width: f64,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EraserLine {
    pub id: EntityId,
    /// Flat `x0, y0, x1, y1, ...` list.
    pub points: Vec<f64>,
    pub stroke_width: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectShape {
    pub id: EntityId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageObject {
    pub id: EntityId,
    pub image: ImageDescriptor,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ImageObject {
    /// Build an image object for `layer_id`, anchored at the origin and sized
    /// to the source image.
    pub fn from_descriptor(layer_id: &EntityId, object_id: &EntityId, image: &ImageDescriptor) -> Self {
        Self {
            id: EntityId::new(format!("{}_image_{}", layer_id, object_id)),
            image: image.clone(),
            x: 0.0,
            y: 0.0,
            width: f64::from(image.width),
            height: f64::from(image.height),
        }
    }
}

/// One visual primitive inside a layer. Vector order is paint order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DrawableObject {
    BrushLine(BrushLine),
    EraserLine(EraserLine),
    RectShape(RectShape),
    Image(ImageObject),
}

impl DrawableObject {
    pub fn id(&self) -> &EntityId {
        match self {
            DrawableObject::BrushLine(line) => &line.id,
            DrawableObject::EraserLine(line) => &line.id,
            DrawableObject::RectShape(rect) => &rect.id,
            DrawableObject::Image(image) => &image.id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            DrawableObject::BrushLine(_) => "brush_line",
            DrawableObject::EraserLine(_) => "eraser_line",
            DrawableObject::RectShape(_) => "rect_shape",
            DrawableObject::Image(_) => "image",
        }
    }

    /// Multiply every geometric value by `factor`, rounding each result.
    pub fn scale(&mut self, factor: f64) {
        let s = |v: f64| round_half_up(v * factor);
        match self {
            DrawableObject::BrushLine(BrushLine { points, stroke_width, .. })
            | DrawableObject::EraserLine(EraserLine { points, stroke_width, .. }) => {
                for p in points.iter_mut() {
                    *p = s(*p);
                }
                *stroke_width = s(*stroke_width);
            }
            DrawableObject::RectShape(RectShape { x, y, width, height, .. })
            | DrawableObject::Image(ImageObject { x, y, width, height, .. }) => {
                *x = s(*x);
                *y = s(*y);
                *width = s(*width);
                *height = s(*height);
            }
        }
    }
}

// ============================================================================
// LAYERS & DOCUMENT
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: EntityId,
    pub is_enabled: bool,
    pub objects: Vec<DrawableObject>,
    pub opacity: f64,
    pub position: Coordinate,
}

impl Layer {
    /// An enabled, empty, fully opaque layer at the origin.
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            is_enabled: true,
            objects: Vec::new(),
            opacity: 1.0,
            position: Coordinate::ORIGIN,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Layer,
    ControlAdapter,
    RegionalGuidance,
    InpaintMask,
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Layer => "layer",
            EntityKind::ControlAdapter => "control_adapter",
            EntityKind::RegionalGuidance => "regional_guidance",
            EntityKind::InpaintMask => "inpaint_mask",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectedEntity {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl SelectedEntity {
    pub fn layer(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Layer,
            id,
        }
    }
}

/// The full editable document: layers back-to-front, the cached composite
/// render, and the current selection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub layers: Vec<Layer>,
    /// Memoized composite of all layers. Cleared by every layer mutation.
    pub image_cache: Option<ImageDescriptor>,
    pub selected_entity: Option<SelectedEntity>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, id: &EntityId) -> Option<&Layer> {
        self.layers.iter().find(|l| &l.id == id)
    }

    pub fn layer_mut(&mut self, id: &EntityId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| &l.id == id)
    }

    pub fn layer_index(&self, id: &EntityId) -> Option<usize> {
        self.layers.iter().position(|l| &l.id == id)
    }

    pub fn contains_layer(&self, id: &EntityId) -> bool {
        self.layer_index(id).is_some()
    }

    pub fn invalidate_cache(&mut self) {
        self.image_cache = None;
    }

    pub fn selected_layer(&self) -> Option<&Layer> {
        match &self.selected_entity {
            Some(SelectedEntity { kind: EntityKind::Layer, id }) => self.layer(id),
            _ => None,
        }
    }

    /// Layer table for terminal output: one line per layer, front-most
    /// first, each followed by its objects, then the selection.
    pub fn summary_lines(&self) -> Vec<String> {
        let selected = self.selected_layer().map(|l| &l.id);
        let mut lines = Vec::new();
        for l in self.layers.iter().rev() {
            let marker = if selected == Some(&l.id) { '*' } else { ' ' };
            lines.push(format!(
                "{} {}  {}  opacity {:.2}  at ({}, {})  {} object(s)",
                marker,
                l.id,
                if l.is_enabled { "on " } else { "off" },
                l.opacity,
                l.position.x,
                l.position.y,
                l.objects.len()
            ));
            for obj in &l.objects {
                lines.push(format!("      {} {}", obj.kind_name(), obj.id()));
            }
        }
        lines.push(match &self.selected_entity {
            Some(sel) => format!("selected: {} {}", sel.kind.name(), sel.id),
            None => "selected: none".to_string(),
        });
        lines
    }
}
