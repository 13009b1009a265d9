use serde::{Deserialize, Serialize};

use crate::document::{BrushLine, Coordinate, EntityId, EraserLine, ImageDescriptor, Layer, Rect, RectShape, StagingAreaImage};

/// A discrete request to transition the document.
///
/// Intents are plain data so they can be logged, scripted, or stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    AddLayer,
    AddLayerFromStaging {
        staging_image: StagingAreaImage,
        position: Coordinate,
    },
    RecallLayer {
        data: Layer,
    },
    ToggleEnabled {
        id: EntityId,
    },
    Translate {
        id: EntityId,
        position: Coordinate,
    },
    UpdateBbox {
        id: EntityId,
        bbox: Option<Rect>,
    },
    Reset {
        id: EntityId,
    },
    Delete {
        id: EntityId,
    },
    DeleteAll,
    SetOpacity {
        id: EntityId,
        opacity: f64,
    },
    MoveForwardOne {
        id: EntityId,
    },
    MoveToFront {
        id: EntityId,
    },
    MoveBackwardOne {
        id: EntityId,
    },
    MoveToBack {
        id: EntityId,
    },
    AddBrushLine {
        id: EntityId,
        brush_line: BrushLine,
    },
    AddEraserLine {
        id: EntityId,
        eraser_line: EraserLine,
    },
    AddRectShape {
        id: EntityId,
        rect_shape: RectShape,
    },
    Scale {
        id: EntityId,
        scale: f64,
        position: Coordinate,
    },
    AddImage {
        id: EntityId,
        image: ImageDescriptor,
        /// Overrides the default origin anchor of the new image object.
        position: Option<Coordinate>,
    },
    SetImageCache {
        image: Option<ImageDescriptor>,
    },
    Rasterize {
        id: EntityId,
        image: ImageDescriptor,
        position: Coordinate,
    },
}

impl Intent {
    /// The layer this intent addresses, if it addresses an existing one.
    pub fn target(&self) -> Option<&EntityId> {
        match self {
            Intent::AddLayer
            | Intent::AddLayerFromStaging { .. }
            | Intent::RecallLayer { .. }
            | Intent::DeleteAll
            | Intent::SetImageCache { .. } => None,
            Intent::ToggleEnabled { id }
            | Intent::Translate { id, .. }
            | Intent::UpdateBbox { id, .. }
            | Intent::Reset { id }
            | Intent::Delete { id }
            | Intent::SetOpacity { id, .. }
            | Intent::MoveForwardOne { id }
            | Intent::MoveToFront { id }
            | Intent::MoveBackwardOne { id }
            | Intent::MoveToBack { id }
            | Intent::AddBrushLine { id, .. }
            | Intent::AddEraserLine { id, .. }
            | Intent::AddRectShape { id, .. }
            | Intent::Scale { id, .. }
            | Intent::AddImage { id, .. }
            | Intent::Rasterize { id, .. } => Some(id),
        }
    }

    /// Whether applying this intent changes document content worth an undo step.
    /// Cache updates only touch the memoized render.
    pub fn is_undoable(&self) -> bool {
        !matches!(self, Intent::SetImageCache { .. } | Intent::UpdateBbox { .. })
    }

    pub fn description(&self) -> String {
        match self {
            Intent::AddLayer => "Add Layer".to_string(),
            Intent::AddLayerFromStaging { staging_image, .. } => {
                format!("Add Layer from {}", staging_image.image.name)
            }
            Intent::RecallLayer { data } => format!("Recall Layer {}", data.id),
            Intent::ToggleEnabled { id } => format!("Toggle Layer {}", id),
            Intent::Translate { id, position } => {
                format!("Move Layer {} to ({}, {})", id, position.x, position.y)
            }
            Intent::UpdateBbox { id, .. } => format!("Update Bounds of {}", id),
            Intent::Reset { id } => format!("Reset Layer {}", id),
            Intent::Delete { id } => format!("Delete Layer {}", id),
            Intent::DeleteAll => "Delete All Layers".to_string(),
            Intent::SetOpacity { id, opacity } => {
                format!("Layer {} Opacity: {:.0}%", id, opacity * 100.0)
            }
            Intent::MoveForwardOne { id } => format!("Bring Forward {}", id),
            Intent::MoveToFront { id } => format!("Bring to Front {}", id),
            Intent::MoveBackwardOne { id } => format!("Send Backward {}", id),
            Intent::MoveToBack { id } => format!("Send to Back {}", id),
            Intent::AddBrushLine { id, .. } => format!("Brush Stroke on {}", id),
            Intent::AddEraserLine { id, .. } => format!("Eraser Stroke on {}", id),
            Intent::AddRectShape { id, .. } => format!("Rectangle on {}", id),
            Intent::Scale { id, scale, .. } => format!("Scale Layer {} ×{}", id, scale),
            Intent::AddImage { id, image, .. } => format!("Place {} on {}", image.name, id),
            Intent::SetImageCache { image: Some(image) } => format!("Cache Composite {}", image.name),
            Intent::SetImageCache { image: None } => "Clear Composite Cache".to_string(),
            Intent::Rasterize { id, .. } => format!("Rasterize Layer {}", id),
        }
    }
}
