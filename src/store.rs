// ============================================================================
// Layer document store: applies intents to an owned document
// ============================================================================
//
// Every operation is total. An intent naming a layer that does not exist is
// ignored and leaves the document exactly as it was; creation intents always
// append. Any change to layer content or order clears the cached composite.

use crate::arrange::{move_one_to_end, move_one_to_start, move_to_end, move_to_start};
use crate::document::{Coordinate, Document, DrawableObject, EntityId, ImageDescriptor, ImageObject, Layer, Rect, SelectedEntity, StagingAreaImage};
use crate::ids::IdGenerator;
use crate::intent::Intent;
use crate::{log_info, log_warn};

/// What happened when an intent was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    /// The document changed (or, for one-step moves at the end of the
    /// stack, the addressed layer existed and the cache was invalidated).
    Applied,
    /// The intent referenced something that does not exist. Nothing changed.
    Ignored,
    /// The intent reached a branch that is deliberately inert. Nothing changed.
    NotImplemented,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Outcome::Applied
    }
}

/// Apply `intent` to `doc`, drawing any new identifiers from `ids`.
pub fn apply(doc: &mut Document, intent: Intent, ids: &mut dyn IdGenerator) -> Outcome {
    let description = intent.description();
    let outcome = match intent {
        Intent::AddLayer => add_layer(doc, ids),
        Intent::AddLayerFromStaging { staging_image, position } => {
            add_layer_from_staging(doc, ids, &staging_image, position)
        }
        Intent::RecallLayer { data } => recall_layer(doc, data),
        Intent::ToggleEnabled { id } => with_layer(doc, &id, |layer| {
            layer.is_enabled = !layer.is_enabled;
        }),
        Intent::Translate { id, position } => with_layer(doc, &id, |layer| {
            layer.position = position;
        }),
        Intent::UpdateBbox { id, bbox } => update_bbox(doc, &id, bbox),
        Intent::Reset { id } => with_layer(doc, &id, |layer| {
            layer.is_enabled = true;
            layer.objects.clear();
            layer.position = Coordinate::ORIGIN;
        }),
        Intent::Delete { id } => delete_layer(doc, &id),
        Intent::DeleteAll => {
            doc.layers.clear();
            doc.invalidate_cache();
            Outcome::Applied
        }
        Intent::SetOpacity { id, opacity } => set_opacity(doc, &id, opacity),
        Intent::MoveForwardOne { id } => reorder(doc, &id, move_one_to_end),
        Intent::MoveToFront { id } => reorder(doc, &id, move_to_end),
        Intent::MoveBackwardOne { id } => reorder(doc, &id, move_one_to_start),
        Intent::MoveToBack { id } => reorder(doc, &id, move_to_start),
        Intent::AddBrushLine { id, brush_line } => with_layer(doc, &id, |layer| {
            layer.objects.push(DrawableObject::BrushLine(brush_line));
        }),
        Intent::AddEraserLine { id, eraser_line } => with_layer(doc, &id, |layer| {
            layer.objects.push(DrawableObject::EraserLine(eraser_line));
        }),
        Intent::AddRectShape { id, rect_shape } => with_layer(doc, &id, |layer| {
            layer.objects.push(DrawableObject::RectShape(rect_shape));
        }),
        Intent::Scale { id, scale, position } => scale_layer(doc, &id, scale, position),
        Intent::AddImage { id, image, position } => add_image(doc, ids, &id, &image, position),
        Intent::SetImageCache { image } => {
            doc.image_cache = image;
            Outcome::Applied
        }
        Intent::Rasterize { id, image, position } => rasterize(doc, ids, &id, &image, position),
    };

    match outcome {
        Outcome::Applied => {
            log_info!("{}", description);
        }
        Outcome::Ignored => {
            log_warn!("Ignored '{}': target not found", description);
        }
        Outcome::NotImplemented => {
            log_warn!("'{}' is not implemented, document unchanged", description);
        }
    }
    outcome
}

/// Run `mutate` on the layer with `id` and invalidate the cache, or report a miss.
fn with_layer(doc: &mut Document, id: &EntityId, mutate: impl FnOnce(&mut Layer)) -> Outcome {
    let Some(layer) = doc.layer_mut(id) else {
        return Outcome::Ignored;
    };
    mutate(layer);
    doc.invalidate_cache();
    Outcome::Applied
}

fn push_and_select(doc: &mut Document, layer: Layer) {
    doc.selected_entity = Some(SelectedEntity::layer(layer.id.clone()));
    doc.layers.push(layer);
    doc.invalidate_cache();
}

fn add_layer(doc: &mut Document, ids: &mut dyn IdGenerator) -> Outcome {
    push_and_select(doc, Layer::new(ids.next_id()));
    Outcome::Applied
}

fn add_layer_from_staging(
    doc: &mut Document,
    ids: &mut dyn IdGenerator,
    staged: &StagingAreaImage,
    position: Coordinate,
) -> Outcome {
    let id = ids.next_id();
    let object_id = ids.next_id();
    let image = ImageObject::from_descriptor(&id, &object_id, &staged.image);

    let mut layer = Layer::new(id);
    layer.objects.push(DrawableObject::Image(image));
    layer.position = Coordinate::new(position.x + staged.offset_x, position.y + staged.offset_y);
    push_and_select(doc, layer);
    Outcome::Applied
}

fn recall_layer(doc: &mut Document, data: Layer) -> Outcome {
    // Keep ids unique: a snapshot of a layer that is still present is refused.
    if doc.contains_layer(&data.id) {
        return Outcome::Ignored;
    }
    push_and_select(doc, data);
    Outcome::Applied
}

fn update_bbox(doc: &mut Document, id: &EntityId, bbox: Option<Rect>) -> Outcome {
    if !doc.contains_layer(id) {
        return Outcome::Ignored;
    }
    // Clearing objects on an empty box stays off until layer bounds can be
    // computed reliably. A present box carries no state to store.
    match bbox {
        None => Outcome::NotImplemented,
        Some(_) => Outcome::Applied,
    }
}

fn delete_layer(doc: &mut Document, id: &EntityId) -> Outcome {
    let Some(index) = doc.layer_index(id) else {
        return Outcome::Ignored;
    };
    doc.layers.remove(index);
    doc.invalidate_cache();
    Outcome::Applied
}

fn set_opacity(doc: &mut Document, id: &EntityId, opacity: f64) -> Outcome {
    if !opacity.is_finite() {
        return Outcome::Ignored;
    }
    with_layer(doc, id, |layer| {
        layer.opacity = opacity.clamp(0.0, 1.0);
    })
}

fn scale_layer(doc: &mut Document, id: &EntityId, factor: f64, position: Coordinate) -> Outcome {
    if !factor.is_finite() {
        return Outcome::Ignored;
    }
    with_layer(doc, id, |layer| {
        for obj in layer.objects.iter_mut() {
            obj.scale(factor);
        }
        layer.position = position.rounded();
    })
}

fn reorder(doc: &mut Document, id: &EntityId, op: fn(&mut [Layer], usize)) -> Outcome {
    let Some(index) = doc.layer_index(id) else {
        return Outcome::Ignored;
    };
    op(&mut doc.layers, index);
    doc.invalidate_cache();
    Outcome::Applied
}

fn add_image(
    doc: &mut Document,
    ids: &mut dyn IdGenerator,
    id: &EntityId,
    image: &ImageDescriptor,
    position: Option<Coordinate>,
) -> Outcome {
    if !doc.contains_layer(id) {
        return Outcome::Ignored;
    }
    let object_id = ids.next_id();
    with_layer(doc, id, |layer| {
        let mut obj = ImageObject::from_descriptor(&layer.id, &object_id, image);
        if let Some(pos) = position {
            obj.x = pos.x;
            obj.y = pos.y;
        }
        layer.objects.push(DrawableObject::Image(obj));
    })
}

fn rasterize(
    doc: &mut Document,
    ids: &mut dyn IdGenerator,
    id: &EntityId,
    image: &ImageDescriptor,
    position: Coordinate,
) -> Outcome {
    if !doc.contains_layer(id) {
        return Outcome::Ignored;
    }
    let object_id = ids.next_id();
    with_layer(doc, id, |layer| {
        let obj = ImageObject::from_descriptor(&layer.id, &object_id, image);
        layer.objects = vec![DrawableObject::Image(obj)];
        layer.position = position;
    })
}
