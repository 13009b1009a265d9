// ============================================================================
// LayerDoc scripting: Rhai-based sandboxed intent scripts
// ============================================================================
//
// Scripts drive a project through the same intents the store exposes, one
// host function per intent plus a few queries. Every call dispatches
// immediately, so undo()/redo() inside a script see the preceding calls.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Position, Scope};

use crate::document::{BrushLine, Color, Coordinate, EntityId, EraserLine, ImageDescriptor, Rect, RectShape, StagingAreaImage};
use crate::intent::Intent;
use crate::io;
use crate::project::Project;
use crate::settings::Settings;

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    fn at(message: String, pos: Position) -> Self {
        Self {
            message,
            line: pos.line().filter(|&l| l > 0),
            column: pos.position().filter(|&c| c > 0),
        }
    }

    /// Error text with location header and a hint for the common mistakes.
    pub fn friendly_message(&self) -> String {
        let mut parts = Vec::new();
        match (self.line, self.column) {
            (Some(line), Some(col)) => parts.push(format!("Error on line {}, column {}:", line, col)),
            (Some(line), None) => parts.push(format!("Error on line {}:", line)),
            _ => parts.push("Script error:".to_string()),
        }

        let raw = &self.message;
        let cleaned = raw.split(" (line ").next().unwrap_or(raw);
        parts.push(format!("  {}", cleaned));

        if raw.contains("Function not found:") {
            parts.push(String::new());
            parts.push("  Tip: layer ids are strings, e.g. toggle_enabled(\"a1b2...\").".to_string());
            parts.push("  Store the result of add_layer() and pass it on.".to_string());
        } else if raw.contains("Too many operations") {
            parts.push(String::new());
            parts.push("  Tip: raise script_max_operations in the settings file,".to_string());
            parts.push("  or check the script for an endless loop.".to_string());
        }
        parts.join("\n")
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(f, "Line {}, Col {}: {}", line, col, self.message),
            (Some(line), None) => write!(f, "Line {}: {}", line, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ScriptError {}

// ============================================================================
// Script context: shared between the engine's host functions
// ============================================================================

struct ScriptContext {
    project: Project,
    console_output: Vec<String>,
}

type SharedContext = Arc<Mutex<ScriptContext>>;
type HostResult<T> = Result<T, Box<EvalAltResult>>;

fn with_ctx<T>(ctx: &SharedContext, f: impl FnOnce(&mut ScriptContext) -> T) -> T {
    let mut lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut lock)
}

fn dispatch(ctx: &SharedContext, intent: Intent) -> bool {
    with_ctx(ctx, |c| c.project.dispatch(intent).is_applied())
}

fn num(v: &Dynamic) -> HostResult<f64> {
    if let Ok(f) = v.as_float() {
        return Ok(f);
    }
    if let Ok(i) = v.as_int() {
        return Ok(i as f64);
    }
    Err(format!("expected a number, got {}", v.type_name()).into())
}

fn dim(v: &Dynamic) -> HostResult<u32> {
    let n = num(v)?.round();
    if !(0.0..=f64::from(u32::MAX)).contains(&n) {
        return Err(format!("image dimension {} is out of range", n).into());
    }
    Ok(n as u32)
}

fn points(arr: &Array) -> HostResult<Vec<f64>> {
    if arr.len() % 2 != 0 {
        return Err("points must be a flat list of x, y pairs".into());
    }
    arr.iter().map(num).collect()
}

fn color(arr: &Array) -> HostResult<Color> {
    let channel = |i: usize| -> HostResult<u8> {
        let v = arr.get(i).map(num).transpose()?.unwrap_or(255.0);
        Ok(v.clamp(0.0, 255.0) as u8)
    };
    Ok(Color::rgba(channel(0)?, channel(1)?, channel(2)?, channel(3)?))
}

fn image(name: &str, w: &Dynamic, h: &Dynamic) -> HostResult<ImageDescriptor> {
    Ok(ImageDescriptor::new(name, dim(w)?, dim(h)?))
}

fn layer_id(id: &ImmutableString) -> EntityId {
    EntityId::new(id.as_str())
}

// ============================================================================
// Engine construction with sandbox + API registration
// ============================================================================

fn create_engine(ctx: SharedContext, settings: &Settings) -> Engine {
    let mut engine = Engine::new();

    // ── Sandbox limits ──
    engine.set_max_operations(settings.script_max_operations);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(100_000);
    engine.set_max_map_size(1_000);

    register_layer_api(&mut engine, ctx.clone());
    register_object_api(&mut engine, ctx.clone());
    register_file_api(&mut engine, ctx.clone());
    register_query_api(&mut engine, ctx);

    engine
}

fn register_layer_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("add_layer", move || -> String {
        with_ctx(&c, |c| {
            let _ = c.project.dispatch(Intent::AddLayer);
            selected(c)
        })
    });

    let c = ctx.clone();
    engine.register_fn(
        "add_layer_from_image",
        move |name: ImmutableString, w: Dynamic, h: Dynamic, ox: Dynamic, oy: Dynamic, x: Dynamic, y: Dynamic| -> HostResult<String> {
            let staging_image = StagingAreaImage {
                image: image(&name, &w, &h)?,
                offset_x: num(&ox)?,
                offset_y: num(&oy)?,
            };
            let position = Coordinate::new(num(&x)?, num(&y)?);
            Ok(with_ctx(&c, |c| {
                let _ = c.project.dispatch(Intent::AddLayerFromStaging { staging_image, position });
                selected(c)
            }))
        },
    );

    // Intents addressed by id alone
    let simple: [(&str, fn(EntityId) -> Intent); 7] = [
        ("toggle_enabled", |id| Intent::ToggleEnabled { id }),
        ("reset_layer", |id| Intent::Reset { id }),
        ("delete_layer", |id| Intent::Delete { id }),
        ("move_forward", |id| Intent::MoveForwardOne { id }),
        ("move_to_front", |id| Intent::MoveToFront { id }),
        ("move_backward", |id| Intent::MoveBackwardOne { id }),
        ("move_to_back", |id| Intent::MoveToBack { id }),
    ];
    for (name, make) in simple {
        let c = ctx.clone();
        engine.register_fn(name, move |id: ImmutableString| -> bool { dispatch(&c, make(layer_id(&id))) });
    }

    let c = ctx.clone();
    engine.register_fn("delete_all_layers", move || -> bool { dispatch(&c, Intent::DeleteAll) });

    let c = ctx.clone();
    engine.register_fn("translate", move |id: ImmutableString, x: Dynamic, y: Dynamic| -> HostResult<bool> {
        let position = Coordinate::new(num(&x)?, num(&y)?);
        Ok(dispatch(&c, Intent::Translate { id: layer_id(&id), position }))
    });

    let c = ctx.clone();
    engine.register_fn("update_bbox", move |id: ImmutableString| -> bool {
        dispatch(&c, Intent::UpdateBbox { id: layer_id(&id), bbox: None })
    });

    let c = ctx.clone();
    engine.register_fn(
        "update_bbox",
        move |id: ImmutableString, x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| -> HostResult<bool> {
            let bbox = Rect {
                x: num(&x)?,
                y: num(&y)?,
                width: num(&w)?,
                height: num(&h)?,
            };
            Ok(dispatch(&c, Intent::UpdateBbox { id: layer_id(&id), bbox: Some(bbox) }))
        },
    );

    let c = ctx.clone();
    engine.register_fn("set_opacity", move |id: ImmutableString, v: Dynamic| -> HostResult<bool> {
        Ok(dispatch(&c, Intent::SetOpacity { id: layer_id(&id), opacity: num(&v)? }))
    });

    let c = ctx.clone();
    engine.register_fn(
        "scale_layer",
        move |id: ImmutableString, factor: Dynamic, x: Dynamic, y: Dynamic| -> HostResult<bool> {
            let intent = Intent::Scale {
                id: layer_id(&id),
                scale: num(&factor)?,
                position: Coordinate::new(num(&x)?, num(&y)?),
            };
            Ok(dispatch(&c, intent))
        },
    );

    let c = ctx.clone();
    engine.register_fn(
        "rasterize",
        move |id: ImmutableString, name: ImmutableString, w: Dynamic, h: Dynamic, x: Dynamic, y: Dynamic| -> HostResult<bool> {
            let intent = Intent::Rasterize {
                id: layer_id(&id),
                image: image(&name, &w, &h)?,
                position: Coordinate::new(num(&x)?, num(&y)?),
            };
            Ok(dispatch(&c, intent))
        },
    );

    let c = ctx.clone();
    engine.register_fn("set_image_cache", move |name: ImmutableString, w: Dynamic, h: Dynamic| -> HostResult<bool> {
        Ok(dispatch(&c, Intent::SetImageCache { image: Some(image(&name, &w, &h)?) }))
    });

    let c = ctx.clone();
    engine.register_fn("clear_image_cache", move || -> bool { dispatch(&c, Intent::SetImageCache { image: None }) });

    let c = ctx.clone();
    engine.register_fn("undo", move || -> bool { with_ctx(&c, |c| c.project.undo().is_some()) });

    let c = ctx.clone();
    engine.register_fn("redo", move || -> bool { with_ctx(&c, |c| c.project.redo().is_some()) });

    let c = ctx.clone();
    engine.register_fn("can_undo", move || -> bool { with_ctx(&c, |c| c.project.history.can_undo()) });

    let c = ctx;
    engine.register_fn("can_redo", move || -> bool { with_ctx(&c, |c| c.project.history.can_redo()) });
}

fn register_object_api(engine: &mut Engine, ctx: SharedContext) {
    fn brush(ctx: &SharedContext, id: &ImmutableString, pts: &Array, width: &Dynamic, rgba: Color) -> HostResult<bool> {
        let points = points(pts)?;
        let stroke_width = num(width)?;
        Ok(with_ctx(ctx, |c| {
            let brush_line = BrushLine {
                id: c.project.next_id(),
                points,
                stroke_width,
                color: rgba,
            };
            c.project.dispatch(Intent::AddBrushLine { id: layer_id(id), brush_line }).is_applied()
        }))
    }

    fn rect(ctx: &SharedContext, id: &ImmutableString, xywh: [&Dynamic; 4], rgba: Color) -> HostResult<bool> {
        let [x, y, w, h] = xywh;
        let (x, y, width, height) = (num(x)?, num(y)?, num(w)?, num(h)?);
        Ok(with_ctx(ctx, |c| {
            let rect_shape = RectShape {
                id: c.project.next_id(),
                x,
                y,
                width,
                height,
                color: rgba,
            };
            c.project.dispatch(Intent::AddRectShape { id: layer_id(id), rect_shape }).is_applied()
        }))
    }

    let c = ctx.clone();
    engine.register_fn("add_brush_line", move |id: ImmutableString, pts: Array, width: Dynamic| -> HostResult<bool> {
        brush(&c, &id, &pts, &width, Color::BLACK)
    });

    let c = ctx.clone();
    engine.register_fn(
        "add_brush_line",
        move |id: ImmutableString, pts: Array, width: Dynamic, rgba: Array| -> HostResult<bool> {
            brush(&c, &id, &pts, &width, color(&rgba)?)
        },
    );

    let c = ctx.clone();
    engine.register_fn("add_eraser_line", move |id: ImmutableString, pts: Array, width: Dynamic| -> HostResult<bool> {
        let points = points(&pts)?;
        let stroke_width = num(&width)?;
        Ok(with_ctx(&c, |c| {
            let eraser_line = EraserLine {
                id: c.project.next_id(),
                points,
                stroke_width,
            };
            c.project.dispatch(Intent::AddEraserLine { id: layer_id(&id), eraser_line }).is_applied()
        }))
    });

    let c = ctx.clone();
    engine.register_fn(
        "add_rect",
        move |id: ImmutableString, x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic| -> HostResult<bool> {
            rect(&c, &id, [&x, &y, &w, &h], Color::BLACK)
        },
    );

    let c = ctx.clone();
    engine.register_fn(
        "add_rect",
        move |id: ImmutableString, x: Dynamic, y: Dynamic, w: Dynamic, h: Dynamic, rgba: Array| -> HostResult<bool> {
            rect(&c, &id, [&x, &y, &w, &h], color(&rgba)?)
        },
    );

    let c = ctx.clone();
    engine.register_fn("add_image", move |id: ImmutableString, name: ImmutableString, w: Dynamic, h: Dynamic| -> HostResult<bool> {
        let intent = Intent::AddImage {
            id: layer_id(&id),
            image: image(&name, &w, &h)?,
            position: None,
        };
        Ok(dispatch(&c, intent))
    });

    let c = ctx;
    engine.register_fn(
        "add_image_at",
        move |id: ImmutableString, name: ImmutableString, w: Dynamic, h: Dynamic, x: Dynamic, y: Dynamic| -> HostResult<bool> {
            let intent = Intent::AddImage {
                id: layer_id(&id),
                image: image(&name, &w, &h)?,
                position: Some(Coordinate::new(num(&x)?, num(&y)?)),
            };
            Ok(dispatch(&c, intent))
        },
    );
}

fn register_file_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("recall_layer", move |path: ImmutableString| -> HostResult<String> {
        let data = io::load_layer(Path::new(path.as_str())).map_err(|e| e.to_string())?;
        Ok(with_ctx(&c, |c| {
            if c.project.dispatch(Intent::RecallLayer { data }).is_applied() {
                selected(c)
            } else {
                String::new()
            }
        }))
    });

    let c = ctx.clone();
    engine.register_fn("add_image_file", move |id: ImmutableString, path: ImmutableString| -> HostResult<bool> {
        let image = io::describe_image(Path::new(path.as_str())).map_err(|e| e.to_string())?;
        Ok(dispatch(&c, Intent::AddImage { id: layer_id(&id), image, position: None }))
    });

    let c = ctx;
    engine.register_fn("export_layer", move |id: ImmutableString, path: ImmutableString| -> HostResult<bool> {
        let layer = with_ctx(&c, |c| c.project.document.layer(&layer_id(&id)).cloned());
        match layer {
            Some(layer) => {
                io::save_layer(&layer, Path::new(path.as_str())).map_err(|e| e.to_string())?;
                Ok(true)
            }
            None => Ok(false),
        }
    });
}

fn register_query_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("layer_count", move || -> i64 { with_ctx(&c, |c| c.project.document.layers.len() as i64) });

    let c = ctx.clone();
    engine.register_fn("layer_ids", move || -> Array {
        with_ctx(&c, |c| {
            c.project
                .document
                .layers
                .iter()
                .map(|l| Dynamic::from(l.id.to_string()))
                .collect()
        })
    });

    let c = ctx.clone();
    engine.register_fn("selected_id", move || -> String { with_ctx(&c, |c| selected(c)) });

    let c = ctx;
    engine.register_fn("print_line", move |msg: ImmutableString| {
        with_ctx(&c, |c| c.console_output.push(msg.to_string()));
    });
}

fn selected(c: &ScriptContext) -> String {
    c.project
        .document
        .selected_entity
        .as_ref()
        .map(|s| s.id.to_string())
        .unwrap_or_default()
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run `source` against `project`. Returns the lines printed with
/// `print_line`. Intents applied before a runtime error stay applied.
pub fn run_script(source: &str, project: &mut Project, settings: &Settings) -> Result<Vec<String>, ScriptError> {
    let owned = std::mem::replace(project, Project::new_untitled(0, settings));
    let ctx = Arc::new(Mutex::new(ScriptContext {
        project: owned,
        console_output: Vec::new(),
    }));

    let result = {
        let engine = create_engine(ctx.clone(), settings);
        let mut scope = Scope::new();
        engine
            .compile(source)
            .map_err(|e| ScriptError::at(e.to_string(), e.position()))
            .and_then(|ast| {
                engine
                    .run_ast_with_scope(&mut scope, &ast)
                    .map_err(|e| ScriptError::at(e.to_string(), e.position()))
            })
    };

    let mut lock = ctx.lock().unwrap_or_else(|e| e.into_inner());
    *project = std::mem::replace(&mut lock.project, Project::new_untitled(0, settings));
    let console = std::mem::take(&mut lock.console_output);
    result.map(|()| console)
}
