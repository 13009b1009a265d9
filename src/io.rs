use std::collections::HashSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::{Document, ImageDescriptor, Layer};

// ============================================================================
// LDOC PROJECT FILE FORMAT
// ============================================================================

/// Magic header for project files
const LDOC_MAGIC: &str = "LDC1";
/// Magic header for single-layer snapshot files
const LAYER_MAGIC: &str = "LDL1";

/// Maximum number of layers accepted from a project file.
const MAX_LAYERS: usize = 256;

#[derive(Serialize, Deserialize)]
struct ProjectFile {
    magic: String,
    document: Document,
}

#[derive(Serialize, Deserialize)]
struct LayerFile {
    magic: String,
    layer: Layer,
}

/// Error type for document file operations
#[derive(Debug)]
pub enum DocError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
    Image(String),
}

impl std::fmt::Display for DocError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocError::Io(e) => write!(f, "I/O error: {}", e),
            DocError::Serialize(e) => write!(f, "Serialization error: {}", e),
            DocError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
            DocError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for DocError {}

impl From<std::io::Error> for DocError {
    fn from(e: std::io::Error) -> Self {
        DocError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for DocError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        DocError::Serialize(e.to_string())
    }
}

impl From<image::ImageError> for DocError {
    fn from(e: image::ImageError) -> Self {
        DocError::Image(e.to_string())
    }
}

/// bincode encodes a String as an 8-byte length prefix + UTF-8 data, so a
/// 4-char magic occupies bytes 8..12.
fn peek_magic(raw: &[u8]) -> Result<&str, DocError> {
    if raw.len() < 12 {
        return Err(DocError::InvalidFormat("File too small".into()));
    }
    Ok(std::str::from_utf8(&raw[8..12]).unwrap_or(""))
}

fn expect_magic(raw: &[u8], expected: &str) -> Result<(), DocError> {
    let magic = peek_magic(raw)?;
    if magic == expected {
        Ok(())
    } else {
        Err(DocError::InvalidFormat(format!("Unknown magic '{}'", magic)))
    }
}

/// Save a document as a `.ldoc` project file. Documents that could not be
/// loaded back are refused before the file is created.
pub fn save_document(doc: &Document, path: &Path) -> Result<(), DocError> {
    validate(doc)?;
    let project = ProjectFile {
        magic: LDOC_MAGIC.to_string(),
        document: doc.clone(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &project)?;
    Ok(())
}

/// Load a `.ldoc` project file, rejecting documents that break layer limits
/// or id uniqueness.
pub fn load_document(path: &Path) -> Result<Document, DocError> {
    let raw = std::fs::read(path)?;
    decode_document(&raw)
}

pub fn decode_document(raw: &[u8]) -> Result<Document, DocError> {
    expect_magic(raw, LDOC_MAGIC)?;
    let project: ProjectFile = bincode::deserialize(raw)?;
    validate(&project.document)?;
    Ok(project.document)
}

/// Layer count within `MAX_LAYERS` and no repeated layer id.
fn validate(doc: &Document) -> Result<(), DocError> {
    if doc.layers.len() > MAX_LAYERS {
        return Err(DocError::InvalidFormat(format!(
            "{} layers exceeds the limit of {}",
            doc.layers.len(),
            MAX_LAYERS
        )));
    }
    let mut seen = HashSet::new();
    for layer in &doc.layers {
        if !seen.insert(&layer.id) {
            return Err(DocError::InvalidFormat(format!("Duplicate layer id '{}'", layer.id)));
        }
    }
    Ok(())
}

// ============================================================================
// LAYER SNAPSHOTS: exported layers that can be recalled later
// ============================================================================

pub fn save_layer(layer: &Layer, path: &Path) -> Result<(), DocError> {
    let file = LayerFile {
        magic: LAYER_MAGIC.to_string(),
        layer: layer.clone(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &file)?;
    Ok(())
}

pub fn load_layer(path: &Path) -> Result<Layer, DocError> {
    let raw = std::fs::read(path)?;
    expect_magic(&raw, LAYER_MAGIC)?;
    let file: LayerFile = bincode::deserialize(&raw)?;
    Ok(file.layer)
}

// ============================================================================
// IMAGE PROBING
// ============================================================================

/// Describe an image file on disk by its file name and pixel dimensions.
/// Only the header is read.
pub fn describe_image(path: &Path) -> Result<ImageDescriptor, DocError> {
    let (width, height) = image::image_dimensions(path)?;
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    Ok(ImageDescriptor::new(name, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Coordinate, DrawableObject, EntityId, RectShape, SelectedEntity, Color};
    use tempfile::TempDir;

    fn sample_document() -> Document {
        let mut layer = Layer::new(EntityId::from("a"));
        layer.position = Coordinate::new(4.0, -2.0);
        layer.objects.push(DrawableObject::RectShape(RectShape {
            id: EntityId::from("r"),
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
            color: Color::rgba(10, 20, 30, 40),
        }));
        Document {
            layers: vec![layer, Layer::new(EntityId::from("b"))],
            image_cache: Some(ImageDescriptor::new("cache.png", 8, 8)),
            selected_entity: Some(SelectedEntity::layer(EntityId::from("a"))),
        }
    }

    #[test]
    fn project_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.ldoc");
        let doc = sample_document();
        save_document(&doc, &path).unwrap();
        assert_eq!(load_document(&path).unwrap(), doc);
    }

    #[test]
    fn layer_snapshot_is_not_a_project() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.ldl");
        let doc = sample_document();
        save_layer(&doc.layers[0], &path).unwrap();
        assert_eq!(load_layer(&path).unwrap(), doc.layers[0]);
        assert!(matches!(load_document(&path), Err(DocError::InvalidFormat(_))));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut doc = sample_document();
        doc.layers[1].id = EntityId::from("a");
        let raw = bincode::serialize(&ProjectFile {
            magic: LDOC_MAGIC.to_string(),
            document: doc,
        })
        .unwrap();
        assert!(matches!(decode_document(&raw), Err(DocError::InvalidFormat(_))));
    }

    #[test]
    fn too_many_layers_are_rejected() {
        let doc = Document {
            layers: (0..=MAX_LAYERS).map(|i| Layer::new(EntityId::new(format!("l{}", i)))).collect(),
            ..Document::default()
        };
        let raw = bincode::serialize(&ProjectFile {
            magic: LDOC_MAGIC.to_string(),
            document: doc,
        })
        .unwrap();
        assert!(matches!(decode_document(&raw), Err(DocError::InvalidFormat(_))));
    }

    #[test]
    fn unloadable_documents_are_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.ldoc");
        let doc = Document {
            layers: (0..=MAX_LAYERS).map(|i| Layer::new(EntityId::new(format!("l{}", i)))).collect(),
            ..Document::default()
        };
        assert!(matches!(save_document(&doc, &path), Err(DocError::InvalidFormat(_))));
        assert!(!path.exists());

        let mut doc = sample_document();
        doc.layers[1].id = EntityId::from("a");
        assert!(matches!(save_document(&doc, &path), Err(DocError::InvalidFormat(_))));
        assert!(!path.exists());
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(matches!(decode_document(b"LDC1"), Err(DocError::InvalidFormat(_))));
    }

    #[test]
    fn describe_image_reads_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.png");
        image::RgbaImage::new(3, 5).save(&path).unwrap();
        let desc = describe_image(&path).unwrap();
        assert_eq!(desc, ImageDescriptor::new("tiny.png", 3, 5));
    }
}
