//! OCR capability seam and the OCR-result document model.
//!
//! The document mirrors the block-based response schema of the OCR service
//! (`Blocks[]` with `BlockType`, `Id`, `Text`, `Confidence`,
//! `Geometry.BoundingBox` and `Relationships`). Keys this crate does not use
//! are kept in `extra` maps so a persisted document round-trips unchanged.

mod command;

pub use command::CommandProvider;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::OcrError;

/// Trait for OCR capabilities.
///
/// One call recognizes one page image; failures are reported as
/// [`OcrError`] and never panic.
pub trait OcrProvider: Send + Sync {
    /// Recognize the text in an encoded image.
    fn analyze(&self, image: &[u8]) -> Result<OcrDocument, OcrError>;
}

impl<T: OcrProvider + ?Sized> OcrProvider for Box<T> {
    fn analyze(&self, image: &[u8]) -> Result<OcrDocument, OcrError> {
        (**self).analyze(image)
    }
}

/// An OCR-result document: typed blocks keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OcrDocument {
    /// Recognized blocks in service order.
    #[serde(default)]
    pub blocks: Vec<Block>,

    /// Response fields not interpreted here (metadata, model version...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kind of a recognized block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockType {
    Page,
    Line,
    Word,
    /// Any other kind reported by the service, kept verbatim.
    Other(String),
}

impl From<String> for BlockType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PAGE" => Self::Page,
            "LINE" => Self::Line,
            "WORD" => Self::Word,
            _ => Self::Other(value),
        }
    }
}

impl From<BlockType> for String {
    fn from(value: BlockType) -> Self {
        match value {
            BlockType::Page => "PAGE".to_string(),
            BlockType::Line => "LINE".to_string(),
            BlockType::Word => "WORD".to_string(),
            BlockType::Other(kind) => kind,
        }
    }
}

/// A single recognized block (page, line or word).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    /// Block kind.
    pub block_type: BlockType,

    /// Identifier, unique within the document.
    pub id: String,

    /// Recognized text (lines and words only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Recognition confidence (0 - 100).
    #[serde(default)]
    pub confidence: f64,

    /// Location on the page.
    #[serde(default)]
    pub geometry: Geometry,

    /// Links to other blocks (a line's words).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    /// Ids of the child blocks, in stored order.
    pub fn child_ids(&self) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(|r| r.kind.is_empty() || r.kind == "CHILD")
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }

    /// Text of the block, empty when the service sent none.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Normalized bounding box.
    pub fn bbox(&self) -> &BoundingBox {
        &self.geometry.bounding_box
    }
}

/// Block geometry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geometry {
    /// Axis-aligned box.
    #[serde(default)]
    pub bounding_box: BoundingBox,

    /// Polygon and other shape data.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Bounding box normalized to the page size, origin top-left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a box from its normalized left, top, width and height.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Normalized x coordinate of the right edge.
    pub fn right(&self) -> f64 {
        self.left + self.width
    }
}

/// Relationship from one block to others.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    /// Relationship kind (`CHILD` for a line's words).
    #[serde(rename = "Type", default)]
    pub kind: String,

    /// Related block ids.
    #[serde(default)]
    pub ids: Vec<String>,
}

impl OcrDocument {
    /// Load a document from a JSON file.
    pub fn from_path(path: &Path) -> crate::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Serialize as indented JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the document as indented JSON.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// LINE blocks in document order.
    pub fn lines(&self) -> impl Iterator<Item = &Block> {
        self.blocks
            .iter()
            .filter(|b| b.block_type == BlockType::Line)
    }

    /// Index of every block by id.
    pub fn index(&self) -> HashMap<&str, &Block> {
        self.blocks.iter().map(|b| (b.id.as_str(), b)).collect()
    }

    /// Arithmetic mean of the LINE confidences, 0 when there are no lines.
    pub fn mean_line_confidence(&self) -> f64 {
        let (sum, count) = self
            .lines()
            .fold((0.0, 0usize), |(sum, count), b| (sum + b.confidence, count + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }

    /// Plain-text transcript, one line per LINE block.
    pub fn transcript(&self) -> String {
        self.lines()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Builders for OCR documents used across the crate's tests.

    use super::*;

    pub fn word(id: &str, text: &str, confidence: f64, bbox: BoundingBox) -> Block {
        Block {
            block_type: BlockType::Word,
            id: id.to_string(),
            text: Some(text.to_string()),
            confidence,
            geometry: Geometry {
                bounding_box: bbox,
                extra: Map::new(),
            },
            relationships: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn line(id: &str, text: &str, confidence: f64, bbox: BoundingBox, words: &[&str]) -> Block {
        Block {
            block_type: BlockType::Line,
            relationships: vec![Relationship {
                kind: "CHILD".to_string(),
                ids: words.iter().map(|w| w.to_string()).collect(),
            }],
            ..word(id, text, confidence, bbox)
        }
    }

    /// A document with one line of two words.
    pub fn single_line(text: &str, confidence: f64) -> OcrDocument {
        let mut words = text.split(' ');
        let first = words.next().unwrap_or("");
        let second = words.next().unwrap_or("");
        OcrDocument {
            blocks: vec![
                line(
                    "l1",
                    text,
                    confidence,
                    BoundingBox::new(0.125, 0.125, 0.5, 0.125),
                    &["w1", "w2"],
                ),
                word("w1", first, confidence, BoundingBox::new(0.125, 0.125, 0.25, 0.125)),
                word("w2", second, confidence, BoundingBox::new(0.5, 0.125, 0.125, 0.125)),
            ],
            extra: Map::new(),
        }
    }
}
