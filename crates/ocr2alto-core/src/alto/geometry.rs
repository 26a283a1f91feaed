//! Conversion from normalized OCR geometry to ALTO pixel coordinates.
//!
//! Every coordinate is scaled in `f64` and rounded up, so a box never
//! shrinks below the ink it covers.

use crate::ocr::BoundingBox;

/// Pixel dimensions of a page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

impl PageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn scale_x(&self, value: f64) -> i64 {
        (value * f64::from(self.width)).ceil() as i64
    }

    fn scale_y(&self, value: f64) -> i64 {
        (value * f64::from(self.height)).ceil() as i64
    }
}

/// A box in pixel space, named after the ALTO attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub hpos: i64,
    pub vpos: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelBox {
    /// Scale a normalized box to the page.
    pub fn from_normalized(bbox: &BoundingBox, size: PageSize) -> Self {
        Self {
            hpos: size.scale_x(bbox.left),
            vpos: size.scale_y(bbox.top),
            width: size.scale_x(bbox.width),
            height: size.scale_y(bbox.height),
        }
    }

    /// The whole page.
    pub fn page(size: PageSize) -> Self {
        Self {
            hpos: 0,
            vpos: 0,
            width: i64::from(size.width),
            height: i64::from(size.height),
        }
    }
}

/// Gap between two words on the same line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Space {
    pub hpos: i64,
    pub vpos: i64,
    pub width: i64,
}

impl Space {
    /// The space starting at the right edge of `left` and ending at the left
    /// edge of `right`. Overlapping words give a zero width.
    pub fn between(left: &BoundingBox, right: &BoundingBox, size: PageSize) -> Self {
        Self {
            hpos: size.scale_x(left.right()),
            vpos: size.scale_y(left.top),
            width: size.scale_x(right.left - left.right()).max(0),
        }
    }
}

/// Word confidence as written to `WC`: the 0 - 100 score mapped to 0 - 1
/// and rounded to two decimals.
pub fn word_confidence(confidence: f64) -> f64 {
    let ratio = confidence / 100.0;
    (ratio * 100.0).round() / 100.0
}

/// Decimal text of a confidence, always with a fractional part
/// (`1.0`, `0.87`).
pub fn format_confidence(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || !value.is_finite() {
        text
    } else {
        format!("{}.0", text)
    }
}
