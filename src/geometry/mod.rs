//! Viewport and image coordinate types.

pub mod mapper;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mapper::{map_selection, map_to_image_space};

/// A pointer position captured at event time.
///
/// `viewport_*` are CSS pixels relative to the visible viewport, `page_*`
/// additionally include the document scroll offset. Only the viewport pair is
/// meaningful against a screenshot of the visible area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoint {
    pub viewport_x: f64,
    pub viewport_y: f64,
    pub page_x: f64,
    pub page_y: f64,
}

impl RawPoint {
    /// Point on an unscrolled page, where page and viewport coordinates agree.
    pub fn new(viewport_x: f64, viewport_y: f64) -> Self {
        Self {
            viewport_x,
            viewport_y,
            page_x: viewport_x,
            page_y: viewport_y,
        }
    }

    pub fn with_scroll(self, scroll_x: f64, scroll_y: f64) -> Self {
        Self {
            page_x: self.viewport_x + scroll_x,
            page_y: self.viewport_y + scroll_y,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePoint {
    pub x: u32,
    pub y: u32,
}

/// A finalized selection in image-space pixels.
///
/// `Region` always satisfies `x1 > x0 && y1 > y0`; the only constructor that
/// produces one is [`map_selection`], which checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Selection {
    Point { x: u32, y: u32 },
    Region { x0: u32, y0: u32, x1: u32, y1: u32 },
}

impl Selection {
    /// `[x, y]` as the backend expects it for a point selection.
    pub fn click(&self) -> Option<[u32; 2]> {
        match *self {
            Selection::Point { x, y } => Some([x, y]),
            Selection::Region { .. } => None,
        }
    }

    /// `[x0, y0, x1, y1]` as the backend expects it for a region selection.
    pub fn region(&self) -> Option<[u32; 4]> {
        match *self {
            Selection::Point { .. } => None,
            Selection::Region { x0, y0, x1, y1 } => Some([x0, y0, x1, y1]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("viewport has zero size ({width}x{height})")]
    ZeroViewport { width: u32, height: u32 },

    #[error("screenshot dimensions are unknown; image has not been decoded")]
    ImageNotDecoded,

    #[error("point ({x}, {y}) lies outside the viewport")]
    OutsideViewport { x: f64, y: f64 },

    #[error("region collapses after mapping: ({x0}, {y0}) -> ({x1}, {y1})")]
    DegenerateRegion { x0: u32, y0: u32, x1: u32, y1: u32 },
}
