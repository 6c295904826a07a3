use crate::capture::CaptureContext;
use crate::selection::ViewportSelection;

use super::{GeometryError, ImagePoint, RawPoint, Selection};

fn scale_axis(value: f64, scale: f64) -> Result<u32, GeometryError> {
    let mapped = (value * scale).round();
    if !mapped.is_finite() || mapped < 0.0 || mapped > f64::from(u32::MAX) {
        return Err(GeometryError::OutsideViewport { x: value, y: value });
    }
    Ok(mapped as u32)
}

/// Map a viewport point onto the screenshot's pixel grid.
///
/// The screenshot is taken at device resolution while pointer events report
/// CSS pixels, so the two only agree when `devicePixelRatio == 1` and the page
/// is unzoomed. Fails instead of guessing when either size is unknown.
pub fn map_to_image_space(
    point: &RawPoint,
    capture: &CaptureContext,
) -> Result<ImagePoint, GeometryError> {
    let (scale_x, scale_y) = capture.scale()?;

    let outside = || GeometryError::OutsideViewport {
        x: point.viewport_x,
        y: point.viewport_y,
    };
    if point.viewport_x < 0.0 || point.viewport_y < 0.0 {
        return Err(outside());
    }

    Ok(ImagePoint {
        x: scale_axis(point.viewport_x, scale_x).map_err(|_| outside())?,
        y: scale_axis(point.viewport_y, scale_y).map_err(|_| outside())?,
    })
}

/// Map a finalized viewport selection into image space.
///
/// Rounding can collapse a very thin region onto a single row or column; that
/// is reported rather than submitted.
pub fn map_selection(
    selection: &ViewportSelection,
    capture: &CaptureContext,
) -> Result<Selection, GeometryError> {
    match selection {
        ViewportSelection::Point(point) => {
            let ImagePoint { x, y } = map_to_image_space(point, capture)?;
            Ok(Selection::Point { x, y })
        }
        ViewportSelection::Region {
            top_left,
            bottom_right,
        } => {
            let start = map_to_image_space(top_left, capture)?;
            let end = map_to_image_space(bottom_right, capture)?;
            if end.x <= start.x || end.y <= start.y {
                return Err(GeometryError::DegenerateRegion {
                    x0: start.x,
                    y0: start.y,
                    x1: end.x,
                    y1: end.y,
                });
            }
            Ok(Selection::Region {
                x0: start.x,
                y0: start.y,
                x1: end.x,
                y1: end.y,
            })
        }
    }
}
