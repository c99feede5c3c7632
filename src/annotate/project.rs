//! Coordinate projection
//!
//! Maps normalized annotation boxes onto target pixel dimensions. No
//! clamping: malformed upstream coordinates project out of canvas and stay
//! visible instead of being silently hidden.

use super::{NormBox, COORD_MAX};

/// Bounding box in target pixel space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Project a normalized box onto the given pixel dimensions.
///
/// Every annotation in one render pass must be projected with the same
/// target dimensions.
pub fn project(bounds: NormBox, target_width: f32, target_height: f32) -> PixelBox {
    PixelBox {
        x1: bounds.x1 / COORD_MAX * target_width,
        y1: bounds.y1 / COORD_MAX * target_height,
        x2: bounds.x2 / COORD_MAX * target_width,
        y2: bounds.y2 / COORD_MAX * target_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_endpoints() {
        let bounds = NormBox { x1: 0.0, y1: 0.0, x2: 999.0, y2: 999.0 };
        let px = project(bounds, 640.0, 480.0);

        assert_eq!(px.x1, 0.0);
        assert_eq!(px.y1, 0.0);
        assert!((px.x2 - 640.0).abs() < 1e-3);
        assert!((px.y2 - 480.0).abs() < 1e-3);
    }

    #[test]
    fn test_projection_linearity() {
        let bounds = NormBox { x1: 100.0, y1: 200.0, x2: 300.0, y2: 400.0 };
        let base = project(bounds, 500.0, 250.0);
        let doubled = project(bounds, 1000.0, 500.0);

        assert!((doubled.x1 - base.x1 * 2.0).abs() < 1e-3);
        assert!((doubled.y1 - base.y1 * 2.0).abs() < 1e-3);
        assert!((doubled.x2 - base.x2 * 2.0).abs() < 1e-3);
        assert!((doubled.y2 - base.y2 * 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_range_coordinates_not_clamped() {
        let bounds = NormBox { x1: -10.0, y1: 0.0, x2: 1200.0, y2: 999.0 };
        let px = project(bounds, 999.0, 999.0);

        assert!(px.x1 < 0.0);
        assert!(px.x2 > 999.0);
    }

    #[test]
    fn test_box_extent() {
        let bounds = NormBox { x1: 0.0, y1: 0.0, x2: 499.5, y2: 999.0 };
        let px = project(bounds, 200.0, 100.0);

        assert!((px.x2 - px.x1 - 100.0).abs() < 0.2);
        assert!((px.y2 - px.y1 - 100.0).abs() < 1e-3);
    }
}
