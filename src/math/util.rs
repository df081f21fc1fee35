use super::{Point2d, Vector2d};
use cgmath::prelude::*;

/// Gets the unit vector pointing along the given heading.
///
/// Headings are measured in radians from the positive x-axis. The track raster
/// has its y-axis pointing down, so positive headings turn clockwise on screen.
pub fn heading_vector(heading: f64) -> Vector2d {
    let (sin, cos) = heading.sin_cos();
    Vector2d::new(cos, sin)
}

/// Gets the point `dist` units from `origin` along `heading`.
pub fn advance(origin: Point2d, heading: f64, dist: f64) -> Point2d {
    origin + dist * heading_vector(heading)
}

/// Truncates a point to the integer raster cell containing it.
pub fn raster_cell(point: Point2d) -> (i64, i64) {
    (point.x as i64, point.y as i64)
}

/// Determines whether two circles overlap, using squared distances.
///
/// # Parameters
/// * `a`, `b` - The circle centres
/// * `radius` - The combined radius of the two circles
pub fn within(a: Point2d, b: Point2d, radius: f64) -> bool {
    a.distance2(b) <= radius * radius
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn heading_points_down_the_raster() {
        let p = advance(Point2d::new(10.0, 10.0), FRAC_PI_2, 5.0);
        assert_approx_eq!(p.x, 10.0);
        assert_approx_eq!(p.y, 15.0);
    }

    #[test]
    fn raster_cell_truncates() {
        assert_eq!(raster_cell(Point2d::new(3.9, 7.1)), (3, 7));
        assert_eq!(raster_cell(Point2d::new(-0.5, 0.5)), (0, 0));
    }

    #[test]
    fn within_is_inclusive() {
        let a = Point2d::new(0.0, 0.0);
        assert!(within(a, Point2d::new(3.0, 4.0), 5.0));
        assert!(!within(a, Point2d::new(3.0, 4.1), 5.0));
    }
}
