//! Raster track surface.

use crate::error::TrackError;
use crate::math::{raster_cell, Point2d};
use crate::util::Interval;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The number of samples in a 3x3 neighbourhood which must be road-like
/// for the centre point to count as road.
const MAJORITY: usize = 5;

/// Colour thresholds for classifying a raster sample as road.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadPalette {
    /// The maximum difference between adjacent channels of a gray sample.
    pub gray_tolerance: u8,
    /// The permitted mean brightness of a gray sample.
    pub brightness: Interval<f64>,
    /// Blue samples must have a blue channel strictly above this.
    pub blue_min: u8,
    /// Blue samples must have a red channel strictly below this.
    pub blue_max_red: u8,
    /// Blue samples must have a green channel strictly below this.
    pub blue_max_green: u8,
}

impl Default for RoadPalette {
    fn default() -> Self {
        Self {
            gray_tolerance: 18,
            brightness: Interval::new(45.0, 185.0),
            blue_min: 150,
            blue_max_red: 140,
            blue_max_green: 175,
        }
    }
}

impl RoadPalette {
    /// Whether a single sample is road-like: asphalt gray, a blue centre line,
    /// or the pure white of the start line.
    pub fn is_road_like(&self, [r, g, b]: [u8; 3]) -> bool {
        if [r, g, b] == [255; 3] {
            return true;
        }
        let mean = (r as f64 + g as f64 + b as f64) / 3.0;
        let gray = r.abs_diff(g) <= self.gray_tolerance
            && g.abs_diff(b) <= self.gray_tolerance
            && self.brightness.contains(mean);
        let blue = b > self.blue_min && r < self.blue_max_red && g < self.blue_max_green;
        gray || blue
    }
}

/// The drivable surface of a track, classified from a colour raster.
///
/// Each sample is classified once on construction; queries then take a majority
/// vote over the 3x3 neighbourhood, which smooths out anti-aliased edges.
#[derive(Clone, Debug)]
pub struct TrackSurface {
    width: u32,
    height: u32,
    road: Vec<bool>,
}

impl TrackSurface {
    /// Creates a track surface from a tightly packed RGB8 buffer.
    pub fn from_rgb(
        width: u32,
        height: u32,
        rgb: &[u8],
        palette: &RoadPalette,
    ) -> Result<Self, TrackError> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(TrackError::Malformed {
                expected,
                actual: rgb.len(),
            });
        }
        Self::from_fn(width, height, palette, |x, y| {
            let idx = 3 * (y as usize * width as usize + x as usize);
            [rgb[idx], rgb[idx + 1], rgb[idx + 2]]
        })
    }

    /// Creates a track surface by sampling the colour of every raster cell.
    pub fn from_fn(
        width: u32,
        height: u32,
        palette: &RoadPalette,
        mut sample: impl FnMut(u32, u32) -> [u8; 3],
    ) -> Result<Self, TrackError> {
        if width < 3 || height < 3 {
            return Err(TrackError::TooSmall { width, height });
        }
        let road = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| palette.is_road_like(sample(x, y)))
            .collect();
        Ok(Self {
            width,
            height,
            road,
        })
    }

    /// Loads a track from an image file.
    pub fn open(path: impl AsRef<Path>, palette: &RoadPalette) -> Result<Self, TrackError> {
        let image = image::open(path)?.to_rgb8();
        let (width, height) = image.dimensions();
        let track = Self::from_rgb(width, height, image.as_raw(), palette)?;
        log::info!("Loaded {}x{} track", width, height);
        Ok(track)
    }

    /// The width of the raster.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The height of the raster.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The centre point of the raster.
    pub fn centre(&self) -> Point2d {
        Point2d::new((self.width / 2) as f64, (self.height / 2) as f64)
    }

    /// Whether the raster cell at `(x, y)` is drivable.
    ///
    /// Cells on the outermost ring of the raster are never road, so callers can
    /// march outward without bounds checks.
    pub fn is_road(&self, x: i64, y: i64) -> bool {
        let (w, h) = (self.width as i64, self.height as i64);
        if x < 1 || y < 1 || x >= w - 1 || y >= h - 1 {
            return false;
        }
        let votes = (-1..=1)
            .flat_map(|dy| (-1..=1).map(move |dx| (x + dx, y + dy)))
            .filter(|&(x, y)| self.road[(y * w + x) as usize])
            .count();
        votes >= MAJORITY
    }

    /// Whether the raster cell containing `point` is drivable.
    pub fn is_road_at(&self, point: Point2d) -> bool {
        let (x, y) = raster_cell(point);
        self.is_road(x, y)
    }
}
