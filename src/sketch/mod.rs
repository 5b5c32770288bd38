//! 2D profiles drawn by the user, and the planar regions they bound.

use crate::float_types::Real;
use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon as GeoPolygon};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};

pub mod capture;
pub mod extrude;
pub mod sanitize;
pub mod shapes;

/// A 2D coordinate in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: Real,
    pub y: Real,
}

impl Point {
    pub const fn new(x: Real, y: Real) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> Real {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[Real; 2]> for Point {
    fn from([x, y]: [Real; 2]) -> Self {
        Point { x, y }
    }
}

impl From<Point> for Coord<Real> {
    fn from(p: Point) -> Self {
        Coord { x: p.x, y: p.y }
    }
}

/// A polygon with holes: one closed outer loop and any number of closed
/// hole loops. Loops are implicitly closed; the last point connects back to
/// the first.
///
/// After [`Profile::sanitize`] the outer loop is counter-clockwise, every hole
/// is clockwise, and no two consecutive points are closer than
/// [`EPSILON`](crate::float_types::EPSILON).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub outer: Vec<Point>,
    #[serde(default)]
    pub holes: Vec<Vec<Point>>,
}

impl Profile {
    pub fn new(outer: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        Profile { outer, holes }
    }

    /// Profile from plain `[x, y]` arrays.
    pub fn from_coords(outer: &[[Real; 2]], holes: &[&[[Real; 2]]]) -> Self {
        Profile {
            outer: outer.iter().copied().map(Point::from).collect(),
            holes: holes
                .iter()
                .map(|hole| hole.iter().copied().map(Point::from).collect())
                .collect(),
        }
    }
}

/// Shoelace signed area of a closed loop: positive when counter-clockwise.
pub fn signed_area(points: &[Point]) -> Real {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: Real = (0..n)
        .map(|i| {
            let p = points[i];
            let q = points[(i + 1) % n];
            p.x * q.y - q.x * p.y
        })
        .sum();
    twice * 0.5
}

pub(crate) fn to_line_string(points: &[Point]) -> LineString<Real> {
    LineString::new(points.iter().copied().map(Coord::from).collect())
}

/// Run a `geo` boolean operation, turning a panic inside the sweep into `None`.
pub(crate) fn guarded_boolean<F>(op: F) -> Option<MultiPolygon<Real>>
where
    F: FnOnce() -> MultiPolygon<Real>,
{
    catch_unwind(AssertUnwindSafe(op)).ok()
}

/// The planar region a profile encloses: its outer loop minus every hole.
#[derive(Debug, Clone)]
pub struct Sketch {
    pub geometry: MultiPolygon<Real>,
}

impl Sketch {
    /// Builds the region by subtracting each hole from the outer polygon.
    ///
    /// Holes that fail to subtract are skipped with a warning; holes outside
    /// the outer loop simply remove nothing.
    pub fn from_profile(profile: &Profile) -> Self {
        let outer = GeoPolygon::new(to_line_string(&profile.outer), Vec::new());
        let mut region = MultiPolygon::new(vec![outer]);

        for (i, hole) in profile.holes.iter().enumerate() {
            if hole.len() < 3 {
                continue;
            }
            let cutter = MultiPolygon::new(vec![GeoPolygon::new(
                to_line_string(hole),
                Vec::new(),
            )]);
            let next = guarded_boolean(|| region.difference(&cutter));
            match next {
                Some(next) => region = next,
                None => tracing::warn!(hole = i, "hole subtraction failed, hole ignored"),
            }
        }

        Sketch { geometry: region }
    }

    /// Area of the region.
    pub fn area(&self) -> Real {
        self.geometry.unsigned_area()
    }

    pub fn is_empty(&self) -> bool {
        self.geometry.0.is_empty()
    }
}
