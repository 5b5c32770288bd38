//! Collecting user-drawn points into a [`Profile`].
//!
//! Capture snaps every point to a square grid before it is stored. The kernel
//! stages downstream never snap; they only check loop validity.

use crate::float_types::{Real, SKETCH_GRID};
use crate::sketch::{Point, Profile};

/// Accumulates the outer loop first, then any number of holes.
#[derive(Debug, Clone)]
pub struct SketchCapture {
    grid: Real,
    outer: Vec<Point>,
    holes: Vec<Vec<Point>>,
}

impl Default for SketchCapture {
    fn default() -> Self {
        Self::with_grid(SKETCH_GRID)
    }
}

impl SketchCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture snapping to multiples of `grid`. Zero, negative or non-finite
    /// spacings disable snapping.
    pub fn with_grid(grid: Real) -> Self {
        SketchCapture {
            grid: if grid.is_finite() && grid > 0.0 { grid } else { 0.0 },
            outer: Vec::new(),
            holes: Vec::new(),
        }
    }

    pub fn grid(&self) -> Real {
        self.grid
    }

    fn snap(&self, p: Point) -> Point {
        if self.grid == 0.0 {
            return p;
        }
        Point::new(
            (p.x / self.grid).round() * self.grid,
            (p.y / self.grid).round() * self.grid,
        )
    }

    fn current(&mut self) -> &mut Vec<Point> {
        match self.holes.last_mut() {
            Some(hole) => hole,
            None => &mut self.outer,
        }
    }

    /// Appends a point to the loop being drawn. Returns the stored (snapped)
    /// point, or `None` when it repeats the previous one and was ignored.
    pub fn push_point(&mut self, x: Real, y: Real) -> Option<Point> {
        let p = self.snap(Point::new(x, y));
        let current = self.current();
        if current.last() == Some(&p) {
            return None;
        }
        current.push(p);
        Some(p)
    }

    /// Ends the current loop and starts a new hole.
    pub fn begin_hole(&mut self) {
        self.holes.push(Vec::new());
    }

    /// Removes the last point, stepping back out of an empty hole first.
    pub fn undo(&mut self) -> Option<Point> {
        if self.holes.last().is_some_and(Vec::is_empty) {
            self.holes.pop();
        }
        self.current().pop()
    }

    /// Number of points captured so far across all loops.
    pub fn len(&self) -> usize {
        self.outer.len() + self.holes.iter().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finishes capture. Empty hole loops are discarded; no other validation
    /// happens here.
    pub fn close(self) -> Profile {
        let holes = self.holes.into_iter().filter(|h| !h.is_empty()).collect();
        Profile::new(self.outer, holes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn points_snap_to_grid() {
        let mut cap = SketchCapture::new();
        let p = cap.push_point(0.04, 1.26).expect("stored");
        assert_relative_eq!(p.x, 0.0);
        assert_relative_eq!(p.y, 1.3, epsilon = 1e-12);
    }

    #[test]
    fn repeated_snapped_point_is_ignored() {
        let mut cap = SketchCapture::new();
        assert!(cap.push_point(1.0, 1.0).is_some());
        assert!(cap.push_point(1.01, 0.99).is_none());
        assert_eq!(cap.len(), 1);
    }

    #[test]
    fn zero_grid_keeps_raw_points() {
        let mut cap = SketchCapture::with_grid(0.0);
        let p = cap.push_point(0.123, 0.456).expect("stored");
        assert_eq!(p, Point::new(0.123, 0.456));
    }

    #[test]
    fn unusable_spacing_disables_snapping() {
        assert_eq!(SketchCapture::new().grid(), SKETCH_GRID);
        for spacing in [-0.5, Real::NAN, Real::INFINITY] {
            assert_eq!(SketchCapture::with_grid(spacing).grid(), 0.0);
        }
    }

    #[test]
    fn holes_and_undo() {
        let mut cap = SketchCapture::new();
        for (x, y) in [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)] {
            cap.push_point(x, y);
        }
        cap.begin_hole();
        cap.push_point(0.5, 0.5);
        cap.push_point(1.5, 0.5);
        cap.push_point(1.5, 1.5);
        cap.push_point(9.0, 9.0);
        assert_eq!(cap.undo(), Some(Point::new(9.0, 9.0)));

        cap.begin_hole();
        // Undo on an empty hole steps back into the previous loop
        assert_eq!(cap.undo(), Some(Point::new(1.5, 1.5)));
        cap.push_point(1.5, 1.5);

        let profile = cap.close();
        assert_eq!(profile.outer.len(), 4);
        assert_eq!(profile.holes.len(), 1);
        assert_eq!(profile.holes[0].len(), 3);
    }
}
