//! Common 2D profiles

use crate::float_types::{PI, Real};
use crate::sketch::{Point, Profile};

impl Profile {
    /// Creates a rectangle in the XY plane with a corner at the origin.
    ///
    /// # Example
    /// ```
    /// use padkernel::sketch::Profile;
    /// let r = Profile::rectangle(2.0, 3.0);
    /// assert_eq!(r.outer.len(), 4);
    /// ```
    pub fn rectangle(width: Real, depth: Real) -> Self {
        Profile::from_coords(
            &[[0.0, 0.0], [width, 0.0], [width, depth], [0.0, depth]],
            &[],
        )
    }

    /// Creates a square in the XY plane.
    pub fn square(width: Real) -> Self {
        Self::rectangle(width, width)
    }

    /// Regular polygon with `sides` corners on a circle of `radius` around
    /// the origin, the first corner on +X.
    pub fn regular_ngon(sides: usize, radius: Real) -> Self {
        if sides < 3 {
            return Profile::default();
        }
        let outer = (0..sides)
            .map(|i| {
                let theta = 2.0 * PI * (i as Real) / (sides as Real);
                Point::new(radius * theta.cos(), radius * theta.sin())
            })
            .collect();
        Profile::new(outer, Vec::new())
    }

    /// Polygonal approximation of a circle.
    pub fn circle(radius: Real, segments: usize) -> Self {
        Self::regular_ngon(segments, radius)
    }

    /// Profile from an arbitrary outer loop, in the order given.
    pub fn polygon(points: &[[Real; 2]]) -> Self {
        Profile::from_coords(points, &[])
    }

    /// Appends a hole loop.
    pub fn with_hole(mut self, hole: &[[Real; 2]]) -> Self {
        self.holes
            .push(hole.iter().copied().map(Point::from).collect());
        self
    }
}
