//! Oriented planes and polygon classification / splitting against them.

use crate::float_types::{Real, tolerance};
use crate::solid::polygon::Polygon;
use crate::solid::vertex::Vertex;
use nalgebra::{Point3, Vector3};

// Classification bits, combined with `|` over a polygon's vertices
pub const COPLANAR: i8 = 0;
pub const FRONT: i8 = 1;
pub const BACK: i8 = 2;
pub const SPANNING: i8 = 3;

/// A plane in Hessian normal form: every point `p` on it satisfies `normal · p = w`.
/// `normal` points to the FRONT half-space, which for a solid's face is outside.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub normal: Vector3<Real>,
    pub w: Real,
}

/// Result of [`Plane::split_polygon`]: `(coplanar_front, coplanar_back, front, back)`.
pub type SplitResult = (Vec<Polygon>, Vec<Polygon>, Vec<Polygon>, Vec<Polygon>);

impl Plane {
    /// Create a plane from a (not necessarily unit) normal and offset.
    /// `w` is rescaled along with the normal.
    pub fn from_normal(normal: Vector3<Real>, w: Real) -> Self {
        let len = normal.norm();
        if len > 0.0 && len.is_finite() {
            Plane {
                normal: normal / len,
                w: w / len,
            }
        } else {
            Plane::xy()
        }
    }

    /// The `z = 0` plane facing +Z.
    pub fn xy() -> Self {
        Plane {
            normal: Vector3::z(),
            w: 0.0,
        }
    }

    /// Plane through a polygon's vertices.
    ///
    /// The normal comes from Newell's method, so it follows the winding of the
    /// whole loop rather than of its first three vertices, and stays stable
    /// for nearly collinear leading points. Returns `None` when the vertices
    /// enclose no area.
    pub fn from_vertices(vertices: &[Vertex]) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        let normal = vertices
            .iter()
            .zip(vertices.iter().cycle().skip(1))
            .fold(Vector3::zeros(), |acc: Vector3<Real>, (curr, next)| {
                acc + Vector3::new(
                    (curr.pos.y - next.pos.y) * (curr.pos.z + next.pos.z),
                    (curr.pos.z - next.pos.z) * (curr.pos.x + next.pos.x),
                    (curr.pos.x - next.pos.x) * (curr.pos.y + next.pos.y),
                )
            });
        let len = normal.norm();
        if !len.is_finite() || len <= Real::EPSILON {
            return None;
        }
        let normal = normal / len;

        let centroid = vertices
            .iter()
            .fold(Vector3::zeros(), |acc, v| acc + v.pos.coords)
            / vertices.len() as Real;
        Some(Plane {
            normal,
            w: normal.dot(&centroid),
        })
    }

    /// Flip the plane (reverse normal and distance)
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Signed distance of `point` from the plane, positive in front.
    #[inline]
    pub fn signed_distance(&self, point: &Point3<Real>) -> Real {
        self.normal.dot(&point.coords) - self.w
    }

    /// Classify a point as FRONT, BACK or COPLANAR within [`tolerance`].
    pub fn orient_point(&self, point: &Point3<Real>) -> i8 {
        let t = self.signed_distance(point);
        let eps = tolerance();
        if t < -eps {
            BACK
        } else if t > eps {
            FRONT
        } else {
            COPLANAR
        }
    }

    /// Bitmask of the classifications of every vertex of `polygon`.
    pub fn classify_polygon(&self, polygon: &Polygon) -> i8 {
        polygon
            .vertices
            .iter()
            .fold(COPLANAR, |acc, v| acc | self.orient_point(&v.pos))
    }

    /// Splits `polygon` by this plane into four buckets:
    /// `(coplanar_front, coplanar_back, front, back)`.
    ///
    /// Coplanar polygons go to the front bucket when they face the same way as
    /// the plane. Spanning polygons are cut along the plane; both halves keep
    /// the original polygon's plane, and pieces with fewer than three vertices
    /// are discarded.
    pub fn split_polygon(&self, polygon: &Polygon) -> SplitResult {
        let mut coplanar_front = Vec::new();
        let mut coplanar_back = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();

        let types: Vec<i8> = polygon
            .vertices
            .iter()
            .map(|v| self.orient_point(&v.pos))
            .collect();
        let polygon_type = types.iter().fold(COPLANAR, |acc, &t| acc | t);

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            },
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                let n = polygon.vertices.len();
                let mut split_front = Vec::with_capacity(n + 1);
                let mut split_back = Vec::with_capacity(n + 1);

                for i in 0..n {
                    let j = (i + 1) % n;
                    let type_i = types[i];
                    let type_j = types[j];
                    let vertex_i = &polygon.vertices[i];
                    let vertex_j = &polygon.vertices[j];

                    if type_i != BACK {
                        split_front.push(vertex_i.clone());
                    }
                    if type_i != FRONT {
                        split_back.push(vertex_i.clone());
                    }

                    if (type_i | type_j) == SPANNING {
                        let denom = self.normal.dot(&(vertex_j.pos - vertex_i.pos));
                        if denom.abs() > Real::EPSILON {
                            let t = (self.w - self.normal.dot(&vertex_i.pos.coords)) / denom;
                            let vertex_new = vertex_i.interpolate(vertex_j, t);
                            split_front.push(vertex_new.clone());
                            split_back.push(vertex_new);
                        }
                    }
                }

                if split_front.len() >= 3 {
                    front.push(Polygon::with_plane(split_front, polygon.plane.clone()));
                }
                if split_back.len() >= 3 {
                    back.push(Polygon::with_plane(split_back, polygon.plane.clone()));
                }
            },
        }

        (coplanar_front, coplanar_back, front, back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_at(z: Real) -> Polygon {
        Polygon::new(
            [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
                .iter()
                .map(|&[x, y]| Vertex::new(Point3::new(x, y, z), Vector3::z()))
                .collect(),
        )
    }

    #[test]
    fn newell_normal_follows_winding() {
        let ccw = square_at(0.0);
        assert!((ccw.plane.normal - Vector3::z()).norm() < 1e-12);
        let mut cw = ccw.clone();
        cw.flip();
        assert!((cw.plane.normal + Vector3::z()).norm() < 1e-12);
    }

    #[test]
    fn split_spanning_square() {
        let plane = Plane::from_normal(Vector3::x(), 0.5);
        let (cf, cb, f, b) = plane.split_polygon(&square_at(0.0));
        assert!(cf.is_empty() && cb.is_empty());
        assert_eq!(f.len(), 1);
        assert_eq!(b.len(), 1);
        assert!((f[0].area() - 0.5).abs() < 1e-12);
        assert!((b[0].area() - 0.5).abs() < 1e-12);
        assert!(f[0].vertices.iter().all(|v| v.pos.x >= 0.5 - 1e-12));
    }

    #[test]
    fn coplanar_goes_by_facing() {
        let plane = Plane::xy();
        let (cf, cb, _, _) = plane.split_polygon(&square_at(0.0));
        assert_eq!(cf.len(), 1);
        assert!(cb.is_empty());

        let mut flipped = plane.clone();
        flipped.flip();
        let (cf, cb, _, _) = flipped.split_polygon(&square_at(0.0));
        assert!(cf.is_empty());
        assert_eq!(cb.len(), 1);
    }

    #[test]
    fn degenerate_vertices_have_no_plane() {
        let line: Vec<Vertex> = (0..3)
            .map(|i| Vertex::new(Point3::new(i as Real, 0.0, 0.0), Vector3::z()))
            .collect();
        assert!(Plane::from_vertices(&line).is_none());
    }
}
