//! Planar polygonal faces of a [`Solid`](crate::solid::Solid).

use crate::float_types::{Real, tolerance};
use crate::solid::plane::Plane;
use crate::solid::vertex::Vertex;
use geo::{Coord, LineString, Polygon as GeoPolygon, TriangulateEarcut};
use nalgebra::Vector3;

/// A planar face: an ordered loop of vertices (counter-clockwise seen from
/// the front of `plane`) plus the plane it lies in.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Vertex>,
    pub plane: Plane,
}

impl Polygon {
    /// Create a polygon, computing its plane from the vertices.
    /// Degenerate loops get the `z = 0` plane.
    pub fn new(vertices: Vec<Vertex>) -> Self {
        let plane = Plane::from_vertices(&vertices).unwrap_or_else(Plane::xy);
        Polygon { vertices, plane }
    }

    /// Create a polygon that reuses an already known plane.
    pub const fn with_plane(vertices: Vec<Vertex>, plane: Plane) -> Self {
        Polygon { vertices, plane }
    }

    /// Reverse winding order, flip vertex normals and the plane.
    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.vertices.iter_mut().for_each(Vertex::flip);
        self.plane.flip();
    }

    /// Area of the polygon, from the magnitude of its Newell normal.
    pub fn area(&self) -> Real {
        self.area_vector().norm()
    }

    /// `area * unit normal`, following the vertex winding.
    pub fn area_vector(&self) -> Vector3<Real> {
        let n = self.vertices.len();
        if n < 3 {
            return Vector3::zeros();
        }
        let origin = self.vertices[0].pos;
        (1..n - 1).fold(Vector3::zeros(), |acc, i| {
            let a = self.vertices[i].pos - origin;
            let b = self.vertices[i + 1].pos - origin;
            acc + a.cross(&b) * 0.5
        })
    }

    /// True when the loop turns the same way as the plane normal at every corner.
    pub fn is_convex(&self) -> bool {
        let n = self.vertices.len();
        if n <= 3 {
            return true;
        }
        let normal = self.plane.normal;
        let eps = tolerance() * tolerance();
        (0..n).all(|i| {
            let a = &self.vertices[i].pos;
            let b = &self.vertices[(i + 1) % n].pos;
            let c = &self.vertices[(i + 2) % n].pos;
            (b - a).cross(&(c - b)).dot(&normal) >= -eps
        })
    }

    /// Triangles covering the polygon, as indices into `self.vertices`,
    /// wound the same way as the polygon.
    ///
    /// Convex polygons are fanned from the first vertex. Anything else is
    /// projected onto its plane and ear-clipped.
    pub fn triangulate(&self) -> Vec<[usize; 3]> {
        let n = self.vertices.len();
        if n < 3 {
            return Vec::new();
        }
        if self.is_convex() {
            return (1..n - 1).map(|i| [0, i, i + 1]).collect();
        }

        let normal = self.plane.normal;
        let (u, v) = build_orthonormal_basis(normal);
        let origin = self.vertices[0].pos;
        let coords: Vec<Coord<Real>> = self
            .vertices
            .iter()
            .map(|vertex| {
                let offset = vertex.pos - origin;
                Coord {
                    x: offset.dot(&u),
                    y: offset.dot(&v),
                }
            })
            .collect();

        let triangulation =
            GeoPolygon::new(LineString::new(coords), Vec::new()).earcut_triangles_raw();

        triangulation
            .triangle_indices
            .chunks_exact(3)
            // the closing coordinate geo appends is the first vertex again
            .map(|tri| [tri[0] % n, tri[1] % n, tri[2] % n])
            .filter(|tri| tri[0] != tri[1] && tri[1] != tri[2] && tri[0] != tri[2])
            .map(|[a, b, c]| {
                let pa = self.vertices[a].pos;
                let pb = self.vertices[b].pos;
                let pc = self.vertices[c].pos;
                if (pb - pa).cross(&(pc - pa)).dot(&normal) < 0.0 {
                    [a, c, b]
                } else {
                    [a, b, c]
                }
            })
            .collect()
    }
}

/// Two unit vectors `(u, v)` spanning the plane orthogonal to `n`, with
/// `u × v` pointing along `n`.
pub fn build_orthonormal_basis(n: Vector3<Real>) -> (Vector3<Real>, Vector3<Real>) {
    let n = n.normalize();
    // Pick the axis least aligned with n to avoid a degenerate cross product
    let other = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let v = n.cross(&other).normalize();
    let u = v.cross(&n).normalize();
    (u, v)
}
