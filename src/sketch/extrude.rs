//! Linear extrusion ("pad") of a planar region along +Z.

use crate::errors::{KernelError, LoopKind};
use crate::float_types::{EPSILON, Real};
use crate::sketch::{Profile, Sketch};
use crate::solid::Solid;
use crate::solid::plane::Plane;
use crate::solid::polygon::Polygon;
use crate::solid::vertex::Vertex;
use geo::orient::Direction;
use geo::{CoordsIter, LineString, Orient, Polygon as GeoPolygon, TriangulateEarcut};
use nalgebra::{Point3, Vector3};

/// Sanitizes `profile` and extrudes the region it bounds by `height`.
///
/// The solid spans `z ∈ [0, height]`. Every face is convex: caps are
/// ear-clipped into triangles and each ring edge becomes one quad wall.
pub fn pad(profile: &Profile, height: Real) -> Result<Solid, KernelError> {
    check_height(height)?;
    let profile = profile.sanitize()?;
    Sketch::from_profile(&profile).extrude(height)
}

fn check_height(height: Real) -> Result<(), KernelError> {
    if height.is_finite() && height > 0.0 {
        Ok(())
    } else {
        Err(KernelError::InvalidHeight(height))
    }
}

impl Sketch {
    /// Sweeps the region along +Z by `height`.
    pub fn extrude(&self, height: Real) -> Result<Solid, KernelError> {
        check_height(height)?;
        if self.is_empty() || self.area() < EPSILON * EPSILON {
            return Err(KernelError::DegenerateLoop {
                kind: LoopKind::Outer,
                points: self.geometry.exterior_coords_iter().count(),
            });
        }

        let mut polygons = Vec::new();
        for poly in self.geometry.iter() {
            // Exterior counter-clockwise, interiors clockwise
            let poly = poly.orient(Direction::Default);
            push_caps(&poly, height, &mut polygons);
            push_walls(poly.exterior(), height, &mut polygons);
            for ring in poly.interiors() {
                push_walls(ring, height, &mut polygons);
            }
        }

        tracing::trace!(faces = polygons.len(), height, "extruded region");
        Ok(Solid::from_polygon_vec(polygons))
    }
}

/// One quad per ring edge. With the ring wound so the material lies on its
/// left, `[p0, q0, q1, p1]` faces away from the material.
fn push_walls(ring: &LineString<Real>, height: Real, out: &mut Vec<Polygon>) {
    for line in ring.lines() {
        let d = line.delta();
        if d.x.hypot(d.y) < EPSILON {
            continue;
        }
        let (p, q) = (line.start, line.end);
        let mut vertices = vec![
            Vertex::new(Point3::new(p.x, p.y, 0.0), Vector3::z()),
            Vertex::new(Point3::new(q.x, q.y, 0.0), Vector3::z()),
            Vertex::new(Point3::new(q.x, q.y, height), Vector3::z()),
            Vertex::new(Point3::new(p.x, p.y, height), Vector3::z()),
        ];
        let Some(plane) = Plane::from_vertices(&vertices) else {
            continue;
        };
        for v in &mut vertices {
            v.normal = plane.normal;
        }
        out.push(Polygon::with_plane(vertices, plane));
    }
}

/// Ear-clips the region once and emits each triangle twice: at `z = height`
/// facing up and at `z = 0` facing down.
fn push_caps(poly: &GeoPolygon<Real>, height: Real, out: &mut Vec<Polygon>) {
    let raw = poly.earcut_triangles_raw();
    let at = |i: usize| (raw.vertices[2 * i], raw.vertices[2 * i + 1]);

    let top = Plane::from_normal(Vector3::z(), height);
    let bottom = Plane::from_normal(-Vector3::z(), 0.0);

    for tri in raw.triangle_indices.chunks_exact(3) {
        let (a, b, c) = (at(tri[0]), at(tri[1]), at(tri[2]));
        let cross = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
        if cross.abs() < EPSILON * EPSILON {
            continue;
        }
        let (a, c) = if cross < 0.0 { (c, a) } else { (a, c) };

        let lift = |(x, y): (Real, Real), z: Real, n: Vector3<Real>| {
            Vertex::new(Point3::new(x, y, z), n)
        };
        out.push(Polygon::with_plane(
            vec![
                lift(a, height, top.normal),
                lift(b, height, top.normal),
                lift(c, height, top.normal),
            ],
            top.clone(),
        ));
        out.push(Polygon::with_plane(
            vec![
                lift(c, 0.0, bottom.normal),
                lift(b, 0.0, bottom.normal),
                lift(a, 0.0, bottom.normal),
            ],
            bottom.clone(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rectangle(w: Real, d: Real) -> Profile {
        Profile::from_coords(&[[0.0, 0.0], [w, 0.0], [w, d], [0.0, d]], &[])
    }

    #[test]
    fn pad_rectangle_volume() {
        let solid = pad(&rectangle(2.0, 3.0), 5.0).expect("pad");
        assert_relative_eq!(solid.volume(), 30.0, epsilon = 1e-9);
        assert_eq!(solid.validate(), Ok(()));
        // 4 walls, 2 triangles per cap
        assert_eq!(solid.polygons.len(), 8);
    }

    #[test]
    fn pad_with_hole_adds_inner_walls() {
        let profile = Profile::from_coords(
            &[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 2.0]],
            &[&[[0.5, 0.5], [1.5, 0.5], [1.5, 1.5], [0.5, 1.5]]],
        );
        let solid = pad(&profile, 2.0).expect("pad");
        assert_relative_eq!(solid.volume(), 6.0, epsilon = 1e-9);
        assert_eq!(solid.validate(), Ok(()));

        // Inner walls face the hole centre
        let inner_walls = solid
            .polygons
            .iter()
            .filter(|p| p.plane.normal.z.abs() < 1e-9)
            .filter(|p| {
                p.vertices.iter().all(|v| {
                    (0.25..1.75).contains(&v.pos.x) && (0.25..1.75).contains(&v.pos.y)
                })
            })
            .count();
        assert_eq!(inner_walls, 4);
    }

    #[test]
    fn clockwise_input_pads_the_same() {
        let cw = Profile::from_coords(&[[0.0, 0.0], [0.0, 3.0], [2.0, 3.0], [2.0, 0.0]], &[]);
        assert_relative_eq!(pad(&cw, 5.0).expect("pad").volume(), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn bad_heights_are_rejected() {
        for h in [0.0, -1.0, Real::NAN, Real::INFINITY] {
            assert!(matches!(
                pad(&rectangle(1.0, 1.0), h),
                Err(KernelError::InvalidHeight(_))
            ));
        }
    }
}
