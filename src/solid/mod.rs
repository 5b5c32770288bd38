//! `Solid` struct and implementations of the `CSGOps` trait for `Solid`

use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::{Aabb, BoundingVolume};
use crate::solid::bsp::Node;
use crate::solid::plane::Plane;
use crate::solid::polygon::Polygon;
use crate::solid::vertex::Vertex;
use crate::traits::CSGOps;
use nalgebra::{Matrix4, Point3, Vector3};
use std::sync::OnceLock;

pub mod bsp;
pub mod plane;
pub mod polygon;
pub mod vertex;
pub mod wire;

/// A closed volume bounded by planar polygonal faces with outward normals.
///
/// Solids are values: every operation returns a new `Solid`.
#[derive(Clone, Debug, Default)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(into = "wire::SolidRepr", try_from = "wire::SolidRepr")]
pub struct Solid {
    /// Boundary faces
    pub polygons: Vec<Polygon>,

    /// Lazily calculated AABB that spans `polygons`.
    bounding_box: OnceLock<Option<Aabb>>,
}

/// Why a solid cannot take part in a boolean operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolidDefect {
    #[error("it has no faces")]
    Empty,
    #[error("face {0} has a NaN or infinite vertex")]
    NonFinite(usize),
    #[error("its boundary is open (net face area {0:.3e})")]
    Open(Real),
    #[error("it encloses no volume (signed volume {0:.3e})")]
    NoVolume(Real),
}

impl Solid {
    /// Build a Solid from an existing polygon list
    pub fn from_polygons(polygons: &[Polygon]) -> Self {
        Self::from_polygon_vec(polygons.to_vec())
    }

    pub(crate) fn from_polygon_vec(polygons: Vec<Polygon>) -> Self {
        Solid {
            polygons,
            bounding_box: OnceLock::new(),
        }
    }

    /// Axis-aligned box spanning `[0, width] × [0, depth] × [0, height]`.
    pub fn cuboid(width: Real, depth: Real, height: Real) -> Self {
        let p = |x: Real, y: Real, z: Real| Point3::new(x * width, y * depth, z * height);
        // Each face listed counter-clockwise seen from outside
        let faces: [([Point3<Real>; 4], Vector3<Real>); 6] = [
            ([p(0., 0., 0.), p(0., 1., 0.), p(1., 1., 0.), p(1., 0., 0.)], -Vector3::z()),
            ([p(0., 0., 1.), p(1., 0., 1.), p(1., 1., 1.), p(0., 1., 1.)], Vector3::z()),
            ([p(0., 0., 0.), p(1., 0., 0.), p(1., 0., 1.), p(0., 0., 1.)], -Vector3::y()),
            ([p(0., 1., 0.), p(0., 1., 1.), p(1., 1., 1.), p(1., 1., 0.)], Vector3::y()),
            ([p(0., 0., 0.), p(0., 0., 1.), p(0., 1., 1.), p(0., 1., 0.)], -Vector3::x()),
            ([p(1., 0., 0.), p(1., 1., 0.), p(1., 1., 1.), p(1., 0., 1.)], Vector3::x()),
        ];
        let polygons = faces
            .iter()
            .map(|(corners, normal)| {
                let vertices = corners.iter().map(|&c| Vertex::new(c, *normal)).collect();
                Polygon::new(vertices)
            })
            .collect();
        Self::from_polygon_vec(polygons)
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Enclosed volume by the divergence theorem, summing signed tetrahedra
    /// against the origin. Positive when normals point outward.
    pub fn volume(&self) -> Real {
        self.polygons
            .iter()
            .flat_map(|poly| {
                poly.triangulate().into_iter().map(move |[a, b, c]| {
                    let p0 = poly.vertices[a].pos.coords;
                    let p1 = poly.vertices[b].pos.coords;
                    let p2 = poly.vertices[c].pos.coords;
                    p0.dot(&p1.cross(&p2)) / 6.0
                })
            })
            .sum()
    }

    /// Total boundary area.
    pub fn surface_area(&self) -> Real {
        self.polygons.iter().map(Polygon::area).sum()
    }

    /// Checks that the solid can be fed to a boolean operation.
    ///
    /// A closed boundary has oriented face areas that sum to zero. The test
    /// tolerates the T-junctions BSP results carry, which an edge-matching
    /// manifold check would reject.
    pub fn validate(&self) -> Result<(), SolidDefect> {
        if self.polygons.iter().all(|p| p.vertices.len() < 3) {
            return Err(SolidDefect::Empty);
        }
        if let Some(i) = self
            .polygons
            .iter()
            .position(|p| !p.vertices.iter().all(Vertex::is_finite))
        {
            return Err(SolidDefect::NonFinite(i));
        }

        let (net, total) = self.polygons.iter().fold(
            (Vector3::<Real>::zeros(), 0.0 as Real),
            |(net, total), p| {
                let a = p.area_vector();
                (net + a, total + a.norm())
            },
        );
        if net.norm() > 1e-6 * total.max(1.0) {
            return Err(SolidDefect::Open(net.norm()));
        }

        let volume = self.volume();
        if volume <= 1e-9 * total.max(1.0) {
            return Err(SolidDefect::NoVolume(volume));
        }
        Ok(())
    }

    /// Polygons with at least three vertices; the rest bound nothing.
    fn usable_polygons(&self) -> Vec<Polygon> {
        self.polygons
            .iter()
            .filter(|p| p.vertices.len() >= 3)
            .cloned()
            .collect()
    }
}

impl CSGOps for Solid {
    /// Returns a new empty Solid
    fn new() -> Self {
        Solid::default()
    }

    /// Return a new Solid representing union of the two Solids.
    ///
    /// ```text
    /// let c = a.union(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   c   |
    ///     |    +--+----+   =   |       +----+
    ///     +----+--+    |       +----+       |
    ///          |   b   |            |   c   |
    ///          |       |            |       |
    ///          +-------+            +-------+
    /// ```
    fn union(&self, other: &Solid) -> Solid {
        if !overlaps(self, other) {
            let mut polygons = self.usable_polygons();
            polygons.extend(other.usable_polygons());
            return Solid::from_polygon_vec(polygons);
        }

        let mut a = Node::from_polygons(&self.usable_polygons());
        let mut b = Node::from_polygons(&other.usable_polygons());

        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());

        tracing::trace!(nodes = a.node_count(), "union tree");
        Solid::from_polygon_vec(a.all_polygons())
    }

    /// Return a new Solid representing difference of the two Solids.
    ///
    /// ```text
    /// let c = a.difference(b);
    ///     +-------+            +-------+
    ///     |       |            |       |
    ///     |   a   |            |   c   |
    ///     |    +--+----+   =   |    +--+
    ///     +----+--+    |       +----+
    ///          |   b   |
    ///          |       |
    ///          +-------+
    /// ```
    fn difference(&self, other: &Solid) -> Solid {
        if !overlaps(self, other) {
            return Solid::from_polygon_vec(self.usable_polygons());
        }

        let mut a = Node::from_polygons(&self.usable_polygons());
        let mut b = Node::from_polygons(&other.usable_polygons());

        a.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        b.invert();
        b.clip_to(&a);
        b.invert();
        a.build(&b.all_polygons());
        a.invert();

        tracing::trace!(nodes = a.node_count(), "difference tree");
        Solid::from_polygon_vec(a.all_polygons())
    }

    /// Return a new Solid representing intersection of the two Solids.
    ///
    /// ```text
    /// let c = a.intersection(b);
    ///     +-------+
    ///     |       |
    ///     |   a   |
    ///     |    +--+----+   =   +--+
    ///     +----+--+    |       +--+
    ///          |   b   |
    ///          |       |
    ///          +-------+
    /// ```
    fn intersection(&self, other: &Solid) -> Solid {
        if !overlaps(self, other) {
            return Solid::new();
        }

        let mut a = Node::from_polygons(&self.usable_polygons());
        let mut b = Node::from_polygons(&other.usable_polygons());

        a.invert();
        b.clip_to(&a);
        b.invert();
        a.clip_to(&b);
        b.clip_to(&a);
        a.build(&b.all_polygons());
        a.invert();

        tracing::trace!(nodes = a.node_count(), "intersection tree");
        Solid::from_polygon_vec(a.all_polygons())
    }

    /// Apply an arbitrary affine transform (as a 4x4 matrix).
    ///
    /// Planes and vertex normals are recomputed from the moved vertices, and
    /// mirroring transforms reverse the winding so faces keep pointing out.
    fn transform(&self, mat: &Matrix4<Real>) -> Solid {
        let mirrored = mat.fixed_view::<3, 3>(0, 0).clone_owned().determinant() < 0.0;

        let polygons = self
            .polygons
            .iter()
            .map(|poly| {
                let mut vertices: Vec<Vertex> = poly
                    .vertices
                    .iter()
                    .map(|v| Vertex::new(mat.transform_point(&v.pos), v.normal))
                    .collect();
                if mirrored {
                    vertices.reverse();
                }
                let plane = Plane::from_vertices(&vertices).unwrap_or_else(|| poly.plane.clone());
                for v in &mut vertices {
                    v.normal = plane.normal;
                }
                Polygon::with_plane(vertices, plane)
            })
            .collect();

        Solid::from_polygon_vec(polygons)
    }

    /// Returns an [`Aabb`] spanning all `polygons`,
    /// or `None` for a solid without vertices.
    fn bounding_box(&self) -> Option<Aabb> {
        *self.bounding_box.get_or_init(|| {
            let mut corners = self
                .polygons
                .iter()
                .flat_map(|p| p.vertices.iter().map(|v| v.pos));
            let first = corners.next()?;
            let (mins, maxs) = corners
                .fold((first, first), |(lo, hi), p| (lo.inf(&p), hi.sup(&p)));
            Some(Aabb::new(mins, maxs))
        })
    }

    /// Invert this Solid (flip inside vs. outside)
    fn inverse(&self) -> Solid {
        let mut polygons = self.polygons.clone();
        polygons.iter_mut().for_each(Polygon::flip);
        Solid::from_polygon_vec(polygons)
    }
}

/// Whether the bounding boxes of two solids touch at all.
fn overlaps(a: &Solid, b: &Solid) -> bool {
    match (a.bounding_box(), b.bounding_box()) {
        (Some(x), Some(y)) => x.intersects(&y),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cuboid_volume_and_closure() {
        let c = Solid::cuboid(2.0, 3.0, 5.0);
        assert_eq!(c.polygons.len(), 6);
        assert_relative_eq!(c.volume(), 30.0, epsilon = 1e-9);
        assert_relative_eq!(c.surface_area(), 62.0, epsilon = 1e-9);
        assert_eq!(c.validate(), Ok(()));
    }

    #[test]
    fn inverse_is_not_a_valid_operand() {
        let c = Solid::cuboid(1.0, 1.0, 1.0).inverse();
        assert!(matches!(c.validate(), Err(SolidDefect::NoVolume(_))));
    }

    #[test]
    fn open_box_is_rejected() {
        let mut c = Solid::cuboid(1.0, 1.0, 1.0);
        c.polygons.pop();
        assert!(matches!(c.validate(), Err(SolidDefect::Open(_))));
        assert_eq!(Solid::new().validate(), Err(SolidDefect::Empty));
    }

    #[test]
    fn translate_moves_bounds() {
        let c = Solid::cuboid(1.0, 1.0, 1.0).translate(0.5, 0.0, -1.0);
        let bb = c.bounding_box().expect("non-empty");
        assert_relative_eq!(bb.mins.x, 0.5);
        assert_relative_eq!(bb.maxs.z, 0.0);
        assert_relative_eq!(c.volume(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn bounds_overlap_when_touching() {
        let a = Solid::cuboid(1.0, 1.0, 1.0);
        assert!(overlaps(&a, &a.translate(1.0, 0.0, 0.0)));
        assert!(!overlaps(&a, &a.translate(1.5, 0.0, 0.0)));
        assert!(!overlaps(&a, &Solid::new()));
        assert!(Solid::new().bounding_box().is_none());
    }

    #[test]
    fn mirror_keeps_outward_normals() {
        let c = Solid::cuboid(1.0, 2.0, 3.0).scale(-1.0, 1.0, 1.0);
        assert_relative_eq!(c.volume(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn disjoint_union_concatenates() {
        let a = Solid::cuboid(1.0, 1.0, 1.0);
        let b = a.translate(3.0, 0.0, 0.0);
        let u = a.union(&b);
        assert_eq!(u.polygons.len(), 12);
        assert_relative_eq!(u.volume(), 2.0, epsilon = 1e-9);
        assert!(a.intersection(&b).is_empty());
    }

    #[test]
    fn nested_difference_leaves_shell() {
        let outer = Solid::cuboid(4.0, 4.0, 4.0);
        let inner = Solid::cuboid(2.0, 2.0, 2.0).translate(1.0, 1.0, 1.0);
        let shell = outer.difference(&inner);
        assert_relative_eq!(shell.volume(), 56.0, epsilon = 1e-6);
        assert_relative_eq!(outer.intersection(&inner).volume(), 8.0, epsilon = 1e-6);
        assert_relative_eq!(outer.union(&inner).volume(), 64.0, epsilon = 1e-6);
    }
}
