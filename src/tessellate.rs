//! Mesh emission: flattening a [`Solid`] into render buffers.

use crate::cancel::CancelToken;
use crate::errors::KernelError;
use crate::float_types::Real;
use crate::solid::Solid;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Faces emitted between two cancellation checks.
pub const EMIT_BATCH: usize = 256;

/// Flat triangle buffers.
///
/// `positions` and `normals` hold `x, y, z` triples, one per vertex;
/// `indices` holds vertex index triples, one per triangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub positions: Vec<f32>,
    pub indices: Vec<u32>,
    pub normals: Vec<f32>,
}

/// A broken buffer invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshDefect {
    #[error("positions length {0} is not a multiple of 3")]
    RaggedPositions(usize),
    #[error("indices length {0} is not a multiple of 3")]
    RaggedIndices(usize),
    #[error("{normals} normal components for {positions} position components")]
    NormalCount { positions: usize, normals: usize },
    #[error("index {index} out of range for {vertices} vertices")]
    IndexOutOfRange { index: u32, vertices: usize },
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn validate(&self) -> Result<(), MeshDefect> {
        if self.positions.len() % 3 != 0 {
            return Err(MeshDefect::RaggedPositions(self.positions.len()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(MeshDefect::RaggedIndices(self.indices.len()));
        }
        if self.normals.len() != self.positions.len() {
            return Err(MeshDefect::NormalCount {
                positions: self.positions.len(),
                normals: self.normals.len(),
            });
        }
        let vertices = self.vertex_count();
        match self.indices.iter().find(|&&i| i as usize >= vertices) {
            Some(&index) => Err(MeshDefect::IndexOutOfRange { index, vertices }),
            None => Ok(()),
        }
    }

    fn vertex(&self, i: u32) -> Option<Vector3<Real>> {
        let start = usize::try_from(i).ok()?.checked_mul(3)?;
        match self.positions.get(start..start + 3)? {
            &[x, y, z] => Some(Vector3::new(x as Real, y as Real, z as Real)),
            _ => None,
        }
    }

    /// Enclosed volume by the divergence theorem. Meaningful only for closed,
    /// outward-wound meshes; triangles with an out-of-range index are skipped.
    pub fn volume(&self) -> Real {
        self.indices
            .chunks_exact(3)
            .filter_map(|t| Some((self.vertex(t[0])?, self.vertex(t[1])?, self.vertex(t[2])?)))
            .map(|(a, b, c)| a.dot(&b.cross(&c)) / 6.0)
            .sum()
    }
}

/// Tessellation quality hints: maximum chord deviation (m) and maximum
/// angular deviation (degrees).
///
/// Both are checked but have no effect on polygonal solids, whose faces are
/// emitted exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tessellation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chord: Option<Real>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<Real>,
}

impl Tessellation {
    pub fn validate(&self) -> Result<(), KernelError> {
        for (name, value) in [("chord", self.chord), ("angle", self.angle)] {
            match value {
                Some(value) if !(value.is_finite() && value > 0.0) => {
                    return Err(KernelError::InvalidTessellation { name, value });
                },
                _ => {},
            }
        }
        Ok(())
    }
}

/// Emits every face of `solid` with its own vertices (no welding).
///
/// Faces with fewer than three vertices are skipped. Convex faces are fanned
/// from their first vertex, others ear-clipped. `cancel` is polled once per
/// [`EMIT_BATCH`] faces.
pub fn emit(solid: &Solid, cancel: Option<&CancelToken>) -> Result<Mesh, KernelError> {
    let mut mesh = Mesh::default();

    for (i, poly) in solid.polygons.iter().enumerate() {
        if i % EMIT_BATCH == 0 && cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(KernelError::Cancelled);
        }
        if poly.vertices.len() < 3 {
            continue;
        }

        let normal = poly.plane.normal;
        let normal = if normal.iter().all(|c| c.is_finite()) && normal.norm() > 0.0 {
            normal
        } else {
            Vector3::z()
        };

        let base = u32::try_from(mesh.vertex_count())
            .map_err(|_| KernelError::Kernel("mesh exceeds the u32 index range".into()))?;
        for v in &poly.vertices {
            mesh.positions
                .extend_from_slice(&[v.pos.x as f32, v.pos.y as f32, v.pos.z as f32]);
            mesh.normals
                .extend_from_slice(&[normal.x as f32, normal.y as f32, normal.z as f32]);
        }
        for [a, b, c] in poly.triangulate() {
            mesh.indices
                .extend_from_slice(&[base + a as u32, base + b as u32, base + c as u32]);
        }
    }

    tracing::trace!(
        faces = solid.polygons.len(),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "emitted mesh"
    );
    Ok(mesh)
}

/// Re-emits an existing solid after checking the requested quality hints.
pub fn refine(
    solid: &Solid,
    tess: &Tessellation,
    cancel: Option<&CancelToken>,
) -> Result<Mesh, KernelError> {
    tess.validate()?;
    emit(solid, cancel)
}

impl Solid {
    /// Triangle buffers for this solid.
    pub fn to_mesh(&self) -> Result<Mesh, KernelError> {
        emit(self, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solid::polygon::Polygon;
    use crate::solid::vertex::Vertex;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn cube_buffers() {
        let mesh = Solid::cuboid(1.0, 2.0, 3.0).to_mesh().expect("emit");
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.validate(), Ok(()));
        assert_relative_eq!(mesh.volume(), 6.0, epsilon = 1e-5);
    }

    #[test]
    fn concave_face_is_ear_clipped() {
        let l = [[0., 0.], [2., 0.], [2., 1.], [1., 1.], [1., 2.], [0., 2.]];
        let vertices = l
            .iter()
            .map(|&[x, y]| Vertex::new(Point3::new(x, y, 0.0), Vector3::z()))
            .collect();
        let solid = Solid::from_polygons(&[Polygon::new(vertices)]);
        let mesh = emit(&solid, None).expect("emit");
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 4);
        assert_eq!(mesh.validate(), Ok(()));
    }

    #[test]
    fn degenerate_faces_are_skipped() {
        let sliver = Polygon::new(vec![
            Vertex::new(Point3::origin(), Vector3::z()),
            Vertex::new(Point3::new(1.0, 0.0, 0.0), Vector3::z()),
        ]);
        let solid = Solid::from_polygons(&[sliver]);
        assert!(emit(&solid, None).expect("emit").is_empty());
    }

    #[test]
    fn cancelled_token_stops_emission() {
        let token = CancelToken::new();
        token.cancel();
        let solid = Solid::cuboid(1.0, 1.0, 1.0);
        assert!(matches!(emit(&solid, Some(&token)), Err(KernelError::Cancelled)));
    }

    #[test]
    fn tessellation_hints_are_checked() {
        assert!(Tessellation::default().validate().is_ok());
        let ok = Tessellation { chord: Some(0.01), angle: Some(5.0) };
        assert!(ok.validate().is_ok());
        let bad = Tessellation { chord: Some(-1.0), angle: None };
        assert!(matches!(
            bad.validate(),
            Err(KernelError::InvalidTessellation { name: "chord", .. })
        ));
        let nan = Tessellation { chord: None, angle: Some(Real::NAN) };
        assert!(refine(&Solid::cuboid(1.0, 1.0, 1.0), &nan, None).is_err());
    }

    #[test]
    fn broken_buffers_are_reported() {
        let mesh = Mesh {
            positions: vec![0.0; 9],
            indices: vec![0, 1, 3],
            normals: vec![0.0; 9],
        };
        assert_eq!(
            mesh.validate(),
            Err(MeshDefect::IndexOutOfRange { index: 3, vertices: 3 })
        );
    }

    #[test]
    fn volume_skips_out_of_range_triangles() {
        let mut mesh = Solid::cuboid(1.0, 1.0, 1.0).to_mesh().expect("emit");
        mesh.indices.extend_from_slice(&[0, 1, u32::MAX]);
        assert!(mesh.validate().is_err());
        assert_relative_eq!(mesh.volume(), 1.0, epsilon = 1e-6);
    }
}
