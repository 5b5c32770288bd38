//! Tagged, versioned wire form of a [`Solid`].
//!
//! ```json
//! {"kind": "faces", "version": 1, "faces": [{"vertices": [[0,0,0], ...], "plane": [0,0,1,0]}]}
//! ```
//!
//! `kind` leaves room for other boundary representations; only the face list
//! exists today. `plane` is optional on input and recomputed when absent.

use crate::errors::KernelError;
use crate::float_types::Real;
use crate::solid::Solid;
use crate::solid::plane::Plane;
use crate::solid::polygon::Polygon;
use crate::solid::vertex::Vertex;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Current version of the face-list encoding.
pub const FACE_LIST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolidRepr {
    Faces { version: u32, faces: Vec<FaceRepr> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRepr {
    pub vertices: Vec<[Real; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane: Option<[Real; 4]>,
}

impl From<Solid> for SolidRepr {
    fn from(solid: Solid) -> Self {
        let faces = solid
            .polygons
            .iter()
            .map(|poly| FaceRepr {
                vertices: poly
                    .vertices
                    .iter()
                    .map(|v| [v.pos.x, v.pos.y, v.pos.z])
                    .collect(),
                plane: Some([
                    poly.plane.normal.x,
                    poly.plane.normal.y,
                    poly.plane.normal.z,
                    poly.plane.w,
                ]),
            })
            .collect();
        SolidRepr::Faces {
            version: FACE_LIST_VERSION,
            faces,
        }
    }
}

impl TryFrom<SolidRepr> for Solid {
    type Error = KernelError;

    fn try_from(repr: SolidRepr) -> Result<Self, Self::Error> {
        match repr {
            SolidRepr::Faces { version, faces } => {
                if version != FACE_LIST_VERSION {
                    return Err(KernelError::InvalidSolid(format!(
                        "unsupported face list version {version}"
                    )));
                }
                let polygons = faces.into_iter().map(face_to_polygon).collect();
                Ok(Solid::from_polygon_vec(polygons))
            },
        }
    }
}

fn face_to_polygon(face: FaceRepr) -> Polygon {
    let mut vertices: Vec<Vertex> = face
        .vertices
        .iter()
        .map(|&[x, y, z]| Vertex::new(Point3::new(x, y, z), Vector3::z()))
        .collect();

    let plane = match face.plane {
        Some([nx, ny, nz, w]) => Plane::from_normal(Vector3::new(nx, ny, nz), w),
        None => Plane::from_vertices(&vertices).unwrap_or_else(Plane::xy),
    };
    for v in &mut vertices {
        v.normal = plane.normal;
    }
    Polygon::with_plane(vertices, plane)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::CSGOps;
    use approx::assert_relative_eq;

    #[test]
    fn solid_survives_json() {
        let cube = Solid::cuboid(1.0, 2.0, 3.0).translate(1.0, 0.0, 0.0);
        let json = serde_json::to_value(&cube).expect("serialize");
        assert_eq!(json["kind"], "faces");
        assert_eq!(json["version"], 1);
        assert_eq!(json["faces"].as_array().map(Vec::len), Some(6));

        let back: Solid = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back.polygons, cube.polygons);
        assert_relative_eq!(back.volume(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_plane_is_recomputed() {
        let json = serde_json::json!({
            "kind": "faces",
            "version": 1,
            "faces": [{"vertices": [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 1.0]]}]
        });
        let solid: Solid = serde_json::from_value(json).expect("deserialize");
        let plane = &solid.polygons[0].plane;
        assert_relative_eq!(plane.normal.z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(plane.w, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn unknown_kind_and_version_are_rejected() {
        let kind = serde_json::json!({"kind": "nurbs", "version": 1, "faces": []});
        assert!(serde_json::from_value::<Solid>(kind).is_err());

        let version = serde_json::json!({"kind": "faces", "version": 7, "faces": []});
        let err = serde_json::from_value::<Solid>(version).expect_err("version 7");
        assert!(err.to_string().contains("unsupported face list version 7"));
    }
}
