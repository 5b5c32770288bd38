//! A small **sketch-to-solid** geometry kernel: closed 2D profiles are
//! sanitized, extruded ("padded") into polygonal solids, combined with
//! Boolean operations (*union*, *subtract*, *intersect*) over [BSP](solid::bsp)
//! trees, and flattened into triangle buffers for rendering.
//!
//! The [`job`] module runs all of that on worker threads behind a
//! request/response protocol with per-job timeouts and cancellation, so an
//! interactive caller never blocks on geometry.
//!
//! ```
//! use padkernel::sketch::{Profile, extrude::pad};
//!
//! let profile = Profile::rectangle(2.0, 3.0);
//! let solid = pad(&profile, 5.0).unwrap();
//! assert!((solid.volume() - 30.0).abs() < 1e-9);
//! let mesh = solid.to_mesh().unwrap();
//! assert_eq!(mesh.validate(), Ok(()));
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod boolean;
pub mod cancel;
pub mod errors;
pub mod float_types;
pub mod job;
pub mod sketch;
pub mod solid;
pub mod tessellate;
pub mod traits;

pub use boolean::{BooleanOp, compose};
pub use errors::KernelError;
pub use sketch::{Point, Profile};
pub use solid::Solid;
pub use tessellate::{Mesh, Tessellation};
pub use traits::CSGOps;
