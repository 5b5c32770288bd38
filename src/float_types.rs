// Re-export parry for the float size
pub use parry3d_f64 as parry3d;

// Our Real scalar type:
pub type Real = f64;

use core::str::FromStr;
use std::sync::OnceLock;

/// Minimum distance between two consecutive retained loop points, in meters.
/// Points closer than this to their predecessor are dropped while sanitizing.
pub const EPSILON: Real = 1e-6;

/// Lazily-initialized tolerance used for plane classification in the BSP.
/// Defaults to `1e-5`, but can be overridden:
///  1) **Build-time**: set env var `PADKERNEL_TOLERANCE` (e.g. `PADKERNEL_TOLERANCE=1e-6 cargo build`)
///  2) **Runtime**: call [`set_tolerance`] once before using the library
static TOLERANCE_CELL: OnceLock<Real> = OnceLock::new();

#[inline]
const fn default_tolerance() -> Real {
    1e-5
}

/// Returns the current plane classification tolerance.
/// If not set yet, it tries `PADKERNEL_TOLERANCE` (parsed as `Real`) and
/// falls back to a sensible default.
pub fn tolerance() -> Real {
    *TOLERANCE_CELL.get_or_init(|| {
        // Compile-time env if provided
        if let Some(environment_variable) = option_env!("PADKERNEL_TOLERANCE") {
            if let Ok(value) = Real::from_str(environment_variable) {
                return value.max(Real::EPSILON);
            }
        }
        default_tolerance()
    })
}

/// Set the tolerance programmatically once (subsequent calls are ignored).
/// Call near program start: `padkernel::float_types::set_tolerance(1e-6);`
pub fn set_tolerance(value: Real) {
    let _ = TOLERANCE_CELL.set(value.max(Real::EPSILON));
}

/// Grid increment used by sketch capture when snapping points, in meters.
pub const SKETCH_GRID: Real = 0.1;

/// Archimedes' constant (π)
pub const PI: Real = core::f64::consts::PI;
