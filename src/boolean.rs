//! Boolean composition of two solids.

use crate::errors::KernelError;
use crate::solid::Solid;
use crate::traits::CSGOps;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Boolean operator applied to `(a, b)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanOp {
    /// Volume covered by either operand.
    Union,
    /// Volume of `a` with `b` removed. Not commutative.
    Subtract,
    /// Volume covered by both operands.
    Intersect,
}

impl Display for BooleanOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BooleanOp::Union => write!(f, "UNION"),
            BooleanOp::Subtract => write!(f, "SUBTRACT"),
            BooleanOp::Intersect => write!(f, "INTERSECT"),
        }
    }
}

/// Validates both operands, then combines them.
///
/// The result is not repaired; degenerate slivers from coplanar faces pass
/// through to the emitter.
pub fn compose(op: BooleanOp, a: &Solid, b: &Solid) -> Result<Solid, KernelError> {
    for (operand, solid) in [('a', a), ('b', b)] {
        solid
            .validate()
            .map_err(|defect| KernelError::BooleanOperation {
                operand,
                reason: defect.to_string(),
            })?;
    }

    let result = match op {
        BooleanOp::Union => a.union(b),
        BooleanOp::Subtract => a.difference(b),
        BooleanOp::Intersect => a.intersection(b),
    };
    tracing::trace!(%op, faces = result.polygons.len(), "boolean composed");
    Ok(result)
}
