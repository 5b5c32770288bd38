//! Profile sanitizing: deduplication, winding normalization and the
//! simplicity check of the outer loop.

use crate::errors::{KernelError, LoopKind};
use crate::float_types::{EPSILON, Real};
use crate::sketch::{Point, Profile, guarded_boolean, signed_area, to_line_string};
use geo::line_intersection::{LineIntersection, line_intersection};
use geo::{Area, BooleanOps, Coord, Line, MultiPolygon, Polygon as GeoPolygon};

/// Loops enclosing less than this area (m²) are treated as degenerate.
const MIN_LOOP_AREA: Real = EPSILON * EPSILON;

impl Profile {
    /// Returns a normalized copy of this profile.
    ///
    /// - consecutive points closer than [`EPSILON`] collapse into the first one,
    ///   including a final point that closes the loop onto its start;
    /// - the outer loop must keep at least 3 points and enclose an area;
    /// - the outer loop is made counter-clockwise, holes clockwise;
    /// - the outer loop must be simple;
    /// - degenerate holes are dropped.
    ///
    /// Hole placement is not validated: a hole outside the outer loop, or
    /// overlapping another hole, passes through unchanged.
    pub fn sanitize(&self) -> Result<Profile, KernelError> {
        check_finite(&self.outer, LoopKind::Outer)?;
        for (i, hole) in self.holes.iter().enumerate() {
            check_finite(hole, LoopKind::Hole(i))?;
        }

        let mut outer = dedup(&self.outer);
        if outer.len() < 3 {
            return Err(KernelError::DegenerateLoop {
                kind: LoopKind::Outer,
                points: outer.len(),
            });
        }

        if is_collinear(&outer) {
            return Err(KernelError::DegenerateLoop {
                kind: LoopKind::Outer,
                points: outer.len(),
            });
        }

        let area = signed_area(&outer);
        if area < 0.0 {
            outer.reverse();
        }
        check_simple(&outer, LoopKind::Outer)?;
        if area.abs() < MIN_LOOP_AREA {
            return Err(KernelError::DegenerateLoop {
                kind: LoopKind::Outer,
                points: outer.len(),
            });
        }

        let holes = self
            .holes
            .iter()
            .enumerate()
            .filter_map(|(i, hole)| {
                let mut hole = dedup(hole);
                let area = signed_area(&hole);
                if hole.len() < 3 || area.abs() < MIN_LOOP_AREA {
                    tracing::debug!(hole = i, points = hole.len(), "dropping degenerate hole");
                    return None;
                }
                if area > 0.0 {
                    hole.reverse();
                }
                Some(hole)
            })
            .collect();

        Ok(Profile { outer, holes })
    }
}

/// Free-function form of [`Profile::sanitize`].
pub fn sanitize(profile: &Profile) -> Result<Profile, KernelError> {
    profile.sanitize()
}

fn check_finite(points: &[Point], kind: LoopKind) -> Result<(), KernelError> {
    match points.iter().position(|p| !p.is_finite()) {
        Some(index) => Err(KernelError::InvalidCoordinate { kind, index }),
        None => Ok(()),
    }
}

/// Drops every point within [`EPSILON`] of the previously retained one.
fn dedup(points: &[Point]) -> Vec<Point> {
    let mut kept: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        match kept.last() {
            Some(last) if last.distance(p) < EPSILON => {},
            _ => kept.push(*p),
        }
    }
    while kept.len() > 1 && kept[kept.len() - 1].distance(&kept[0]) < EPSILON {
        kept.pop();
    }
    kept
}

/// Whether every point lies within [`EPSILON`] of the line through the
/// first two.
fn is_collinear(points: &[Point]) -> bool {
    let (Some(a), Some(b)) = (points.first(), points.get(1)) else {
        return true;
    };
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len < EPSILON {
        return true;
    }
    points
        .iter()
        .all(|p| ((p.x - a.x) * dy - (p.y - a.y) * dx).abs() / len < EPSILON)
}

/// Fails when the loop crosses or doubles back on itself.
///
/// Edges that do not share a vertex must not touch, and adjacent edges must
/// not fold back onto each other. As a second opinion the loop is run through
/// the polygon clipper: a simple loop keeps its area, a crossing one does
/// not. A clipper failure leaves the segment scan's verdict standing.
fn check_simple(points: &[Point], kind: LoopKind) -> Result<(), KernelError> {
    let n = points.len();
    let edges: Vec<Line<Real>> = (0..n)
        .map(|i| Line::new(Coord::from(points[i]), Coord::from(points[(i + 1) % n])))
        .collect();

    let crossing = |at: Coord<Real>| KernelError::SelfIntersection {
        kind,
        x: at.x,
        y: at.y,
    };

    for i in 0..n {
        // Adjacent edges: a full reversal at the shared vertex is a zero-width spike
        let a = edges[i];
        let b = edges[(i + 1) % n];
        let da = a.delta();
        let db = b.delta();
        let cross = da.x * db.y - da.y * db.x;
        let dot = da.x * db.x + da.y * db.y;
        if cross.abs() <= EPSILON * (da.x.hypot(da.y) * db.x.hypot(db.y)) && dot < 0.0 {
            return Err(crossing(a.end));
        }

        for j in (i + 2)..n {
            if i == 0 && j == n - 1 {
                continue;
            }
            match line_intersection(edges[i], edges[j]) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    return Err(crossing(intersection));
                },
                Some(LineIntersection::Collinear { intersection }) => {
                    return Err(crossing(intersection.start));
                },
                None => {},
            }
        }
    }

    let polygon = GeoPolygon::new(to_line_string(points), Vec::new());
    let own_area = polygon.unsigned_area();
    let subject = MultiPolygon::new(vec![polygon]);
    let empty = MultiPolygon::<Real>::new(Vec::new());
    match guarded_boolean(|| subject.union(&empty)) {
        Some(resolved) => {
            let diff = (resolved.unsigned_area() - own_area).abs();
            if diff > 1e-9 * own_area.max(1.0) {
                return Err(crossing(points[0].into()));
            }
        },
        None => tracing::debug!(%kind, "polygon clipper failed, relying on segment scan"),
    }
    Ok(())
}
