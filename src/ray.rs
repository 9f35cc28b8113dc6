//! Find the cells crossed by a single ray, and the length of ray in each.
//!
//! The walk is built around two simplifications:
//!
//! 1. Work in a parametrisation where moving distance 1 along the ray costs
//!    exactly 1: per axis, the parameter interval between two consecutive
//!    grid lines is constant (`1 / |direction component|`), so the next
//!    boundary in either axis is found by comparing two running counters.
//!
//! 2. Attribute each inter-boundary segment to the cell containing its
//!    midpoint: the midpoint of a segment that crosses no boundary is
//!    strictly inside one cell, so a plain `floor` yields the index.
//!
//! The segment before the first grid crossing is not deposited (a start
//! lying exactly on a crossing deposits from the start); the final, usually
//! partial, segment up to the exact end point is. These two rules, together
//! with the half-pixel endpoint extension in [`endpoints`], reproduce the
//! expected single-ray integrals: 5.0 for a centred horizontal ray through
//! a 6x6 field of ones, 3.7320508075688767 one pixel off centre, and sqrt(2)
//! for a diagonal ray through a single pixel.

use crate::geometry::{Geometry, RaySpec};
use crate::types::{Angle, Coord};

/// Floating-point subtractions which should give zero usually miss very
/// slightly; anything this close to a grid line is treated as on it.
const EPS: Coord = 1e-9;

/// Start and end of one ray in field coordinates, after rotation.
///
/// The walk starts on the `y_out` side of the field and ends on the `y_in`
/// side. Each endpoint sits at distance `sqrt(r^2 - h^2) + 1/2` from the
/// rotation centre along the unrotated x axis (heights h on the y axis),
/// then rotates by the projection angle; the half pixel beyond the disk
/// chord keeps tangent rays on the grid. `None` when either height misses
/// the inscribed disk: such a ray contributes zero, which is not an error.
pub fn endpoints(geometry: &Geometry, ray: RaySpec, theta: Angle)
    -> Option<([Coord; 2], [Coord; 2])>
{
    let radius = geometry.radius();
    let mid = geometry.center();
    let out_reach = radius * radius - ray.y_out * ray.y_out;
    let in_reach = radius * radius - ray.y_in * ray.y_in;
    if out_reach < 0.0 || in_reach < 0.0 {
        return None;
    }
    let (sin, cos) = theta.sin_cos();
    let rotate = |x: Coord, y: Coord| [mid + cos * x - sin * y, mid + sin * x + cos * y];
    let start = rotate(-(out_reach.sqrt() + 0.5), ray.y_out);
    let end = rotate(in_reach.sqrt() + 0.5, ray.y_in);
    Some((start, end))
}

/// Along-ray distance from `start` to the point where the segment enters
/// the disk of radius `r` about `(mid, mid)`: the first line-circle
/// intersection, or zero when the segment only grazes the disk.
///
/// Attenuation depths are measured from this point, so the half-pixel
/// endpoint extension outside the disk accrues no absorption.
pub fn entry_depth(mid: Coord, r: Coord, start: [Coord; 2], end: [Coord; 2]) -> Coord {
    let delta = [end[0] - start[0], end[1] - start[1]];
    let length = (delta[0] * delta[0] + delta[1] * delta[1]).sqrt();
    if length < EPS {
        return 0.0;
    }
    let dir = [delta[0] / length, delta[1] / length];
    let from_center = [start[0] - mid, start[1] - mid];
    let along = from_center[0] * dir[0] + from_center[1] * dir[1];
    let perp_sq =
        from_center[0] * from_center[0] + from_center[1] * from_center[1] - along * along;
    let disc = r * r - perp_sq;
    if disc <= 0.0 {
        return 0.0;
    }
    (-along - disc.sqrt()).max(0.0)
}

/// Walk the segment from `start` to `end` across the `n` x `n` cell grid.
///
/// `visit` is called once per crossed cell with `(i0, i1, length, midway)`:
/// the cell index, the length of ray inside the cell, and the along-ray
/// distance from `start` to the middle of the segment (callers turn this
/// into an attenuation depth via [`entry_depth`]). Cells outside the grid
/// are skipped. Deposits are emitted
/// in increasing along-ray order, which fixes the summation order of every
/// sinogram element.
#[inline]
pub fn trace(n: usize, start: [Coord; 2], end: [Coord; 2],
             mut visit: impl FnMut(usize, usize, Coord, Coord))
{
    let delta = [end[0] - start[0], end[1] - start[1]];
    let length = (delta[0] * delta[0] + delta[1] * delta[1]).sqrt();
    if length < EPS { return; }
    let dir = [delta[0] / length, delta[1] / length];

    // Per axis: parameter of the next boundary crossing, and parameter cost
    // of crossing one cell. Axes parallel to the ray never cross.
    let mut next_boundary = [Coord::INFINITY; 2];
    let mut cell_size = [Coord::INFINITY; 2];
    for axis in 0..2 {
        let u = dir[axis];
        if u.abs() > EPS {
            cell_size[axis] = 1.0 / u.abs();
            let to_first = if u > 0.0 {
                start[axis].ceil() - start[axis]
            } else {
                start[axis] - start[axis].floor()
            };
            // A start exactly on a grid line counts as already at a crossing
            let to_first = if to_first > 1.0 - EPS { 0.0 } else { to_first };
            next_boundary[axis] = to_first * cell_size[axis];
        }
    }

    // Move to the first crossing without depositing
    let mut here = next_boundary[0].min(next_boundary[1]);
    for axis in 0..2 {
        if next_boundary[axis] <= here + EPS {
            next_boundary[axis] += cell_size[axis];
        }
    }

    while here < length - EPS {
        let boundary_position = next_boundary[0].min(next_boundary[1]).min(length);

        // The weight is the length of ray in this cell
        let weight = boundary_position - here;
        if weight > EPS {
            let midway = 0.5 * (here + boundary_position);
            let i0 = (start[0] + midway * dir[0]).floor();
            let i1 = (start[1] + midway * dir[1]).floor();
            if i0 >= 0.0 && i1 >= 0.0 && (i0 as usize) < n && (i1 as usize) < n {
                visit(i0 as usize, i1 as usize, weight, midway);
            }
        }

        // Advance every axis whose boundary we have just reached (both at a
        // corner crossing)
        for axis in 0..2 {
            if next_boundary[axis] <= boundary_position + EPS {
                next_boundary[axis] += cell_size[axis];
            }
        }
        here = boundary_position;
    }
}
