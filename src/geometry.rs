//! Description of where rays enter and leave the field.
//!
//! A geometry is immutable: it is constructed once, validated eagerly, and
//! then consumed read-only by the ray sampler. Two variants exist:
//!
//! + *parallel*: every ray leaves at the same height it entered, so the ray
//!   bundle is a set of parallel lines rotated rigidly by the projection
//!   angle;
//!
//! + *flexible*: entry and exit heights are independent sequences, so each
//!   ray may tilt relative to the bundle (fan-like detectors).
//!
//! Heights are measured from the rotation centre, in pixel units. Rays whose
//! height exceeds the inscribed disk radius `N/2 - 1` never intersect the
//! disk and contribute nothing; that is a normal zero case, not an error.

use itertools::Itertools;

use crate::error::{Error, Result};
use crate::types::{Coord, Weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Parallel,
    Flexible,
}

/// Entry/exit heights and weight of a single ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySpec {
    pub y_in: Coord,
    pub y_out: Coord,
    pub weight: Weight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    n: usize,
    in_heights: Vec<Coord>,
    out_heights: Vec<Coord>,
    weights: Vec<Weight>,
    kind: Kind,
}

impl Geometry {
    /// Parallel geometry with explicit ray heights and unit weights.
    pub fn parallel(n: usize, heights: impl Into<Vec<Coord>>) -> Result<Self> {
        let heights = heights.into();
        let weights = vec![1.0; heights.len()];
        Self::parallel_weighted(n, heights, weights)
    }

    /// Parallel geometry with explicit per-ray weights.
    pub fn parallel_weighted(
        n: usize,
        heights: impl Into<Vec<Coord>>,
        weights: impl Into<Vec<Weight>>,
    ) -> Result<Self> {
        let heights = heights.into();
        let weights = weights.into();
        validate(n, &heights, &heights, &weights)?;
        Ok(Geometry {
            n,
            out_heights: heights.clone(),
            in_heights: heights,
            weights,
            kind: Kind::Parallel,
        })
    }

    /// Flexible geometry: independent entry and exit heights, unit weights.
    pub fn flexible(
        n: usize,
        in_heights: impl Into<Vec<Coord>>,
        out_heights: impl Into<Vec<Coord>>,
    ) -> Result<Self> {
        let in_heights = in_heights.into();
        let weights = vec![1.0; in_heights.len()];
        Self::flexible_weighted(n, in_heights, out_heights, weights)
    }

    /// Flexible geometry with explicit per-ray weights.
    pub fn flexible_weighted(
        n: usize,
        in_heights: impl Into<Vec<Coord>>,
        out_heights: impl Into<Vec<Coord>>,
        weights: impl Into<Vec<Weight>>,
    ) -> Result<Self> {
        let in_heights = in_heights.into();
        let out_heights = out_heights.into();
        let weights = weights.into();
        validate(n, &in_heights, &out_heights, &weights)?;
        Ok(Geometry { n, in_heights, out_heights, weights, kind: Kind::Flexible })
    }

    /// The default detector: one ray per integer height spanning
    /// `-(N-1)/2 ..= (N-1)/2` (integer division), i.e. N-1 rays for even N.
    pub fn default_parallel(n: usize) -> Result<Self> {
        let half = (n as i64 - 1) / 2;
        let heights = (-half..=half).map(|h| h as Coord).collect_vec();
        Self::parallel(n, heights)
    }

    /// Field size along each of the first two axes.
    pub fn n(&self) -> usize { self.n }

    /// Number of rays per projection angle; the first sinogram axis length.
    pub fn num_rays(&self) -> usize { self.in_heights.len() }

    /// Radius of the inscribed disk to which sampling is restricted.
    pub fn radius(&self) -> Coord { (self.n / 2) as Coord - 1.0 }

    /// Rotation centre along both axes, in cell-corner coordinates.
    pub fn center(&self) -> Coord { (self.n / 2) as Coord + 0.5 }

    pub fn ray(&self, r: usize) -> RaySpec {
        RaySpec {
            y_in: self.in_heights[r],
            y_out: self.out_heights[r],
            weight: self.weights[r],
        }
    }

    pub fn rays(&self) -> impl Iterator<Item = RaySpec> + '_ {
        (0..self.num_rays()).map(|r| self.ray(r))
    }

    pub fn is_parallel(&self) -> bool { self.kind == Kind::Parallel }
}

fn validate(n: usize, in_heights: &[Coord], out_heights: &[Coord], weights: &[Weight])
    -> Result<()>
{
    if n < 2 {
        return Err(Error::InvalidGeometry(format!("field size {n} is too small")));
    }
    if in_heights.is_empty() {
        return Err(Error::InvalidGeometry("no ray heights given".into()));
    }
    if in_heights.len() != out_heights.len() {
        return Err(Error::InvalidGeometry(format!(
            "{} entry heights but {} exit heights",
            in_heights.len(), out_heights.len())));
    }
    if weights.len() != in_heights.len() {
        return Err(Error::InvalidGeometry(format!(
            "{} rays but {} weights", in_heights.len(), weights.len())));
    }
    for h in in_heights.iter().chain(out_heights) {
        if !h.is_finite() {
            return Err(Error::InvalidGeometry(format!("non-finite ray height {h}")));
        }
    }
    Ok(())
}
