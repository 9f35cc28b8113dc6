//! Overall structure of forward and backward projections.
//!
//! The driver functions are abstracted over the execution context:
//!
//! + `Cpu` parallelises with rayon: forward over independent sinogram
//!   columns; backward with per-thread private field accumulators combined
//!   by `fold` + `reduce`, so overlapping scatter writes never race.
//!
//! + `DeviceGrid` runs the same per-element arithmetic over a flat global
//!   index space, shaped the way a device kernel launch would be. It exists
//!   to pin down the math a GPU port must reproduce, and is covered by
//!   parity tests against `Cpu`.
//!
//! Both backends share `ray_segments`, `gather_one_ray` and
//! `scatter_one_ray`, so they cannot drift apart numerically.

use ndarray::{s, Array2, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::geometry::{Geometry, RaySpec};
use crate::ray::{endpoints, entry_depth, trace};
use crate::types::{Angle, Coord, Field, Intensity, Sinogram, PI};

/// Which machinery executes the projection loops.
///
/// `Cuda` is declared so that callers can ask for it, but no device code is
/// compiled into this crate: selecting it fails eagerly with
/// [`Error::UnsupportedExecutionContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionContext {
    #[default]
    Cpu,
    DeviceGrid,
    Cuda,
}

impl ExecutionContext {
    fn check_available(self) -> Result<()> {
        match self {
            ExecutionContext::Cpu | ExecutionContext::DeviceGrid => Ok(()),
            ExecutionContext::Cuda => Err(Error::UnsupportedExecutionContext("cuda")),
        }
    }
}

/// Forward and adjoint projection over a chosen execution context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projector {
    context: ExecutionContext,
}

impl Projector {
    pub fn new(context: ExecutionContext) -> Self { Self { context } }

    /// Integrate `field` along every (ray, angle) path: the Radon transform.
    ///
    /// Output shape is (num_rays, num_angles, z). Linear in `field`; each
    /// element is summed in increasing along-ray order, so results are
    /// reproducible run to run.
    pub fn project(
        &self,
        field: ArrayView3<Intensity>,
        angles: &[Angle],
        geometry: &Geometry,
        attenuation: Option<Coord>,
    ) -> Result<Sinogram> {
        self.context.check_available()?;
        check_field_shape(field.dim(), geometry)?;
        let (_, _, nz) = field.dim();
        let num_rays = geometry.num_rays();

        let mut sinogram = Sinogram::zeros((num_rays, angles.len(), nz));
        match self.context {
            ExecutionContext::Cpu => {
                let columns: Vec<Array2<Intensity>> = angles
                    .par_iter()
                    .map(|&theta| project_one_angle(field, theta, geometry, attenuation))
                    .collect();
                for (ia, column) in columns.into_iter().enumerate() {
                    sinogram.slice_mut(s![.., ia, ..]).assign(&column);
                }
            }
            ExecutionContext::DeviceGrid => {
                // One virtual thread per output element
                let mut segments = segment_buffer(geometry.n());
                for global in 0..num_rays * angles.len() * nz {
                    let ir = global % num_rays;
                    let ia = global / num_rays % angles.len();
                    let iz = global / (num_rays * angles.len());
                    let ray = geometry.ray(ir);
                    ray_segments(geometry, ray, angles[ia], &mut segments);
                    sinogram[[ir, ia, iz]] = ray.weight
                        * gather_one_ray(&segments, field.index_axis(Axis(2), iz), attenuation);
                }
            }
            ExecutionContext::Cuda => unreachable!("rejected by check_available"),
        }
        Ok(sinogram)
    }

    /// Distribute `sinogram` back along the same paths: the exact transpose
    /// of [`Projector::project`]. Raw adjoint, no normalisation.
    pub fn backproject(
        &self,
        sinogram: ArrayView3<Intensity>,
        angles: &[Angle],
        geometry: &Geometry,
        attenuation: Option<Coord>,
    ) -> Result<Field> {
        self.context.check_available()?;
        check_sinogram_shape(sinogram.dim(), angles.len(), geometry)?;
        let (_, _, nz) = sinogram.dim();
        let n = geometry.n();

        match self.context {
            ExecutionContext::Cpu => {
                // Per-thread private accumulators, summed once all angles
                // are scattered: no write contention on the field cells.
                let backprojection = (0..angles.len())
                    .into_par_iter()
                    .fold(
                        || Field::zeros((n, n, nz)),
                        |mut acc, ia| {
                            scatter_one_angle(&mut acc, sinogram, ia, angles[ia],
                                              geometry, attenuation);
                            acc
                        },
                    )
                    .reduce(|| Field::zeros((n, n, nz)), |a, b| a + b);
                Ok(backprojection)
            }
            ExecutionContext::DeviceGrid => {
                // Grid order with a single accumulator, the shape an
                // atomic-add device kernel takes.
                let mut backprojection = Field::zeros((n, n, nz));
                for ia in 0..angles.len() {
                    scatter_one_angle(&mut backprojection, sinogram, ia, angles[ia],
                                      geometry, attenuation);
                }
                Ok(backprojection)
            }
            ExecutionContext::Cuda => unreachable!("rejected by check_available"),
        }
    }
}

// ----- Per-element arithmetic, shared by every backend ---------------------------

/// One deposited cell crossing of a ray. `depth` is the along-ray distance
/// from the disk entry point to the middle of the segment.
#[derive(Debug, Clone, Copy)]
struct Segment {
    i0: usize,
    i1: usize,
    length: Coord,
    depth: Coord,
}

type SegmentBuffer = Vec<Segment>;

/// A ray can cross at most one cell per grid line on each axis, plus one.
fn segment_buffer(n: usize) -> SegmentBuffer {
    Vec::with_capacity(2 * n + 2)
}

/// Replace `buffer` with the cells crossed by this ray at this angle. Rays
/// whose heights miss the inscribed disk produce no segments.
fn ray_segments(geometry: &Geometry, ray: RaySpec, theta: Angle, buffer: &mut SegmentBuffer) {
    buffer.clear();
    if let Some((p1, p2)) = endpoints(geometry, ray, theta) {
        let entry = entry_depth(geometry.center(), geometry.radius(), p1, p2);
        trace(geometry.n(), p1, p2, |i0, i1, length, midway| {
            // the half-pixel extension before the disk counts as depth zero
            let depth = (midway - entry).max(0.0);
            buffer.push(Segment { i0, i1, length, depth });
        });
    }
}

#[inline]
fn attenuation_factor(attenuation: Option<Coord>, depth: Coord) -> Coord {
    match attenuation {
        Some(mu) => (-mu * depth).exp(),
        None => 1.0,
    }
}

/// Sum the field along one traced ray for one z slice.
#[inline]
fn gather_one_ray(
    segments: &[Segment],
    slice: ArrayView2<Intensity>,
    attenuation: Option<Coord>,
) -> Intensity {
    let mut projection = 0.0;
    for seg in segments {
        projection += slice[[seg.i0, seg.i1]] * seg.length
                    * attenuation_factor(attenuation, seg.depth);
    }
    projection
}

fn project_one_angle(
    field: ArrayView3<Intensity>,
    theta: Angle,
    geometry: &Geometry,
    attenuation: Option<Coord>,
) -> Array2<Intensity> {
    let nz = field.dim().2;
    let mut column = Array2::zeros((geometry.num_rays(), nz));
    let mut segments = segment_buffer(geometry.n());
    for (ir, ray) in geometry.rays().enumerate() {
        ray_segments(geometry, ray, theta, &mut segments);
        for iz in 0..nz {
            column[[ir, iz]] = ray.weight
                * gather_one_ray(&segments, field.index_axis(Axis(2), iz), attenuation);
        }
    }
    column
}

/// Scatter every ray of one angle into `acc`: same segments, same weights as
/// the forward pass, with gather and scatter swapped.
fn scatter_one_angle(
    acc: &mut Field,
    sinogram: ArrayView3<Intensity>,
    ia: usize,
    theta: Angle,
    geometry: &Geometry,
    attenuation: Option<Coord>,
) {
    let nz = sinogram.dim().2;
    let mut segments = segment_buffer(geometry.n());
    for (ir, ray) in geometry.rays().enumerate() {
        ray_segments(geometry, ray, theta, &mut segments);
        for iz in 0..nz {
            let value = sinogram[[ir, ia, iz]] * ray.weight;
            if value == 0.0 { continue; }
            for seg in &segments {
                acc[[seg.i0, seg.i1, iz]] +=
                    value * seg.length * attenuation_factor(attenuation, seg.depth);
            }
        }
    }
}

// ----- Shape validation ----------------------------------------------------------

fn check_field_shape((n0, n1, _nz): (usize, usize, usize), geometry: &Geometry) -> Result<()> {
    if n0 != n1 || n0 != geometry.n() {
        return Err(Error::ShapeMismatch {
            expected: format!("({n}, {n}, z) field", n = geometry.n()),
            found: format!("({n0}, {n1}, _)"),
        });
    }
    Ok(())
}

fn check_sinogram_shape(
    (rays, angles, _nz): (usize, usize, usize),
    num_angles: usize,
    geometry: &Geometry,
) -> Result<()> {
    if rays != geometry.num_rays() || angles != num_angles {
        return Err(Error::ShapeMismatch {
            expected: format!("({}, {num_angles}, z) sinogram", geometry.num_rays()),
            found: format!("({rays}, {angles}, _)"),
        });
    }
    Ok(())
}

// ----- Caller-facing API ---------------------------------------------------------

/// Radon transform of a volume, on the default (CPU) execution context.
pub fn project(
    field: &Field,
    angles: &[Angle],
    geometry: &Geometry,
    attenuation: Option<Coord>,
) -> Result<Sinogram> {
    Projector::default().project(field.view(), angles, geometry, attenuation)
}

/// Adjoint of [`project`], on the default (CPU) execution context.
pub fn backproject(
    sinogram: &Sinogram,
    angles: &[Angle],
    geometry: &Geometry,
    attenuation: Option<Coord>,
) -> Result<Field> {
    Projector::default().backproject(sinogram.view(), angles, geometry, attenuation)
}

/// 2D images are projected as a z batch of one.
pub fn project_2d(
    image: ArrayView2<Intensity>,
    angles: &[Angle],
    geometry: &Geometry,
    attenuation: Option<Coord>,
) -> Result<Array2<Intensity>> {
    let field = image.insert_axis(Axis(2));
    let sinogram = Projector::default().project(field, angles, geometry, attenuation)?;
    Ok(sinogram.index_axis(Axis(2), 0).to_owned())
}

/// 2D counterpart of [`backproject`].
pub fn backproject_2d(
    sinogram: ArrayView2<Intensity>,
    angles: &[Angle],
    geometry: &Geometry,
    attenuation: Option<Coord>,
) -> Result<Array2<Intensity>> {
    let sinogram = sinogram.insert_axis(Axis(2));
    let field = Projector::default().backproject(sinogram, angles, geometry, attenuation)?;
    Ok(field.index_axis(Axis(2), 0).to_owned())
}

/// `count` angles evenly spaced over the half turn [0, pi).
pub fn uniform_angles(count: usize) -> Vec<Angle> {
    (0..count).map(|i| i as Angle * PI / count as Angle).collect()
}

// ------------------------------ TESTS ------------------------------
#[cfg(test)]
mod test {
    use super::*;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use float_eq::assert_float_eq;
    use ndarray::{arr2, Array3};
    use rstest::rstest;

    fn ones_field(n: usize, nz: usize) -> Field {
        Array3::from_elem((n, n, nz), 1.0)
    }

    // Single-angle sinogram of a 6x6 field of ones: each row is the chord
    // length of its ray through the inscribed disk.
    #[test]
    fn ones_field_single_angle() {
        let g = Geometry::default_parallel(6).unwrap();
        let sino = project(&ones_field(6, 1), &[0.0], &g, None).unwrap();
        let expected = [1.0, 3.7320508075688767, 5.0, 3.7320508075688767, 1.0];
        assert_eq!(sino.dim(), (5, 1, 1));
        for (ir, e) in expected.into_iter().enumerate() {
            assert_float_eq!(sino[[ir, 0, 0]], e, abs <= 1e-12);
        }
    }

    // Same field, detector with every second ray dropped.
    #[test]
    fn sparse_detector_heights() {
        let g = Geometry::parallel(6, vec![-2.0, 0.0, 2.0]).unwrap();
        let sino = project(&ones_field(6, 1), &[0.0], &g, None).unwrap();
        let expected = [1.0, 5.0, 1.0];
        for (ir, e) in expected.into_iter().enumerate() {
            assert_float_eq!(sino[[ir, 0, 0]], e, abs <= 1e-12);
        }
    }

    // Ray weights scale whole sinogram rows, on every backend.
    #[rstest(/**/ context,
             case(ExecutionContext::Cpu),
             case(ExecutionContext::DeviceGrid),
    )]
    fn ray_weights_scale_rows(context: ExecutionContext) {
        let g = Geometry::parallel_weighted(
            6,
            vec![-2.0, -1.0, 0.0, 1.0, 2.0],
            vec![2.0, 1.0, 0.0, 1.0, 2.0],
        ).unwrap();
        let p = Projector::new(context);
        let sino = p.project(ones_field(6, 1).view(), &[0.0], &g, None).unwrap();
        let expected = [2.0, 3.7320508075688767, 0.0, 3.7320508075688767, 2.0];
        for (ir, e) in expected.into_iter().enumerate() {
            assert_float_eq!(sino[[ir, 0, 0]], e, abs <= 1e-12);
        }
    }

    // A unit impulse at the centre pixel of a 4x4 field: 1 head-on, sqrt(2)
    // along the diagonal.
    #[test]
    fn impulse_at_center() {
        let mut image = Array2::zeros((4, 4));
        image[[2, 2]] = 1.0;
        let g = Geometry::default_parallel(4).unwrap();
        let sino = project_2d(image.view(), &[0.0, PI / 4.0, PI / 2.0], &g, None).unwrap();
        assert_eq!(sino.dim(), (3, 3));
        assert_float_eq!(sino[[1, 0]], 1.0, abs <= 1e-12);
        assert_float_eq!(sino[[1, 1]], std::f64::consts::SQRT_2, abs <= 1e-12);
        assert_float_eq!(sino[[1, 2]], 1.0, abs <= 1e-12);
        // off-centre rays never see the impulse
        for ia in 0..3 {
            assert_float_eq!(sino[[0, ia]], 0.0, abs <= 1e-12);
            assert_float_eq!(sino[[2, ia]], 0.0, abs <= 1e-12);
        }
    }

    // Two-ray, two-angle backprojection onto a 6x6 field, checked cell by
    // cell against the per-ray segment lengths.
    #[test]
    fn two_ray_backprojection() {
        let g = Geometry::default_parallel(6).unwrap();
        let mut sino = Array2::zeros((5, 2));
        sino.row_mut(1).fill(1.0);
        sino.row_mut(3).fill(1.0);
        let field = backproject_2d(sino.view(), &[0.0, PI / 2.0], &g, None).unwrap();
        let q = 0.7320508075688767; // partial cell at the far end of each ray
        let expected = arr2(&[
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            [0.0, 0.0, 2.0, 1.0, 2.0, q  ],
            [0.0, 0.0, 1.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 2.0, 1.0, 2.0, q  ],
            [0.0, 0.0, q  , 0.0, q  , 0.0],
        ]);
        for ((i, j), e) in expected.indexed_iter() {
            assert_float_eq!(field[[i, j]], *e, abs <= 1e-12);
        }
    }

    // A two-ray fan converging from entry heights -3 and 3 to a shared exit
    // height 0, backprojected onto a 10x10 field.
    #[test]
    fn flexible_fan_backprojection() {
        let g = Geometry::flexible(10, vec![-3.0, 3.0], vec![0.0, 0.0]).unwrap();
        let sino = Array2::from_elem((2, 1), 1.0);
        let field = backproject_2d(sino.view(), &[0.0], &g, None).unwrap();

        // mirror-symmetric about the rotation centre at 5.5, which pairs
        // column j with column 10 - j and leaves column 0 unmatched
        for i in 0..10 {
            assert_float_eq!(field[[i, 0]], 0.0, abs <= 1e-12);
            for j in 1..10 {
                assert_float_eq!(field[[i, j]], field[[i, 10 - j]], abs <= 1e-12);
            }
        }
        // spot values for one of the rays
        assert_float_eq!(field[[3, 4]], 1.074224357, abs <= 1e-9);
        assert_float_eq!(field[[7, 2]], 0.675193594, abs <= 1e-9);
        assert_float_eq!(field[[8, 2]], 0.693681787, abs <= 1e-9);
        // both rays cross where they converge
        assert_float_eq!(field[[1, 5]], 2.0 * 1.074224357, abs <= 1e-9);
    }

    #[rstest(/**/ context,
             case(ExecutionContext::Cpu),
             case(ExecutionContext::DeviceGrid),
    )]
    fn shape_contract(context: ExecutionContext) {
        let g = Geometry::default_parallel(8).unwrap();
        let angles = uniform_angles(5);
        let p = Projector::new(context);
        let field = ones_field(8, 3);
        let sino = p.project(field.view(), &angles, &g, None).unwrap();
        assert_eq!(sino.dim(), (7, 5, 3));
        let back = p.backproject(sino.view(), &angles, &g, None).unwrap();
        assert_eq!(back.dim(), (8, 8, 3));
    }

    #[test]
    fn wrong_field_shape_is_rejected() {
        let g = Geometry::default_parallel(6).unwrap();
        let field = ones_field(8, 1);
        let err = project(&field, &[0.0], &g, None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn wrong_sinogram_shape_is_rejected() {
        let g = Geometry::default_parallel(6).unwrap();
        let sino = Sinogram::zeros((4, 1, 1)); // should be 5 rays
        let err = backproject(&sino, &[0.0], &g, None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn cuda_context_is_unavailable() {
        let g = Geometry::default_parallel(6).unwrap();
        let p = Projector::new(ExecutionContext::Cuda);
        let err = p.project(ones_field(6, 1).view(), &[0.0], &g, None).unwrap_err();
        assert_eq!(err, Error::UnsupportedExecutionContext("cuda"));
    }

    // z slices are independent: a batched projection equals slice-by-slice
    // projection.
    #[test]
    fn z_is_a_pure_batch_dimension() {
        let g = Geometry::default_parallel(6).unwrap();
        let angles = uniform_angles(3);
        let mut field = ones_field(6, 2);
        field.index_axis_mut(Axis(2), 1).fill(2.5);

        let batched = project(&field, &angles, &g, None).unwrap();
        for iz in 0..2 {
            let single = project_2d(field.index_axis(Axis(2), iz), &angles, &g, None).unwrap();
            for ((ir, ia), v) in single.indexed_iter() {
                assert_float_eq!(batched[[ir, ia, iz]], *v, abs <= 1e-12);
            }
        }
    }
}
