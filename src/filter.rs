//! Frequency filtering of sinogram rows, and filtered backprojection.
//!
//! Each detector row (one angle, one z slice) is Fourier-transformed at its
//! exact length, multiplied by a real frequency response, and transformed
//! back. The default response is the ramp |fftfreq|, which undoes the 1/|f|
//! blur of plain backprojection.

use ndarray::{ArrayView2, Axis};

use crate::error::{Error, Result};
use crate::fft::fft;
use crate::geometry::Geometry;
use crate::projector::Projector;
use crate::types::{Angle, Coord, Field, Intensity, Sinogram};

/// The ramp (Ram-Lak) response over `n` FFT bins: |k|/n with the usual
/// wrap-around for negative frequencies. Bin 0 is zero, so filtering
/// removes the mean of every row.
pub fn ramp_filter(n: usize) -> Vec<Intensity> {
    (0..n).map(|k| k.min(n - k) as Intensity / n as Intensity).collect()
}

/// Filter every detector row of `sinogram` with the given frequency
/// response, or with [`ramp_filter`] when none is given.
pub fn filter_sinogram(
    sinogram: &Sinogram,
    filter: Option<&[Intensity]>,
) -> Result<Sinogram> {
    let (num_rays, _, _) = sinogram.dim();
    let response = match filter {
        Some(response) if response.len() != num_rays => {
            return Err(Error::FilterLengthMismatch {
                expected: num_rays,
                found: response.len(),
            })
        }
        Some(response) => response.to_vec(),
        None => ramp_filter(num_rays),
    };

    let mut filtered = sinogram.clone();
    let mut re = vec![0.0; num_rays];
    let mut im = vec![0.0; num_rays];
    for mut row in filtered.lanes_mut(Axis(0)) {
        for (k, &v) in row.iter().enumerate() {
            re[k] = v;
            im[k] = 0.0;
        }
        fft(&mut re, &mut im, false);
        for k in 0..num_rays {
            re[k] *= response[k];
            im[k] *= response[k];
        }
        fft(&mut re, &mut im, true);
        for (k, v) in row.iter_mut().enumerate() {
            *v = re[k];
        }
    }
    Ok(filtered)
}

/// Ramp-filter (or custom-filter) the sinogram, then backproject it on the
/// default execution context.
pub fn filtered_backproject(
    sinogram: &Sinogram,
    angles: &[Angle],
    geometry: &Geometry,
    attenuation: Option<Coord>,
    filter: Option<&[Intensity]>,
) -> Result<Field> {
    let filtered = filter_sinogram(sinogram, filter)?;
    Projector::default().backproject(filtered.view(), angles, geometry, attenuation)
}

/// 2D counterpart of [`filtered_backproject`]: a z batch of one.
pub fn filtered_backproject_2d(
    sinogram: ArrayView2<Intensity>,
    angles: &[Angle],
    geometry: &Geometry,
    attenuation: Option<Coord>,
    filter: Option<&[Intensity]>,
) -> Result<ndarray::Array2<Intensity>> {
    let sinogram = sinogram.insert_axis(Axis(2)).to_owned();
    let field = filtered_backproject(&sinogram, angles, geometry, attenuation, filter)?;
    Ok(field.index_axis(Axis(2), 0).to_owned())
}

// ------------------------------ TESTS ------------------------------
#[cfg(test)]
mod test {
    use super::*;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};
    use float_eq::assert_float_eq;
    use ndarray::Array2;
    use rstest::rstest;

    use crate::projector::{project_2d, uniform_angles};

    #[rstest(/**/ n,  expected,
             case(4, vec![0.0, 0.25, 0.5, 0.25]),
             case(5, vec![0.0, 0.2, 0.4, 0.4, 0.2]),
             case(8, vec![0.0, 0.125, 0.25, 0.375, 0.5, 0.375, 0.25, 0.125]),
    )]
    fn ramp_bins(n: usize, expected: Vec<f64>) {
        let filter = ramp_filter(n);
        assert_eq!(filter.len(), n);
        for (k, e) in expected.into_iter().enumerate() {
            assert_float_eq!(filter[k], e, abs <= 1e-15);
        }
    }

    #[test]
    fn ramp_removes_constant_rows() {
        let sino = Sinogram::from_elem((7, 3, 2), 4.2);
        let filtered = filter_sinogram(&sino, None).unwrap();
        for &v in filtered.iter() {
            assert_float_eq!(v, 0.0, abs <= 1e-12);
        }
    }

    #[test]
    fn explicit_ramp_equals_default() {
        let mut sino = Sinogram::zeros((5, 2, 1));
        sino[[2, 0, 0]] = 1.0;
        sino[[4, 1, 0]] = -0.5;
        let ramp = ramp_filter(5);
        let default = filter_sinogram(&sino, None).unwrap();
        let explicit = filter_sinogram(&sino, Some(&ramp)).unwrap();
        for (a, b) in default.iter().zip(explicit.iter()) {
            assert_float_eq!(*a, *b, abs <= 1e-15);
        }
    }

    #[test]
    fn wrong_filter_length_is_rejected() {
        let sino = Sinogram::zeros((5, 2, 1));
        let err = filter_sinogram(&sino, Some(&[1.0; 6])).unwrap_err();
        assert_eq!(err, Error::FilterLengthMismatch { expected: 5, found: 6 });
    }

    // An identity response leaves every row untouched.
    #[test]
    fn all_pass_filter_is_identity() {
        let mut sino = Sinogram::zeros((6, 2, 1));
        for (k, v) in sino.iter_mut().enumerate() {
            *v = (k as f64 * 0.37).sin();
        }
        let filtered = filter_sinogram(&sino, Some(&[1.0; 6])).unwrap();
        for (a, b) in filtered.iter().zip(sino.iter()) {
            assert_float_eq!(*a, *b, abs <= 1e-12);
        }
    }

    // Project a point, reconstruct it: the peak must come back where the
    // point was, and stand well clear of the background.
    #[test]
    fn reconstruction_peak_returns_home() {
        let n = 16;
        let mut image = Array2::zeros((n, n));
        image[[8, 8]] = 1.0;
        let g = Geometry::default_parallel(n).unwrap();
        let angles = uniform_angles(64);

        let sino = project_2d(image.view(), &angles, &g, None).unwrap();
        let recon = filtered_backproject_2d(sino.view(), &angles, &g, None, None).unwrap();

        let mut peak = (0, 0);
        let mut peak_value = f64::MIN;
        for ((i, j), &v) in recon.indexed_iter() {
            if v > peak_value {
                peak_value = v;
                peak = (i, j);
            }
        }
        assert_eq!(peak, (8, 8));
        // every non-neighbouring cell sits far below the peak
        for ((i, j), &v) in recon.indexed_iter() {
            if i.abs_diff(8) > 1 || j.abs_diff(8) > 1 {
                assert!(v < 0.5 * peak_value, "({i}, {j}) too bright: {v}");
            }
        }
    }
}
