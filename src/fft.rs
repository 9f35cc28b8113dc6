//! Split re/im discrete Fourier transform used by the frequency filter.
//!
//! Power-of-two lengths go through an in-place Cooley-Tukey radix-2 pass.
//! Every other length is handled by Bluestein's chirp-z algorithm, which
//! re-expresses the DFT as a convolution of power-of-two length, so filter
//! rows are transformed at their exact length and never padded.

use crate::types::PI;

/// Transform `re`/`im` in place. `inverse` = true applies the inverse DFT
/// including the 1/n scaling.
pub(crate) fn fft(re: &mut [f64], im: &mut [f64], inverse: bool) {
    let n = re.len();
    debug_assert_eq!(n, im.len());
    if n <= 1 {
        return;
    }
    if n.is_power_of_two() {
        fft_radix2(re, im, inverse);
    } else {
        fft_bluestein(re, im, inverse);
    }
}

/// In-place Cooley-Tukey radix-2 pass. `n` must be a power of 2.
fn fft_radix2(re: &mut [f64], im: &mut [f64], inverse: bool) {
    let n = re.len();
    debug_assert!(n.is_power_of_two());

    // Bit-reversal permutation
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            re.swap(i, j);
            im.swap(i, j);
        }
    }

    // Butterfly operations
    let sign = if inverse { 1.0 } else { -1.0 };
    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let angle = sign * 2.0 * PI / len as f64;
        let w_re = angle.cos();
        let w_im = angle.sin();

        let mut i = 0;
        while i < n {
            let mut cur_re = 1.0;
            let mut cur_im = 0.0;
            for k in 0..half {
                let u_re = re[i + k];
                let u_im = im[i + k];
                let v_re = re[i + k + half] * cur_re - im[i + k + half] * cur_im;
                let v_im = re[i + k + half] * cur_im + im[i + k + half] * cur_re;
                re[i + k] = u_re + v_re;
                im[i + k] = u_im + v_im;
                re[i + k + half] = u_re - v_re;
                im[i + k + half] = u_im - v_im;
                let new_re = cur_re * w_re - cur_im * w_im;
                let new_im = cur_re * w_im + cur_im * w_re;
                cur_re = new_re;
                cur_im = new_im;
            }
            i += len;
        }
        len <<= 1;
    }

    if inverse {
        let scale = 1.0 / n as f64;
        for i in 0..n {
            re[i] *= scale;
            im[i] *= scale;
        }
    }
}

/// Bluestein chirp-z transform for arbitrary `n`: multiply by the chirp
/// exp(sign i pi k^2 / n), convolve with the conjugate chirp at a
/// power-of-two length >= 2n-1, multiply by the chirp again.
fn fft_bluestein(re: &mut [f64], im: &mut [f64], inverse: bool) {
    let n = re.len();
    let sign = if inverse { 1.0 } else { -1.0 };

    let mut chirp_re = vec![0.0; n];
    let mut chirp_im = vec![0.0; n];
    for k in 0..n {
        // k^2 mod 2n keeps the phase argument small for long inputs
        let q = (k * k) % (2 * n);
        let angle = sign * PI * q as f64 / n as f64;
        chirp_re[k] = angle.cos();
        chirp_im[k] = angle.sin();
    }

    let m = (2 * n - 1).next_power_of_two();
    let mut a_re = vec![0.0; m];
    let mut a_im = vec![0.0; m];
    for k in 0..n {
        a_re[k] = re[k] * chirp_re[k] - im[k] * chirp_im[k];
        a_im[k] = re[k] * chirp_im[k] + im[k] * chirp_re[k];
    }

    // conjugate chirp, wrapped so indices -k land at m-k
    let mut b_re = vec![0.0; m];
    let mut b_im = vec![0.0; m];
    b_re[0] = 1.0;
    for k in 1..n {
        b_re[k] = chirp_re[k];
        b_im[k] = -chirp_im[k];
        b_re[m - k] = chirp_re[k];
        b_im[m - k] = -chirp_im[k];
    }

    fft_radix2(&mut a_re, &mut a_im, false);
    fft_radix2(&mut b_re, &mut b_im, false);
    for k in 0..m {
        let p_re = a_re[k] * b_re[k] - a_im[k] * b_im[k];
        let p_im = a_re[k] * b_im[k] + a_im[k] * b_re[k];
        a_re[k] = p_re;
        a_im[k] = p_im;
    }
    fft_radix2(&mut a_re, &mut a_im, true);

    for k in 0..n {
        re[k] = a_re[k] * chirp_re[k] - a_im[k] * chirp_im[k];
        im[k] = a_re[k] * chirp_im[k] + a_im[k] * chirp_re[k];
    }

    if inverse {
        let scale = 1.0 / n as f64;
        for k in 0..n {
            re[k] *= scale;
            im[k] *= scale;
        }
    }
}
