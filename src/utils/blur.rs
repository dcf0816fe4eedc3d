//! Separable box blur for opacity masks

use crate::types::Mask;

/// Radius used to smooth upsampled saliency masks
pub const MASK_SMOOTH_RADIUS: u32 = 2;

/// Radius used to soften the contact-shadow source
pub const SHADOW_SOFTEN_RADIUS: u32 = 8;

/// Blur a mask with a `2 * radius + 1` box filter
///
/// Radius 0 returns an identical copy.
#[must_use]
pub fn blur_mask(mask: &Mask, radius: u32) -> Mask {
    let (width, height) = mask.dimensions();
    let data = box_blur(mask.data(), width, height, radius);
    Mask::from_fn(width, height, |x, y| {
        data.get(y as usize * width as usize + x as usize)
            .copied()
            .unwrap_or(0.0)
    })
}

/// Two-pass mean filter over a row-major grid
///
/// Each pass keeps a running window sum; coordinates outside the grid are
/// clamped to the nearest edge sample. Mismatched input lengths are returned
/// unchanged.
#[must_use]
#[allow(clippy::indexing_slicing)]
// Safe: every index is bounded by the width * height length check above
pub fn box_blur(values: &[f32], width: u32, height: u32, radius: u32) -> Vec<f32> {
    let (w, h) = (width as usize, height as usize);
    if radius == 0 || w == 0 || h == 0 || values.len() != w * h {
        return values.to_vec();
    }
    let r = radius as usize;
    let mut horizontal = vec![0.0f32; values.len()];
    for y in 0..h {
        let row = &values[y * w..(y + 1) * w];
        blur_line(row, &mut horizontal[y * w..(y + 1) * w], r);
    }

    let mut output = vec![0.0f32; values.len()];
    let mut column = vec![0.0f32; h];
    let mut column_out = vec![0.0f32; h];
    for x in 0..w {
        for (y, slot) in column.iter_mut().enumerate() {
            *slot = horizontal[y * w + x];
        }
        blur_line(&column, &mut column_out, r);
        for (y, value) in column_out.iter().enumerate() {
            output[y * w + x] = *value;
        }
    }
    output
}

#[allow(clippy::indexing_slicing)]
fn blur_line(input: &[f32], output: &mut [f32], radius: usize) {
    let len = input.len();
    let last = len - 1;
    let window = (2 * radius + 1) as f32;
    let at = |i: isize| -> f32 { input[i.clamp(0, last as isize) as usize] };

    let mut sum: f32 = (-(radius as isize)..=radius as isize).map(at).sum();
    for (i, out) in output.iter_mut().enumerate() {
        *out = sum / window;
        let entering = i as isize + radius as isize + 1;
        let leaving = i as isize - radius as isize;
        sum += at(entering) - at(leaving);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_zero_is_identity() {
        let mask = Mask::from_fn(7, 5, |x, y| ((x * 3 + y * 5) % 7) as f32 / 7.0);
        assert_eq!(blur_mask(&mask, 0), mask);
    }

    #[test]
    fn test_uniform_mask_unchanged() {
        let mask = Mask::filled(12, 9, 0.4);
        let blurred = blur_mask(&mask, 3);
        for value in blurred.data() {
            assert!((value - 0.4).abs() < 1e-5);
        }
    }

    #[test]
    fn test_edges_are_clamped_not_zero_padded() {
        // Zero padding would darken the border of an all-ones mask
        let values = vec![1.0; 16];
        let blurred = box_blur(&values, 4, 4, 2);
        assert!(blurred.iter().all(|v| (v - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_single_spike_spreads_evenly() {
        let mut values = vec![0.0; 81];
        values[40] = 1.0;
        let blurred = box_blur(&values, 9, 9, 1);
        let expected = 1.0 / 9.0;
        for y in 3..=5 {
            for x in 3..=5 {
                assert!((blurred[y * 9 + x] - expected).abs() < 1e-5);
            }
        }
        assert!(blurred[0].abs() < 1e-6);
        let total: f32 = blurred.iter().sum();
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_output_stays_in_unit_range() {
        let mask = Mask::from_fn(20, 20, |x, _| if x < 10 { 1.0 } else { 0.0 });
        let blurred = blur_mask(&mask, SHADOW_SOFTEN_RADIUS);
        assert!(blurred.data().iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(blurred.get(9, 10) < 1.0 && blurred.get(10, 10) > 0.0);
    }
}
