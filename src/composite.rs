//! White-background compositing with a contact shadow

use crate::{
    config::EnhanceOptions,
    error::{Result, WhiteMuseError},
    types::Mask,
    utils::{blur_mask, SHADOW_SOFTEN_RADIUS},
};
use image::{Rgba, RgbaImage};

/// Blend the subject over white with a shadow cast from the softened mask
///
/// Shadow darkness at a pixel is `(1 - alpha) * source[y - offset] * opacity`,
/// so the shadow only shows where the subject is transparent and is sampled
/// from above. Rows whose sample would fall above the top edge get no shadow.
/// The output is always fully opaque; without a mask the input colors are
/// returned with alpha forced to 255.
///
/// # Errors
/// - Mask dimensions differ from the buffer dimensions
pub fn composite(image: &RgbaImage, mask: Option<&Mask>, options: &EnhanceOptions) -> Result<RgbaImage> {
    let Some(mask) = mask else {
        let mut output = image.clone();
        for pixel in output.pixels_mut() {
            pixel[3] = 255;
        }
        return Ok(output);
    };

    let (width, height) = image.dimensions();
    if !mask.matches(width, height) {
        return Err(WhiteMuseError::processing_stage_error(
            "composite",
            "mask dimensions differ from buffer",
            Some(&format!(
                "buffer {}x{}, mask {}x{}",
                width,
                height,
                mask.width(),
                mask.height()
            )),
        ));
    }

    let shadow_source = blur_mask(mask, SHADOW_SOFTEN_RADIUS);
    let offset = options.shadow_offset();
    let opacity = options.shadow_opacity();

    let output = RgbaImage::from_fn(width, height, |x, y| {
        let alpha = mask.get(x, y);
        let source = y.checked_sub(offset).map_or(0.0, |sy| shadow_source.get(x, sy));
        let darkness = (1.0 - alpha) * source * opacity;
        let background = 255.0 * (1.0 - darkness);

        let fg = image.get_pixel(x, y);
        let blend = |c: u8| {
            (f32::from(c) * alpha + background * (1.0 - alpha))
                .clamp(0.0, 255.0)
                .round() as u8
        };
        Rgba([blend(fg[0]), blend(fg[1]), blend(fg[2]), 255])
    });
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Variant;

    fn subject_mask() -> Mask {
        Mask::from_fn(40, 40, |x, y| {
            if (12..28).contains(&x) && (8..24).contains(&y) {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_no_mask_forces_opacity() {
        let image = RgbaImage::from_pixel(5, 5, Rgba([10, 20, 30, 40]));
        let output = composite(&image, None, &EnhanceOptions::default()).unwrap();
        for pixel in output.pixels() {
            assert_eq!(*pixel, Rgba([10, 20, 30, 255]));
        }
    }

    #[test]
    fn test_output_is_opaque_and_subject_kept() {
        let image = RgbaImage::from_pixel(40, 40, Rgba([50, 60, 70, 255]));
        let output = composite(&image, Some(&subject_mask()), &EnhanceOptions::default()).unwrap();
        assert!(output.pixels().all(|p| p[3] == 255));
        assert_eq!(*output.get_pixel(20, 15), Rgba([50, 60, 70, 255]));
        // Far corner is clean white
        assert_eq!(*output.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_shadow_falls_below_subject() {
        let image = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let options = EnhanceOptions::with_strength(1.0);
        let output = composite(&image, Some(&subject_mask()), &options).unwrap();

        let below = output.get_pixel(20, 26)[0];
        let above = output.get_pixel(20, 5)[0];
        assert!(below < 255, "expected shadow under subject, got {below}");
        assert!(below < above);
    }

    #[test]
    fn test_shadow_opacity_bounded() {
        let image = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let mask = subject_mask();
        for (variant, ceiling) in [(None, 0.28), (Some(Variant::WeakShadow), 0.18)] {
            let mut options = EnhanceOptions::with_strength(1.0);
            if let Some(variant) = variant {
                options = options.with_variant(variant);
            }
            assert!(options.shadow_opacity() <= ceiling + f32::EPSILON);

            let output = composite(&image, Some(&mask), &options).unwrap();
            let floor = (255.0 * (1.0 - ceiling)).floor() as u8;
            for (x, y, pixel) in output.enumerate_pixels() {
                if mask.get(x, y) == 0.0 {
                    assert!(pixel[0] >= floor, "pixel ({x},{y}) too dark: {}", pixel[0]);
                }
            }
        }
    }

    #[test]
    fn test_zero_strength_has_no_shadow() {
        let image = RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        let output = composite(&image, Some(&subject_mask()), &EnhanceOptions::with_strength(0.0)).unwrap();
        assert_eq!(*output.get_pixel(20, 26), Rgba([255, 255, 255, 255]));
    }
}
