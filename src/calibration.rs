//! Two-tap size calibration
//!
//! The user taps both ends of a reference object of known length; the pixel
//! distance between the taps yields a millimetre-per-pixel scale, which is then
//! applied to the mask bounding box.

use crate::{
    error::{Result, WhiteMuseError},
    types::{Mask, Point, SizeEstimate},
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Opacity above which a mask pixel belongs to the subject's bounding box
pub const BOUNDING_BOX_THRESHOLD: f32 = 0.5;

/// Tap pairs closer than this are rejected as degenerate
const MIN_TAP_DISTANCE: f32 = 1e-6;

/// Objects of known size used as calibration references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceObject {
    /// ID-1 card long edge
    #[default]
    Card,
    /// A4 paper long edge
    PaperLong,
    /// A4 paper short edge
    PaperShort,
    /// 100 mm ruler section
    Ruler,
}

impl ReferenceObject {
    /// Real-world length in millimetres
    #[must_use]
    pub fn length_mm(self) -> f32 {
        match self {
            Self::Card => 85.60,
            Self::PaperLong => 297.0,
            Self::PaperShort => 210.0,
            Self::Ruler => 100.0,
        }
    }
}

impl std::str::FromStr for ReferenceObject {
    type Err = WhiteMuseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "card" => Ok(Self::Card),
            "paper-long" | "a4-long" => Ok(Self::PaperLong),
            "paper-short" | "a4-short" => Ok(Self::PaperShort),
            "ruler" => Ok(Self::Ruler),
            other => Err(WhiteMuseError::invalid_config(format!(
                "Unknown reference object '{}'. Use card, paper-long, paper-short or ruler",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ReferenceObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Card => "card",
            Self::PaperLong => "paper-long",
            Self::PaperShort => "paper-short",
            Self::Ruler => "ruler",
        };
        write!(f, "{} ({:.2} mm)", name, self.length_mm())
    }
}

/// Rectangle an image is displayed in, in display coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Map a point in display coordinates onto native image pixels
///
/// Returns `None` when the display rectangle is empty.
#[must_use]
pub fn display_to_image_coords(point: Point, rect: DisplayRect, image_dims: (u32, u32)) -> Option<Point> {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    let scale_x = image_dims.0 as f32 / rect.width;
    let scale_y = image_dims.1 as f32 / rect.height;
    Some(Point::new(
        (point.x - rect.x) * scale_x,
        (point.y - rect.y) * scale_y,
    ))
}

/// Millimetres per pixel for a reference spanning `pixel_distance`
///
/// # Errors
/// - Distance below the degenerate threshold or not finite
pub fn mm_per_px(reference_mm: f32, pixel_distance: f32) -> Result<f32> {
    if !pixel_distance.is_finite() || pixel_distance < MIN_TAP_DISTANCE {
        return Err(WhiteMuseError::calibration_incomplete(format!(
            "reference taps are {:.3} px apart",
            pixel_distance
        )));
    }
    Ok(reference_mm / pixel_distance)
}

/// Scale the mask bounding box into millimetres
///
/// Returns `None` when the mask has no pixel above the threshold.
#[must_use]
pub fn measure(mask: &Mask, mm_per_px: f32) -> Option<SizeEstimate> {
    let bbox = mask.bounding_box(BOUNDING_BOX_THRESHOLD)?;
    Some(SizeEstimate {
        width_mm: bbox.width() as f32 * mm_per_px,
        height_mm: bbox.height() as f32 * mm_per_px,
        mm_per_px,
    })
}

/// Calibrator state machine
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CalibrationState {
    /// Calibration mode off
    #[default]
    Idle,
    AwaitingFirstTap,
    AwaitingSecondTap { first: Point },
    Measured {
        first: Point,
        second: Point,
        mm_per_px: f32,
    },
}

/// Result of feeding one tap to the calibrator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    /// Calibration is off; the tap was ignored
    Ignored,
    /// First point recorded
    FirstRecorded(Point),
    /// Scale established
    Calibrated { mm_per_px: f32 },
}

/// Two-tap calibrator bound to one reference object
#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    state: CalibrationState,
    reference: ReferenceObject,
}

impl Calibrator {
    #[must_use]
    pub fn new(reference: ReferenceObject) -> Self {
        Self {
            state: CalibrationState::Idle,
            reference,
        }
    }

    #[must_use]
    pub fn state(&self) -> CalibrationState {
        self.state
    }

    #[must_use]
    pub fn reference(&self) -> ReferenceObject {
        self.reference
    }

    pub fn set_reference(&mut self, reference: ReferenceObject) {
        self.reference = reference;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self.state, CalibrationState::Idle)
    }

    /// Toggle calibration mode
    ///
    /// Turning the mode on always starts from a fresh tap pair. Returns the
    /// new active flag.
    pub fn toggle(&mut self) -> bool {
        self.state = if self.is_active() {
            CalibrationState::Idle
        } else {
            CalibrationState::AwaitingFirstTap
        };
        debug!("Calibration mode toggled: {:?}", self.state);
        self.is_active()
    }

    /// Discard recorded taps and wait for a new first tap
    pub fn reset(&mut self) {
        if self.is_active() {
            self.state = CalibrationState::AwaitingFirstTap;
        }
    }

    /// Record one image-space tap
    ///
    /// A tap after a completed measurement starts a new pair.
    ///
    /// # Errors
    /// - `CalibrationIncomplete` when the second tap coincides with the first;
    ///   the calibrator returns to awaiting the first tap
    pub fn tap(&mut self, point: Point) -> Result<TapOutcome> {
        match self.state {
            CalibrationState::Idle => Ok(TapOutcome::Ignored),
            CalibrationState::AwaitingFirstTap | CalibrationState::Measured { .. } => {
                self.state = CalibrationState::AwaitingSecondTap { first: point };
                Ok(TapOutcome::FirstRecorded(point))
            },
            CalibrationState::AwaitingSecondTap { first } => {
                let distance = first.distance(&point);
                match mm_per_px(self.reference.length_mm(), distance) {
                    Ok(scale) => {
                        info!(
                            "Calibrated {:.4} mm/px from {:.1} px against {}",
                            scale, distance, self.reference
                        );
                        self.state = CalibrationState::Measured {
                            first,
                            second: point,
                            mm_per_px: scale,
                        };
                        Ok(TapOutcome::Calibrated { mm_per_px: scale })
                    },
                    Err(e) => {
                        self.state = CalibrationState::AwaitingFirstTap;
                        Err(e)
                    },
                }
            },
        }
    }

    /// Established scale, if both taps were recorded
    #[must_use]
    pub fn mm_per_px(&self) -> Option<f32> {
        match self.state {
            CalibrationState::Measured { mm_per_px, .. } => Some(mm_per_px),
            _ => None,
        }
    }

    /// Measure a mask with the current scale
    ///
    /// `Ok(None)` means no mask or an empty mask ("unavailable").
    ///
    /// # Errors
    /// - `CalibrationIncomplete` before two taps were recorded
    pub fn measure(&self, mask: Option<&Mask>) -> Result<Option<SizeEstimate>> {
        let scale = self.mm_per_px().ok_or_else(|| {
            WhiteMuseError::calibration_incomplete("two reference taps are required")
        })?;
        Ok(mask.and_then(|m| measure(m, scale)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_mask(width: u32, height: u32) -> Mask {
        Mask::from_fn(200, 200, |x, y| {
            if (20..20 + width).contains(&x) && (30..30 + height).contains(&y) {
                1.0
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_card_over_hundred_pixels() {
        let scale = mm_per_px(ReferenceObject::Card.length_mm(), 100.0).unwrap();
        assert!((scale - 0.856).abs() < 1e-6);

        let size = measure(&box_mask(50, 80), scale).unwrap();
        assert!((size.width_mm - 42.8).abs() < 1e-3);
        assert!((size.height_mm - 68.48).abs() < 1e-3);
    }

    #[test]
    fn test_state_machine_full_cycle() {
        let mut calibrator = Calibrator::new(ReferenceObject::Card);
        assert_eq!(calibrator.tap(Point::new(0.0, 0.0)).unwrap(), TapOutcome::Ignored);

        assert!(calibrator.toggle());
        assert_eq!(calibrator.state(), CalibrationState::AwaitingFirstTap);
        assert!(matches!(
            calibrator.measure(None),
            Err(WhiteMuseError::CalibrationIncomplete(_))
        ));

        calibrator.tap(Point::new(10.0, 10.0)).unwrap();
        match calibrator.tap(Point::new(70.0, 90.0)).unwrap() {
            TapOutcome::Calibrated { mm_per_px } => assert!((mm_per_px - 0.856).abs() < 1e-6),
            other => panic!("expected calibration, got {other:?}"),
        }

        let size = calibrator.measure(Some(&box_mask(50, 80))).unwrap().unwrap();
        assert!((size.width_mm - 42.8).abs() < 1e-3);

        // Next tap begins a new pair
        calibrator.tap(Point::new(0.0, 0.0)).unwrap();
        assert!(matches!(
            calibrator.state(),
            CalibrationState::AwaitingSecondTap { .. }
        ));

        assert!(!calibrator.toggle());
        assert!(calibrator.toggle());
        assert_eq!(calibrator.state(), CalibrationState::AwaitingFirstTap);
    }

    #[test]
    fn test_coincident_taps_rejected() {
        let mut calibrator = Calibrator::new(ReferenceObject::Ruler);
        calibrator.toggle();
        calibrator.tap(Point::new(5.0, 5.0)).unwrap();
        let err = calibrator.tap(Point::new(5.0, 5.0)).unwrap_err();
        assert!(matches!(err, WhiteMuseError::CalibrationIncomplete(_)));
        assert_eq!(calibrator.state(), CalibrationState::AwaitingFirstTap);
    }

    #[test]
    fn test_measure_without_mask_is_unavailable() {
        let mut calibrator = Calibrator::new(ReferenceObject::PaperShort);
        calibrator.toggle();
        calibrator.tap(Point::new(0.0, 0.0)).unwrap();
        calibrator.tap(Point::new(0.0, 210.0)).unwrap();
        assert_eq!(calibrator.measure(None).unwrap(), None);
        assert_eq!(
            calibrator.measure(Some(&Mask::filled(10, 10, 0.0))).unwrap(),
            None
        );
    }

    #[test]
    fn test_display_to_image_coords() {
        let rect = DisplayRect {
            x: 10.0,
            y: 20.0,
            width: 400.0,
            height: 300.0,
        };
        let mapped = display_to_image_coords(Point::new(210.0, 170.0), rect, (1600, 1200)).unwrap();
        assert!((mapped.x - 800.0).abs() < 1e-3);
        assert!((mapped.y - 600.0).abs() < 1e-3);

        let empty = DisplayRect {
            width: 0.0,
            ..rect
        };
        assert!(display_to_image_coords(Point::new(0.0, 0.0), empty, (10, 10)).is_none());
    }

    #[test]
    fn test_reference_parsing() {
        assert_eq!("paper_long".parse::<ReferenceObject>().unwrap(), ReferenceObject::PaperLong);
        assert_eq!("RULER".parse::<ReferenceObject>().unwrap(), ReferenceObject::Ruler);
        assert!("banana".parse::<ReferenceObject>().is_err());
        assert!((ReferenceObject::PaperShort.length_mm() - 210.0).abs() < f32::EPSILON);
    }
}
