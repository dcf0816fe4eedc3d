//! End-to-end studio sessions: isolation, degradation, calibration and copy

mod common;

use async_trait::async_trait;
use common::{
    config_for, missing_model_config, model_file, product_photo, RecordingReporter,
    RectangleBackend,
};
use image::{DynamicImage, Rgba};
use whitemuse::{
    calibration::{ReferenceObject, TapOutcome},
    config::{OutputFormat, Variant},
    copy::{CopyEngine, CopyMode, FixedClock, MemoryProfileStore, ProfileService},
    error::{Result, WhiteMuseError},
    segmentation::{Capability, SegmentationAdapter},
    text_evidence::{OcrProgress, TextRecognizer},
    types::{Item, ItemStatus, Point},
    ImageIOService, Studio,
};

const WIDTH: u32 = 120;
const HEIGHT: u32 = 90;

fn photo_item(name: &str) -> Item {
    Item::from_image(
        name,
        DynamicImage::ImageRgba8(product_photo(WIDTH, HEIGHT)),
        1600,
    )
}

fn studio_with(backend: RectangleBackend, path: std::path::PathBuf) -> Studio {
    let config = config_for(path);
    let adapter = SegmentationAdapter::with_backend(config.clone(), Box::new(backend));
    Studio::with_adapter(config, adapter).unwrap()
}

struct LabelRecognizer(&'static str);

#[async_trait]
impl TextRecognizer for LabelRecognizer {
    async fn recognize(
        &self,
        _png: &[u8],
        progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<String> {
        progress(OcrProgress {
            status: "recognizing text".to_string(),
            progress: 1.0,
        });
        Ok(self.0.to_string())
    }
}

struct OfflineRecognizer;

#[async_trait]
impl TextRecognizer for OfflineRecognizer {
    async fn recognize(
        &self,
        _png: &[u8],
        _progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> Result<String> {
        Err(WhiteMuseError::unavailable("recognition engine not installed"))
    }
}

#[tokio::test]
async fn test_batch_isolates_every_item() {
    let (_dir, path) = model_file();
    let mut studio = studio_with(RectangleBackend::new(), path);
    let reporter = RecordingReporter::default();
    studio.set_progress_reporter(Box::new(reporter.clone()));

    for name in ["bag.jpg", "watch.jpg", "wallet.jpg"] {
        studio.add_item(photo_item(name));
    }
    let stats = studio.process_all().await;

    assert_eq!(stats.items_total, 3);
    assert_eq!(stats.items_completed, 3);
    assert_eq!(stats.items_failed, 0);
    assert_eq!(studio.capability(), Some(&Capability::Available));

    for item in studio.items() {
        assert_eq!(item.status, ItemStatus::Isolated);
        assert_eq!(item.after.dimensions(), (WIDTH, HEIGHT));
        let mask = item.mask.as_ref().expect("isolated item carries a mask");
        assert_eq!((mask.width(), mask.height()), (WIDTH, HEIGHT));
        assert!(item.after.pixels().all(|p| p[3] == 255));
        // Background far from the subject is clean white
        assert_eq!(*item.after.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    let batches = reporter.batches.lock().unwrap();
    let completed: Vec<usize> = batches.iter().map(|b| b.items_completed).collect();
    assert_eq!(completed, vec![1, 2, 3]);
    assert_eq!(batches.last().unwrap().current_item_name, "wallet.jpg");
}

#[tokio::test]
async fn test_inference_failure_contained_to_one_item() {
    let (_dir, path) = model_file();
    let mut studio = studio_with(RectangleBackend::failing_on(&[1]), path);
    for name in ["first.jpg", "second.jpg", "third.jpg"] {
        studio.add_item(photo_item(name));
    }

    let stats = studio.process_all().await;
    assert_eq!(stats.items_completed, 3);
    assert_eq!(stats.items_failed, 1);

    let statuses: Vec<&ItemStatus> = studio.items().iter().map(|i| &i.status).collect();
    assert_eq!(statuses[0], &ItemStatus::Isolated);
    assert!(matches!(statuses[1], ItemStatus::NoIsolation(_)));
    assert_eq!(statuses[2], &ItemStatus::Isolated);

    // The failed item still received tone normalization without a mask
    let second = studio.item(1).unwrap();
    assert!(second.mask.is_none());
    assert_ne!(second.after, second.before);
}

#[tokio::test]
async fn test_missing_model_degrades_to_tone_only() {
    let mut studio = Studio::new(missing_model_config()).unwrap();
    studio.add_item(photo_item("offline.jpg"));
    studio.add_item(photo_item("offline-2.jpg"));

    let stats = studio.process_all().await;
    assert_eq!(stats.items_completed, 2);
    assert_eq!(stats.items_failed, 0);
    assert!(matches!(studio.capability(), Some(Capability::Unavailable(_))));

    for item in studio.items() {
        assert_eq!(item.status, ItemStatus::ModelUnavailable);
        assert!(item.mask.is_none());
        assert!(item.after.pixels().all(|p| p[3] == 255));
    }
    // Calibration cannot measure an unmasked item
    studio.calibrator_mut().toggle();
    studio.calibrator_mut().tap(Point::new(0.0, 0.0)).unwrap();
    studio.calibrator_mut().tap(Point::new(50.0, 0.0)).unwrap();
    assert_eq!(studio.measure_item(0).unwrap(), None);
}

#[tokio::test]
async fn test_calibrated_measurement_of_isolated_subject() {
    let (_dir, path) = model_file();
    let mut studio = studio_with(RectangleBackend::new(), path);
    studio.add_item(photo_item("card-check.jpg"));
    studio.process_all().await;

    // Not calibrated yet
    assert_eq!(studio.measure_item(0).unwrap(), None);
    assert!(studio.item(0).unwrap().size.is_none());

    studio.calibrator_mut().set_reference(ReferenceObject::Card);
    assert!(studio.calibrator_mut().toggle());
    studio.calibrator_mut().tap(Point::new(10.0, 10.0)).unwrap();
    let outcome = studio.calibrator_mut().tap(Point::new(110.0, 10.0)).unwrap();
    assert!(matches!(outcome, TapOutcome::Calibrated { mm_per_px } if (mm_per_px - 0.856).abs() < 1e-5));

    let size = studio.measure_item(0).unwrap().expect("subject measured");
    // Subject spans the central half: about 60 x 45 px
    assert!((size.width_mm - 60.0 * 0.856).abs() < 2.0 * 0.856, "{size}");
    assert!((size.height_mm - 45.0 * 0.856).abs() < 2.0 * 0.856, "{size}");
    assert_eq!(studio.item(0).unwrap().size, Some(size));
}

#[tokio::test]
async fn test_style_persists_across_batches_until_reset() {
    let (_dir, path) = model_file();
    let mut studio = studio_with(RectangleBackend::new(), path);

    studio.set_strength(0.9).unwrap();
    studio.force_variant(Variant::WeakShadow);
    studio.force_variant(Variant::StrongWhite);
    assert!(studio.set_strength(1.5).is_err());

    studio.add_item(photo_item("one.jpg"));
    studio.process_all().await;
    studio.replace_items(vec![photo_item("two.jpg")]);
    studio.process_all().await;

    let style = *studio.style();
    assert!((style.strength - 0.9).abs() < f32::EPSILON);
    // Only the last forced variant is on
    assert!(style.strong_white);
    assert!(!style.weak_shadow);
    assert!(!style.edge_priority);
    assert_eq!(studio.items().len(), 1);
    assert_eq!(studio.item(0).unwrap().name, "two.jpg");

    studio.reset_style();
    assert_eq!(*studio.style(), studio.config().enhance);
}

#[tokio::test]
async fn test_text_evidence_feeds_listing_copy() {
    let (_dir, path) = model_file();
    let mut studio = studio_with(RectangleBackend::new(), path);
    studio.add_item(photo_item("flap-bag.jpg"));
    studio.process_all().await;

    let guidance = studio
        .analyze_text(0, &LabelRecognizer("CHANEL PARIS made in italy"), &|_| {})
        .await
        .unwrap();
    assert!(guidance.is_none());

    let ocr = studio.item(0).unwrap().ocr.clone().unwrap();
    assert_eq!(ocr.candidates.first().map(|c| c.brand.as_str()), Some("CHANEL"));

    let context = studio
        .copy_context(0, "Shoulder bag")
        .unwrap()
        .with_condition("Light wear");
    let profile = ProfileService::load(Box::new(MemoryProfileStore::new())).unwrap();
    let engine = CopyEngine::with_clock(profile, Box::new(FixedClock(1_700_000_000_000)));
    let copy = engine.generate(CopyMode::Elegant, &context);

    assert!(copy.long.contains("Brand evidence: CHANEL"));
    assert!(copy.long.contains("Printed text: \"CHANEL PARIS made in italy\""));
    assert!(copy.long.contains("Condition: Light wear"));
    assert!(copy.short.starts_with("CHANEL Shoulder bag"));
}

#[tokio::test]
async fn test_short_text_suggests_retake_and_offline_recognizer_errors() {
    let (_dir, path) = model_file();
    let mut studio = studio_with(RectangleBackend::new(), path);
    studio.add_item(photo_item("blurry.jpg"));
    studio.process_all().await;

    let guidance = studio
        .analyze_text(0, &LabelRecognizer("ab"), &|_| {})
        .await
        .unwrap();
    assert!(guidance.is_some());

    let result = studio.analyze_text(0, &OfflineRecognizer, &|_| {}).await;
    let err = result.unwrap_err();
    assert!(err.is_degradation());
}

#[tokio::test]
async fn test_processed_item_encodes_as_png() {
    let (_dir, path) = model_file();
    let mut studio = studio_with(RectangleBackend::new(), path);
    studio.add_item(photo_item("export.jpg"));
    studio.process_all().await;

    let bytes = studio.item(0).unwrap().encode_after(OutputFormat::Png).unwrap();
    let decoded = ImageIOService::decode(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (WIDTH, HEIGHT));
}
