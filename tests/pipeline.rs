mod common;

use approx::assert_relative_eq;
use ndarray::Array2;

use common::{mask_with, punch};
use polymask::filter::FilteredOutput;
use polymask::{
    mask_to_polygons, polygons_to_mask, Connectivity, ObjectCrop, Outline, PipelineConfig,
    RefinementPipeline, ReturnType,
};

fn overlapping_objects() -> Vec<ObjectCrop> {
    vec![
        ObjectCrop::new(mask_with(100, 100, &[(0, 0, 100, 100)]), 0.0, 0.0, 0.0),
        ObjectCrop::new(mask_with(50, 50, &[(0, 0, 50, 50)]), 75.0, 75.0, 0.0),
    ]
}

#[test]
fn overlapping_crops_become_disjoint() {
    let pipeline = RefinementPipeline::new(PipelineConfig::default()).unwrap();
    let image = Array2::<f32>::zeros((150, 150));
    let report = pipeline.run(image.view(), &overlapping_objects());

    let outlines = report.resolved.outlines();
    assert_eq!(outlines.len(), 2);
    assert_relative_eq!(outlines[0].area(), 9375.0, epsilon = 1e-3);
    assert_relative_eq!(outlines[1].area(), 2500.0, epsilon = 1e-3);
    assert!(report.resolved.residual_overlaps(1e-3).is_empty());
    assert!(report.failures.is_empty());
    assert_eq!(report.resolved.skipped_pairs(), 0);
}

#[test]
fn report_renders_as_mask() {
    let pipeline = RefinementPipeline::new(PipelineConfig::default()).unwrap();
    let image = Array2::<f32>::zeros((150, 150));
    let report = pipeline.run(image.view(), &overlapping_objects());

    match report.render_as(ReturnType::Mask, 150, 150).unwrap() {
        FilteredOutput::Mask(mask) => assert_eq!(mask.foreground_count(), 11875),
        other => panic!("expected mask, got {other:?}"),
    }
    match report.render(150, 150).unwrap() {
        FilteredOutput::Polygons(outlines) => assert_eq!(outlines.len(), 2),
        other => panic!("expected polygons, got {other:?}"),
    }
}

#[test]
fn configured_return_type_drives_render() {
    let config: PipelineConfig = serde_json::from_str(r#"{"return_type": "coordinates"}"#).unwrap();
    let pipeline = RefinementPipeline::new(config).unwrap();
    let image = Array2::<f32>::zeros((150, 150));
    let report = pipeline.run(image.view(), &overlapping_objects());

    assert_eq!(report.return_type, ReturnType::Coordinates);
    match report.render(150, 150).unwrap() {
        FilteredOutput::Coordinates(rings) => {
            assert_eq!(rings.len(), 2);
            assert!(rings.iter().all(|ring| ring.ncols() == 2));
        }
        other => panic!("expected coordinates, got {other:?}"),
    }
}

#[test]
fn crop_window_clamped_at_top_projects_back() {
    let pipeline = RefinementPipeline::new(PipelineConfig::default()).unwrap();
    let window = pipeline.crop_window((10, 20, 70, 90));
    assert_eq!(window.pad, 20);
    assert_eq!((window.width(), window.height()), (60, 90));

    // Object occupies image rows 20..60, i.e. crop rows 20..60.
    let mask = mask_with(window.height(), window.width(), &[(0, 20, 60, 60)]);
    let outlines = pipeline.extract_object(&ObjectCrop::from_window(mask, &window));

    assert_eq!(outlines.len(), 1);
    let min_y = outlines[0]
        .coordinates()
        .iter()
        .map(|p| p[1])
        .fold(f64::INFINITY, f64::min);
    let min_x = outlines[0]
        .coordinates()
        .iter()
        .map(|p| p[0])
        .fold(f64::INFINITY, f64::min);
    assert_eq!((min_x, min_y), (10.0, 20.0));
}

#[test]
fn hole_threshold_applies_per_object() {
    let mask = punch(mask_with(60, 60, &[(10, 10, 50, 50)]), 20, 20, 25, 30);
    let image = Array2::<f32>::zeros((60, 60));

    let filled = RefinementPipeline::new(PipelineConfig {
        hole_area_threshold: Some(100.0),
        ..Default::default()
    })
    .unwrap()
    .run(image.view(), &[ObjectCrop::new(mask.clone(), 0.0, 0.0, 0.0)]);
    assert_eq!(filled.resolved.outlines()[0].hole_count(), 0);
    assert_relative_eq!(filled.resolved.total_area(), 1600.0, epsilon = 1e-3);

    let kept = RefinementPipeline::new(PipelineConfig {
        hole_area_threshold: Some(10.0),
        ..Default::default()
    })
    .unwrap()
    .run(image.view(), &[ObjectCrop::new(mask, 0.0, 0.0, 0.0)]);
    assert_eq!(kept.resolved.outlines()[0].hole_count(), 1);
    assert_relative_eq!(kept.resolved.total_area(), 1550.0, epsilon = 1e-3);
}

#[test]
fn tiny_object_yields_nothing() {
    let pipeline = RefinementPipeline::new(PipelineConfig::default()).unwrap();
    let image = Array2::<f32>::zeros((40, 40));
    let report = pipeline.run(
        image.view(),
        &[ObjectCrop::new(mask_with(40, 40, &[(5, 5, 25, 25)]), 0.0, 0.0, 0.0)],
    );
    assert!(report.resolved.is_empty());
    assert_eq!(report.empty_objects, vec![0]);
}

#[test]
fn simplify_refiner_from_json_config() {
    let config: PipelineConfig =
        serde_json::from_str(r#"{"refiner": "simplify", "simplify_tolerance": 2.0}"#).unwrap();
    let pipeline = RefinementPipeline::new(config).unwrap();
    assert_eq!(pipeline.refiner_name(), "simplify");

    let image = Array2::<f32>::zeros((150, 150));
    let report = pipeline.run(image.view(), &overlapping_objects());
    assert_relative_eq!(report.resolved.total_area(), 11875.0, epsilon = 1e-3);
    assert!(report.resolved.residual_overlaps(1e-3).is_empty());
}

#[test]
fn raster_round_trip_preserves_area() {
    let outlines = vec![
        Outline::rect(2.0, 3.0, 40.0, 41.0),
        Outline::new(
            &[[60.0, 10.0], [90.0, 10.0], [90.0, 50.0], [75.0, 50.0], [75.0, 30.0], [60.0, 30.0]],
            &[],
        ),
    ];
    let mask = polygons_to_mask(&outlines, 64, 100).unwrap();
    let traced = mask_to_polygons(&mask, Connectivity::Four);

    assert_eq!(traced.len(), 2);
    let input: f64 = outlines.iter().map(Outline::area).sum();
    let output: f64 = traced.iter().map(Outline::area).sum();
    assert_relative_eq!(input, output, epsilon = 1e-6);
}
