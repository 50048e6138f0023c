//! End-to-end scenarios on small synthetic DEMs.

use std::sync::Arc;

use hydroshed_algorithms::hydrology::{
    catchment, condition, flow_accumulation, flow_direction, outlets, watershed, ConditionParams,
    FlowAccumulationParams, FlowDirectionParams, PourPoint, WatershedParams,
};
use hydroshed_algorithms::pipeline::{PipelineConfig, WatershedPipeline};
use hydroshed_core::{d8, Error, GeoTransform, Interrupt, Raster};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn count(mask: &Raster<bool>) -> usize {
    mask.data().iter().filter(|&&m| m).count()
}

/// Follow flow directions from (row, col) to the cell where flow stops
fn trace_outlet(fdir: &Raster<u8>, mut row: usize, mut col: usize) -> (usize, usize) {
    let (rows, cols) = fdir.shape();
    for _ in 0..rows * cols {
        let code = fdir.get(row, col).unwrap();
        match d8::target(code, row, col, rows, cols) {
            Some((nr, nc)) if fdir.get(nr, nc).unwrap() != d8::NODATA => {
                row = nr;
                col = nc;
            }
            _ => return (row, col),
        }
    }
    panic!("flow path from ({}, {}) does not terminate", row, col);
}

/// 5x5 V-shaped valley: two planes slope towards column 2, which slopes
/// towards row 4
fn v_valley() -> Raster<f64> {
    let mut dem = Raster::from_fn(5, 5, |r, c| 10.0 * (c as f64 - 2.0).abs() + (4 - r) as f64);
    dem.set_transform(GeoTransform::new(100.0, 50.0, 10.0, -10.0));
    dem
}

#[test]
fn central_pit_drains_to_one_outlet() {
    init_tracing();
    let mut dem = Raster::filled(3, 3, 10.0);
    dem.set(1, 1, 1.0).unwrap();

    let conditioned = condition(&dem, ConditionParams::default()).unwrap();
    assert!(conditioned.report.is_complete());
    assert!(conditioned.dem.get(1, 1).unwrap() >= 10.0);

    let fdir = flow_direction(&conditioned.dem, FlowDirectionParams::default()).unwrap();
    let outlet = trace_outlet(&fdir, 0, 0);
    for row in 0..3 {
        for col in 0..3 {
            assert_eq!(trace_outlet(&fdir, row, col), outlet);
        }
    }

    let acc = flow_accumulation(&fdir, FlowAccumulationParams::default()).unwrap();
    assert_eq!(acc.get(outlet.0, outlet.1).unwrap(), 9.0);
    assert_eq!(outlets(&fdir), vec![outlet]);
}

#[test]
fn v_valley_collects_every_cell() {
    init_tracing();
    let conditioned = condition(&v_valley(), ConditionParams::default()).unwrap();
    assert!(conditioned.report.is_complete());

    let fdir = flow_direction(&conditioned.dem, FlowDirectionParams::default()).unwrap();
    let acc = flow_accumulation(&fdir, FlowAccumulationParams::default()).unwrap();
    assert_eq!(acc.get(4, 2).unwrap(), 25.0);

    let mask = catchment(&fdir, &PourPoint::cell(4, 2)).unwrap();
    assert_eq!(count(&mask), 25);
}

#[test]
fn pipeline_from_json_with_coordinate_pour_point() {
    init_tracing();
    let config = PipelineConfig::from_json_str(
        r#"{
            "routing_scheme": "D8",
            "accumulation_weights": "uniform",
            "accumulation_threshold": 20,
            "boundary_as_outlet": true,
            "snap_pour_point": true
        }"#,
    )
    .unwrap();

    // Center of (3, 0); the nearest cell with accumulation >= 20 is (3, 2)
    let output = WatershedPipeline::new(config)
        .run(&v_valley(), &PourPoint::coord(105.0, 15.0))
        .unwrap();

    assert_eq!(output.pour_point, (3, 2));
    assert!(output.accumulation.get(3, 2).unwrap() >= 20.0);
    assert_eq!(count(&output.catchment), 20);
    assert!(output.report.is_complete());
}

#[test]
fn coordinate_outside_extent_is_rejected() {
    let config = PipelineConfig {
        snap_pour_point: false,
        ..Default::default()
    };
    let result = WatershedPipeline::new(config).run(&v_valley(), &PourPoint::coord(0.0, 0.0));
    match result {
        Err(Error::CoordinateOutOfBounds { x, y, bounds }) => {
            assert_eq!((x, y), (0.0, 0.0));
            assert_eq!(bounds, (100.0, 0.0, 150.0, 50.0));
        }
        other => panic!("Expected CoordinateOutOfBounds, got {:?}", other.map(|o| o.pour_point)),
    }
}

#[test]
fn grid_weights_are_accumulated() {
    let mut weights = Raster::filled(5, 5, 0.5);
    weights.set(0, 0, -9999.0).unwrap();
    weights.set_nodata(Some(-9999.0));

    let config = PipelineConfig::from_json_str(
        r#"{"accumulation_weights": "grid", "snap_pour_point": false}"#,
    )
    .unwrap();
    let output = WatershedPipeline::new(config)
        .with_weights(Arc::new(weights))
        .run(&v_valley(), &PourPoint::cell(4, 2))
        .unwrap();

    assert_eq!(output.accumulation.get(4, 2).unwrap(), 12.0);
}

#[test]
fn weights_shape_mismatch() {
    let config = PipelineConfig::from_json_str(r#"{"accumulation_weights": "grid"}"#).unwrap();
    let result = WatershedPipeline::new(config)
        .with_weights(Arc::new(Raster::filled(4, 5, 1.0)))
        .run(&v_valley(), &PourPoint::cell(4, 2));

    assert!(matches!(
        result,
        Err(Error::SizeMismatch { er: 5, ec: 5, ar: 4, ac: 5 })
    ));
}

#[test]
fn interrupted_pipeline() {
    let token = Interrupt::new();
    token.trigger();
    let result = WatershedPipeline::new(PipelineConfig::default())
        .with_interrupt(token)
        .run(&v_valley(), &PourPoint::cell(4, 2));

    assert!(matches!(result, Err(Error::Interrupted { .. })));
}

#[test]
fn all_nodata_dem_is_rejected() {
    let mut dem = Raster::filled(3, 3, -9999.0);
    dem.set_nodata(Some(-9999.0));
    let result = WatershedPipeline::new(PipelineConfig::default()).run(&dem, &PourPoint::cell(1, 1));
    assert!(matches!(result, Err(Error::AllNoData { rows: 3, cols: 3 })));
}

#[test]
fn handmade_cycle_is_reported() {
    // (1,1) -> (1,2) -> (2,2) -> (2,1) -> (1,1)
    let mut fdir = Raster::filled(4, 4, d8::SINK);
    fdir.set(1, 1, 1).unwrap();
    fdir.set(1, 2, 7).unwrap();
    fdir.set(2, 2, 5).unwrap();
    fdir.set(2, 1, 3).unwrap();
    // (0,1) feeds the cycle; it drains, the cycle cells never do
    fdir.set(0, 1, 7).unwrap();

    match flow_accumulation(&fdir, FlowAccumulationParams::default()) {
        Err(Error::CycleDetected { cells, row, col, rows, cols }) => {
            assert_eq!(cells, 4);
            assert_eq!((row, col), (1, 1));
            assert_eq!((rows, cols), (4, 4));
        }
        other => panic!("Expected CycleDetected, got {:?}", other.map(|a| a.shape())),
    }
}

#[test]
fn watershed_partitions_valid_cells() {
    init_tracing();
    // Ridge along column 3 with a nodata hole on the west slope
    let mut dem = Raster::from_fn(6, 7, |r, c| 10.0 - (c as f64 - 3.0).abs() + r as f64 * 0.1);
    dem.set(2, 1, f64::NAN).unwrap();

    let conditioned = condition(&dem, ConditionParams::default()).unwrap();
    let fdir = flow_direction(&conditioned.dem, FlowDirectionParams::default()).unwrap();
    let basins = watershed(&fdir, WatershedParams::default()).unwrap();

    assert_eq!(basins.get(2, 1).unwrap(), 0);
    for row in 0..6 {
        for col in 0..7 {
            if (row, col) != (2, 1) {
                assert!(basins.get(row, col).unwrap() > 0, "({}, {}) unlabelled", row, col);
            }
        }
    }

    // Each basin is the catchment of its outlet
    for (id, &(r, c)) in outlets(&fdir).iter().enumerate() {
        let mask = catchment(&fdir, &PourPoint::cell(r, c)).unwrap();
        let labelled = basins.data().iter().filter(|&&b| b == id as i32 + 1).count();
        assert_eq!(count(&mask), labelled);
    }
}
