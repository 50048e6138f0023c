//! End-to-end watershed delineation
//!
//! Chains the hydrology components in their data-flow order:
//!
//! ```text
//! DEM -> condition -> flow_direction -> flow_accumulation
//!                                    \-> snap -> catchment
//! ```
//!
//! Each stage runs inside a `tracing` span and logs its duration.

mod config;

pub use config::{AccumulationWeights, PipelineConfig};

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span};
use hydroshed_core::raster::Raster;
use hydroshed_core::{Error, Interrupt, Result};

use crate::hydrology::{
    catchment_with_interrupt, condition, flow_accumulation, flow_direction, snap_to_accumulation,
    ConditionParams, ConditioningReport, FlowAccumulationParams, PourPoint,
};

/// Everything a pipeline run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Conditioned DEM
    pub conditioned: Raster<f64>,
    pub report: ConditioningReport,
    /// D8 flow direction codes
    pub flow_dir: Raster<u8>,
    pub accumulation: Raster<f64>,
    /// The (row, col) the catchment was traced from, after snapping
    pub pour_point: (usize, usize),
    pub catchment: Raster<bool>,
}

/// Configured watershed delineation run.
///
/// # Example
///
/// ```
/// use hydroshed_algorithms::pipeline::{PipelineConfig, WatershedPipeline};
/// use hydroshed_algorithms::hydrology::PourPoint;
/// use hydroshed_core::Raster;
///
/// let dem = Raster::from_fn(5, 5, |r, c| 10.0 * (c as f64 - 2.0).abs() + (4 - r) as f64);
/// let config = PipelineConfig { accumulation_threshold: 5.0, ..Default::default() };
///
/// let output = WatershedPipeline::new(config)
///     .run(&dem, &PourPoint::cell(4, 2))
///     .unwrap();
/// assert_eq!(output.accumulation.get(4, 2).unwrap(), 25.0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct WatershedPipeline {
    config: PipelineConfig,
    weights: Option<Arc<Raster<f64>>>,
    interrupt: Interrupt,
}

fn stage<T>(name: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let span = info_span!("stage", name);
    let _guard = span.enter();
    let start = Instant::now();
    let result = f();
    info!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1e3,
        ok = result.is_ok(),
        "stage finished"
    );
    result
}

impl WatershedPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            weights: None,
            interrupt: Interrupt::none(),
        }
    }

    /// Weight raster used when the configuration asks for
    /// [`AccumulationWeights::Grid`]
    pub fn with_weights(mut self, weights: Arc<Raster<f64>>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Token polled by every stage
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Delineate the catchment of `pour_point` on `dem`.
    ///
    /// The caller's DEM is never modified; a nodata override is applied to
    /// a copy.
    pub fn run(&self, dem: &Raster<f64>, pour_point: &PourPoint) -> Result<PipelineOutput> {
        let config = &self.config;
        config.validate()?;

        let weights = match config.accumulation_weights {
            AccumulationWeights::Uniform => None,
            AccumulationWeights::Grid => Some(self.weights.clone().ok_or_else(|| {
                Error::InvalidParameter {
                    name: "accumulation_weights",
                    value: "grid".to_string(),
                    reason: "no weight raster supplied".to_string(),
                }
            })?),
        };

        let dem: Cow<'_, Raster<f64>> = match config.nodata {
            Some(nodata) => {
                let mut copy = dem.clone();
                copy.set_nodata(Some(nodata));
                Cow::Owned(copy)
            }
            None => Cow::Borrowed(dem),
        };
        let (rows, cols) = dem.shape();
        info!(rows, cols, "running watershed pipeline");

        let conditioned = stage("condition", || {
            condition(
                &dem,
                ConditionParams {
                    interrupt: self.interrupt.clone(),
                    ..config.conditioning.clone()
                },
            )
        })?;
        info!(
            pits = conditioned.report.pits_filled,
            raised = conditioned.report.cells_raised,
            flats = conditioned.report.flat_cells_resolved,
            unresolved = conditioned.report.unresolved_cells,
            "conditioning report"
        );

        self.interrupt.check("flow direction")?;
        let flow_dir = stage("flow_direction", || {
            flow_direction(&conditioned.dem, config.flow_direction_params())
        })?;

        let accumulation = stage("flow_accumulation", || {
            flow_accumulation(
                &flow_dir,
                FlowAccumulationParams {
                    weights,
                    interrupt: self.interrupt.clone(),
                },
            )
        })?;

        let cell = if config.snap_pour_point {
            stage("snap", || {
                snap_to_accumulation(&accumulation, config.accumulation_threshold, pour_point)
            })?
        } else {
            pour_point.resolve(&flow_dir)?
        };

        let catchment = stage("catchment", || {
            catchment_with_interrupt(&flow_dir, &PourPoint::cell(cell.0, cell.1), &self.interrupt)
        })?;

        Ok(PipelineOutput {
            conditioned: conditioned.dem,
            report: conditioned.report,
            flow_dir,
            accumulation,
            pour_point: cell,
            catchment,
        })
    }
}
