//! DEM conditioning
//!
//! Runs pit filling, depression filling and flat resolution in sequence so
//! that every valid cell either has a strictly lower neighbour or sits on
//! the grid edge (border or next to nodata), where it can drain out.
//!
//! Cells that still cannot drain afterwards are reported, not rejected:
//! downstream components can run on a partially conditioned grid.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use hydroshed_core::d8;
use hydroshed_core::raster::Raster;
use hydroshed_core::{Algorithm, Error, Interrupt, Result};

use super::common::{is_edge, validate_dem};
use super::flats::{resolve_flats_in_place, FlatParams};
use super::pits::fill_pits_in_place;
use super::priority_flood::fill_depressions_in_place;

/// Maximum number of unresolved cell locations kept in a report
pub const UNRESOLVED_SAMPLE_LIMIT: usize = 16;

/// Parameters for DEM conditioning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionParams {
    /// Raise single-cell pits to their lowest neighbour
    pub fill_pits: bool,
    /// Fill depressions to their spill elevation
    pub fill_depressions: bool,
    /// Impose a gradient on flat areas
    pub resolve_flats: bool,
    /// Flat resolution settings
    pub flats: FlatParams,
    /// Polled while filling depressions
    #[serde(skip)]
    pub interrupt: Interrupt,
}

impl Default for ConditionParams {
    fn default() -> Self {
        Self {
            fill_pits: true,
            fill_depressions: true,
            resolve_flats: true,
            flats: FlatParams::default(),
            interrupt: Interrupt::none(),
        }
    }
}

/// What conditioning changed, and what it could not fix
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditioningReport {
    /// Single-cell pits raised to their lowest neighbour
    pub pits_filled: usize,
    /// Cells raised by depression filling
    pub cells_raised: usize,
    /// Flat cells given a gradient
    pub flat_cells_resolved: usize,
    /// Flat areas given a gradient
    pub terraces_resolved: usize,
    /// Valid cells off the grid edge that still have no lower neighbour
    pub unresolved_cells: usize,
    /// First unresolved locations as (row, col), in row-major order
    pub unresolved_sample: Vec<(usize, usize)>,
}

impl ConditioningReport {
    /// Whether every valid cell can drain
    pub fn is_complete(&self) -> bool {
        self.unresolved_cells == 0
    }
}

/// A conditioned DEM and the report describing it
#[derive(Debug, Clone)]
pub struct Conditioned {
    pub dem: Raster<f64>,
    pub report: ConditioningReport,
}

/// DEM conditioning algorithm
#[derive(Debug, Clone, Default)]
pub struct Conditioner;

impl Algorithm for Conditioner {
    type Input = Raster<f64>;
    type Output = Conditioned;
    type Params = ConditionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Conditioner"
    }

    fn description(&self) -> &'static str {
        "Fill pits and depressions, then resolve flats, so every cell drains"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        condition(input, params)
    }
}

/// Record every valid cell off the grid edge without a lower neighbour
fn verify(z: &Array2<f64>, nodata: &Array2<bool>, report: &mut ConditioningReport) {
    let (rows, cols) = z.dim();
    for row in 0..rows {
        for col in 0..cols {
            if nodata[(row, col)] || is_edge(nodata, row, col) {
                continue;
            }
            let center = z[(row, col)];
            let drains = d8::neighbors(row, col, rows, cols).any(|(_, nr, nc)| z[(nr, nc)] < center);
            if !drains {
                report.unresolved_cells += 1;
                if report.unresolved_sample.len() < UNRESOLVED_SAMPLE_LIMIT {
                    report.unresolved_sample.push((row, col));
                }
            }
        }
    }
}

/// Condition a DEM so that it drains everywhere.
///
/// # Arguments
/// * `dem` - Input DEM raster; it is not modified
/// * `params` - Which steps to run, and the interruption token
///
/// # Returns
/// The conditioned DEM with the same metadata, plus a report. An
/// incomplete report is logged as a warning and still returned as `Ok`.
///
/// # Errors
/// `InvalidDimensions` for an empty grid, `AllNoData` when no cell is
/// valid, `Interrupted` when the token fires.
pub fn condition(dem: &Raster<f64>, params: ConditionParams) -> Result<Conditioned> {
    params.flats.validate()?;
    let (nodata, valid) = validate_dem(dem)?;
    let (rows, cols) = dem.shape();
    debug!(rows, cols, valid, "conditioning DEM");

    let mut z = dem.data().clone();
    let mut report = ConditioningReport::default();

    if params.fill_pits {
        report.pits_filled = fill_pits_in_place(&mut z, &nodata);
        debug!(pits = report.pits_filled, "pits filled");
    }

    params.interrupt.check("conditioning")?;
    if params.fill_depressions {
        report.cells_raised = fill_depressions_in_place(&mut z, &nodata, &params.interrupt)?;
        debug!(raised = report.cells_raised, "depressions filled");
    }

    params.interrupt.check("conditioning")?;
    if params.resolve_flats {
        let summary = resolve_flats_in_place(&mut z, &nodata, &params.flats);
        report.flat_cells_resolved = summary.cells_raised;
        report.terraces_resolved = summary.terraces_resolved;
        debug!(
            cells = summary.cells_raised,
            terraces = summary.terraces_resolved,
            unresolved_terraces = summary.terraces_unresolved,
            "flats resolved"
        );
    }

    verify(&z, &nodata, &mut report);
    if !report.is_complete() {
        warn!(
            unresolved = report.unresolved_cells,
            sample = ?report.unresolved_sample,
            "conditioning left cells that cannot drain"
        );
    }

    let mut output = dem.like(0.0);
    *output.data_mut() = z;
    Ok(Conditioned { dem: output, report })
}
