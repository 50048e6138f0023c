//! Single-cell pit detection and filling
//!
//! A pit is an interior cell strictly lower than all eight neighbours.
//! Cells on the grid border or next to nodata are never pits: they are
//! potential outlets.

use ndarray::Array2;
use hydroshed_core::d8;
use hydroshed_core::raster::Raster;
use hydroshed_core::Result;

use super::common::{is_edge, validate_dem};

/// Lowest valid neighbour elevation of (row, col) if the cell is a pit
fn pit_spill(z: &Array2<f64>, nodata: &Array2<bool>, row: usize, col: usize) -> Option<f64> {
    if nodata[(row, col)] || is_edge(nodata, row, col) {
        return None;
    }
    let (rows, cols) = z.dim();
    let center = z[(row, col)];
    let mut lowest = f64::INFINITY;

    for (_, nr, nc) in d8::neighbors(row, col, rows, cols) {
        let n = z[(nr, nc)];
        if n <= center {
            return None;
        }
        lowest = lowest.min(n);
    }

    Some(lowest)
}

/// Raise every pit to its lowest neighbour. Returns the number raised.
///
/// Two pits are never adjacent, so raising one cannot change whether
/// another is a pit.
pub(crate) fn fill_pits_in_place(z: &mut Array2<f64>, nodata: &Array2<bool>) -> usize {
    let (rows, cols) = z.dim();
    let mut filled = 0;

    for row in 1..rows.saturating_sub(1) {
        for col in 1..cols.saturating_sub(1) {
            if let Some(spill) = pit_spill(z, nodata, row, col) {
                z[(row, col)] = spill;
                filled += 1;
            }
        }
    }

    filled
}

/// Mask of single-cell pits in a DEM
pub fn detect_pits(dem: &Raster<f64>) -> Result<Raster<bool>> {
    let (nodata, _) = validate_dem(dem)?;
    let (rows, cols) = dem.shape();
    let z = dem.data();

    let mut output = dem.with_same_meta::<bool>(rows, cols);
    for row in 1..rows.saturating_sub(1) {
        for col in 1..cols.saturating_sub(1) {
            if pit_spill(z, &nodata, row, col).is_some() {
                output.data_mut()[(row, col)] = true;
            }
        }
    }

    Ok(output)
}

/// Fill single-cell pits, raising each to its lowest neighbour.
///
/// Multi-cell depressions are left alone; see [`fill_depressions`].
///
/// [`fill_depressions`]: super::fill_depressions
pub fn fill_pits(dem: &Raster<f64>) -> Result<Raster<f64>> {
    let (nodata, _) = validate_dem(dem)?;
    let mut z = dem.data().clone();
    fill_pits_in_place(&mut z, &nodata);

    let mut output = dem.like(0.0);
    *output.data_mut() = z;
    Ok(output)
}
