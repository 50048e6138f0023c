//! Helpers shared by the hydrology components

use ndarray::Array2;
use hydroshed_core::d8;
use hydroshed_core::raster::Raster;
use hydroshed_core::{Error, Result};

/// Interruption is polled once per this many processed cells in sweeps
/// that have no natural wave boundary.
pub(crate) const INTERRUPT_STRIDE: usize = 1 << 16;

/// `true` for cells excluded from flow computations: the raster's nodata
/// sentinel, NaN, and infinities.
pub(crate) fn nodata_mask(dem: &Raster<f64>) -> Array2<bool> {
    dem.data().mapv(|v| !v.is_finite() || dem.is_nodata(v))
}

/// Reject grids no flow computation can run on.
///
/// Returns the nodata mask and the number of valid cells.
pub(crate) fn validate_dem(dem: &Raster<f64>) -> Result<(Array2<bool>, usize)> {
    let (rows, cols) = dem.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let nodata = nodata_mask(dem);
    let valid = nodata.iter().filter(|&&nd| !nd).count();
    if valid == 0 {
        return Err(Error::AllNoData { rows, cols });
    }

    Ok((nodata, valid))
}

/// Whether (row, col) can drain out of the grid: it sits on the border
/// or touches a nodata cell.
pub(crate) fn is_edge(nodata: &Array2<bool>, row: usize, col: usize) -> bool {
    let (rows, cols) = nodata.dim();
    if row == 0 || col == 0 || row + 1 == rows || col + 1 == cols {
        return true;
    }
    d8::neighbors(row, col, rows, cols).any(|(_, nr, nc)| nodata[(nr, nc)])
}

/// Whether a flow direction code marks a cell that takes part in routing
#[inline]
pub(crate) fn is_routed(code: u8) -> bool {
    code != d8::NODATA
}

/// The valid in-grid cell a routed cell drains into, if any
#[inline]
pub(crate) fn downstream(flow_dir: &Raster<u8>, row: usize, col: usize) -> Option<(usize, usize)> {
    let (rows, cols) = flow_dir.shape();
    let code = unsafe { flow_dir.get_unchecked(row, col) };
    let (nr, nc) = d8::target(code, row, col, rows, cols)?;
    let receiver = unsafe { flow_dir.get_unchecked(nr, nc) };
    if is_routed(receiver) {
        Some((nr, nc))
    } else {
        None
    }
}

/// Neighbours draining directly into (row, col), as `(direction, row, col)`,
/// read from the cell's bits in [`upstream_mask`].
///
/// [`upstream_mask`]: super::upstream_mask
pub(crate) fn upstream_cells(
    bits: u8,
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
) -> impl Iterator<Item = (u8, usize, usize)> {
    d8::DIRECTIONS
        .into_iter()
        .filter(move |&dir| bits & (1 << (dir - 1)) != 0)
        .filter_map(move |dir| d8::target(dir, row, col, rows, cols).map(|(r, c)| (dir, r, c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_all_nodata() {
        let mut dem = Raster::filled(3, 4, -9999.0);
        dem.set_nodata(Some(-9999.0));
        assert!(matches!(
            validate_dem(&dem),
            Err(Error::AllNoData { rows: 3, cols: 4 })
        ));
    }

    #[test]
    fn test_edge_includes_nodata_neighbors() {
        let mut dem = Raster::filled(5, 5, 1.0);
        dem.set(2, 2, f64::NAN).unwrap();
        let (nodata, valid) = validate_dem(&dem).unwrap();
        assert_eq!(valid, 24);
        assert!(is_edge(&nodata, 0, 3));
        assert!(is_edge(&nodata, 1, 1));
        assert!(!is_edge(&Array2::from_elem((5, 5), false), 1, 1));
    }

    #[test]
    fn test_upstream_cells_from_bits() {
        // Bits for E (1) and S (7)
        let bits = 1 | (1 << 6);
        let cells: Vec<_> = upstream_cells(bits, 1, 1, 3, 3).collect();
        assert_eq!(cells, vec![(1, 1, 2), (7, 2, 1)]);
    }
}
