//! Pour-point snapping
//!
//! Moves an approximate outlet onto the nearest cell of a candidate mask,
//! typically the cells whose accumulation passes a stream threshold.

use hydroshed_core::raster::Raster;
use hydroshed_core::{Error, Result};

use super::stream_network::accumulation_mask;
use super::watershed::PourPoint;

/// The true cell of `mask` whose center is nearest to `point`.
///
/// Distance is Euclidean in map units, using the cell width and height.
/// Among equally near cells the first in row-major order wins. A `Cell`
/// point is measured from its cell center; a `Coord` point may lie outside
/// the grid extent.
///
/// # Errors
/// - `EmptyMask` when no cell is true
/// - `IndexOutOfBounds` for a `Cell` outside the grid
/// - `CoordinateOutOfBounds` for a non-finite `Coord`
pub fn snap_pour_point(mask: &Raster<bool>, point: &PourPoint) -> Result<(usize, usize)> {
    let (rows, cols) = mask.shape();

    // Target in fractional pixel space, where cell centers sit at .5
    let (pc, pr) = match *point {
        PourPoint::Cell { .. } => {
            let (row, col) = point.resolve(mask)?;
            (col as f64 + 0.5, row as f64 + 0.5)
        }
        PourPoint::Coord { x, y } => {
            let (pc, pr) = mask.geo_to_pixel(x, y);
            if !pc.is_finite() || !pr.is_finite() {
                return Err(Error::CoordinateOutOfBounds {
                    x,
                    y,
                    bounds: mask.bounds(),
                });
            }
            (pc, pr)
        }
    };

    let (dx, dy) = mask.cell_sizes();
    let mut best: Option<((usize, usize), f64)> = None;

    for row in 0..rows {
        for col in 0..cols {
            if !unsafe { mask.get_unchecked(row, col) } {
                continue;
            }
            let ex = (col as f64 + 0.5 - pc) * dx;
            let ey = (row as f64 + 0.5 - pr) * dy;
            let d2 = ex * ex + ey * ey;
            if best.map_or(true, |(_, b)| d2 < b) {
                best = Some(((row, col), d2));
            }
        }
    }

    best.map(|(cell, _)| cell)
        .ok_or(Error::EmptyMask { rows, cols })
}

/// Snap `point` to the nearest cell with accumulation >= `threshold`
pub fn snap_to_accumulation(
    flow_acc: &Raster<f64>,
    threshold: f64,
    point: &PourPoint,
) -> Result<(usize, usize)> {
    let mask = accumulation_mask(flow_acc, threshold)?;
    snap_pour_point(&mask, point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroshed_core::GeoTransform;

    fn mask_with(rows: usize, cols: usize, cells: &[(usize, usize)]) -> Raster<bool> {
        let mut mask = Raster::filled(rows, cols, false);
        for &(r, c) in cells {
            mask.set(r, c, true).unwrap();
        }
        mask
    }

    #[test]
    fn test_snaps_to_nearest() {
        let mask = mask_with(5, 5, &[(0, 0), (3, 4)]);
        assert_eq!(snap_pour_point(&mask, &PourPoint::cell(4, 4)).unwrap(), (3, 4));
        assert_eq!(snap_pour_point(&mask, &PourPoint::cell(1, 1)).unwrap(), (0, 0));
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let mask = mask_with(3, 3, &[(2, 1), (1, 0), (0, 1)]);
        assert_eq!(snap_pour_point(&mask, &PourPoint::cell(1, 1)).unwrap(), (0, 1));
    }

    #[test]
    fn test_point_on_candidate_stays() {
        let mask = mask_with(3, 3, &[(1, 1), (1, 2)]);
        assert_eq!(snap_pour_point(&mask, &PourPoint::cell(1, 2)).unwrap(), (1, 2));
    }

    #[test]
    fn test_rectangular_cells() {
        // dx = 1, dy = 10: two columns away is nearer than one row away
        let mut mask = mask_with(3, 3, &[(0, 2), (1, 0)]);
        mask.set_transform(GeoTransform::new(0.0, 30.0, 1.0, -10.0));
        assert_eq!(snap_pour_point(&mask, &PourPoint::cell(0, 0)).unwrap(), (0, 2));
    }

    #[test]
    fn test_coordinate_outside_extent() {
        let mut mask = mask_with(4, 4, &[(0, 3), (3, 0)]);
        mask.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        // Far to the east of the top row
        let snapped = snap_pour_point(&mask, &PourPoint::coord(50.0, 3.5)).unwrap();
        assert_eq!(snapped, (0, 3));
    }

    #[test]
    fn test_empty_mask() {
        let mask = mask_with(3, 2, &[]);
        assert!(matches!(
            snap_pour_point(&mask, &PourPoint::cell(0, 0)),
            Err(Error::EmptyMask { rows: 3, cols: 2 })
        ));
    }

    #[test]
    fn test_snap_to_accumulation() {
        let acc = Raster::from_fn(5, 5, |row, _| (row + 1) as f64);
        let snapped = snap_to_accumulation(&acc, 5.0, &PourPoint::cell(0, 2)).unwrap();
        assert_eq!(snapped, (4, 2));
        assert!(acc.get(snapped.0, snapped.1).unwrap() >= 5.0);
    }
}
