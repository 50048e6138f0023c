//! Flow distance to a pour point
//!
//! Length of the D8 flow path from every cell of a catchment down to its
//! pour point, in map units. Diagonal steps use the real cell diagonal, so
//! rectangular cells are measured correctly.

use std::collections::VecDeque;
use ndarray::Array2;
use hydroshed_core::d8;
use hydroshed_core::raster::Raster;
use hydroshed_core::{Error, Result};

use super::common::{is_routed, upstream_cells};
use super::flow_accumulation::upstream_mask;
use super::watershed::PourPoint;

/// Flow-path distance from every cell draining to `pour_point`.
///
/// The pour point itself is 0; cells outside its catchment are NaN.
/// Each cell's distance is its receiver's plus the step between them,
/// filled in by a breadth-first walk upstream from the pour point.
pub fn flow_distance(flow_dir: &Raster<u8>, pour_point: &PourPoint) -> Result<Raster<f64>> {
    let (rows, cols) = flow_dir.shape();
    let (row, col) = pour_point.resolve(flow_dir)?;
    if !is_routed(unsafe { flow_dir.get_unchecked(row, col) }) {
        return Err(Error::PourPointOnNoData { row, col });
    }

    let (dx, dy) = flow_dir.cell_sizes();
    let step = d8::distances(dx, dy);
    let upstream = upstream_mask(flow_dir);

    let mut distance = Array2::from_elem((rows, cols), f64::NAN);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    distance[(row, col)] = 0.0;
    queue.push_back((row, col));

    while let Some((r, c)) = queue.pop_front() {
        let here = distance[(r, c)];
        for (dir, nr, nc) in upstream_cells(upstream[(r, c)], r, c, rows, cols) {
            if distance[(nr, nc)].is_nan() {
                distance[(nr, nc)] = here + step[dir as usize];
                queue.push_back((nr, nc));
            }
        }
    }

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = distance;
    Ok(output)
}
