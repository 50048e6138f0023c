//! Catchment and watershed delineation
//!
//! Traces drainage upstream from pour points over the inverse of a D8 flow
//! direction raster. Supports:
//! - One pour point: a boolean catchment mask
//! - Several pour points: basin labels, nested points carving out their
//!   own sub-basins
//! - No pour points: every outlet labels its own basin, partitioning the
//!   grid

use std::collections::VecDeque;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;
use hydroshed_core::raster::{Raster, RasterElement};
use hydroshed_core::{Algorithm, Error, Interrupt, Result};

use super::common::{downstream, is_routed, upstream_cells, INTERRUPT_STRIDE};
use super::flow_accumulation::upstream_mask;

/// An outlet location, as a cell index or map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PourPoint {
    Cell { row: usize, col: usize },
    Coord { x: f64, y: f64 },
}

impl PourPoint {
    pub fn cell(row: usize, col: usize) -> Self {
        Self::Cell { row, col }
    }

    pub fn coord(x: f64, y: f64) -> Self {
        Self::Coord { x, y }
    }

    /// The (row, col) this point falls on in `grid`.
    ///
    /// Coordinates map to the cell whose center is nearest.
    ///
    /// # Errors
    /// `IndexOutOfBounds` for a cell outside the grid,
    /// `CoordinateOutOfBounds` for a coordinate outside its extent.
    pub fn resolve<T: RasterElement>(&self, grid: &Raster<T>) -> Result<(usize, usize)> {
        match *self {
            PourPoint::Cell { row, col } => {
                let (rows, cols) = grid.shape();
                if row < rows && col < cols {
                    Ok((row, col))
                } else {
                    Err(Error::IndexOutOfBounds { row, col, rows, cols })
                }
            }
            PourPoint::Coord { x, y } => grid.geo_to_cell(x, y),
        }
    }
}

/// Resolve a pour point against a flow direction grid, rejecting nodata
fn resolve_routed(flow_dir: &Raster<u8>, pour_point: &PourPoint) -> Result<(usize, usize)> {
    let (row, col) = pour_point.resolve(flow_dir)?;
    if !is_routed(unsafe { flow_dir.get_unchecked(row, col) }) {
        return Err(Error::PourPointOnNoData { row, col });
    }
    Ok((row, col))
}

/// Mask of every cell draining to the pour point, the pour point included.
///
/// # Errors
/// Pour point resolution errors, and `PourPointOnNoData`.
pub fn catchment(flow_dir: &Raster<u8>, pour_point: &PourPoint) -> Result<Raster<bool>> {
    catchment_with_interrupt(flow_dir, pour_point, &Interrupt::none())
}

/// [`catchment`], polling `interrupt` during the traversal
pub fn catchment_with_interrupt(
    flow_dir: &Raster<u8>,
    pour_point: &PourPoint,
    interrupt: &Interrupt,
) -> Result<Raster<bool>> {
    let (rows, cols) = flow_dir.shape();
    let seed = resolve_routed(flow_dir, pour_point)?;
    interrupt.check("catchment delineation")?;

    let upstream = upstream_mask(flow_dir);
    let mut mask = Array2::from_elem((rows, cols), false);
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
    mask[seed] = true;
    queue.push_back(seed);

    let mut visited = 0usize;
    while let Some((row, col)) = queue.pop_front() {
        visited += 1;
        if visited % INTERRUPT_STRIDE == 0 {
            interrupt.check("catchment delineation")?;
        }

        for (_, nr, nc) in upstream_cells(upstream[(row, col)], row, col, rows, cols) {
            if !mask[(nr, nc)] {
                mask[(nr, nc)] = true;
                queue.push_back((nr, nc));
            }
        }
    }
    debug!(row = seed.0, col = seed.1, cells = visited, "catchment delineated");

    let mut output = flow_dir.with_same_meta::<bool>(rows, cols);
    *output.data_mut() = mask;
    Ok(output)
}

/// Parameters for watershed delineation
#[derive(Debug, Clone, Default)]
pub struct WatershedParams {
    /// Pour points; basin ids are their 1-based positions.
    /// If empty, all independent basins are delineated.
    pub pour_points: Vec<PourPoint>,
}

/// Watershed delineation algorithm
#[derive(Debug, Clone, Default)]
pub struct Watershed;

impl Algorithm for Watershed {
    type Input = Raster<u8>;
    type Output = Raster<i32>;
    type Params = WatershedParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Watershed"
    }

    fn description(&self) -> &'static str {
        "Delineate watersheds from D8 flow direction"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        watershed(input, params)
    }
}

/// Delineate watersheds from a D8 flow direction raster.
///
/// # Modes
///
/// - **Pour points provided**: pour point `i` labels basin `i + 1`. Every
///   cell takes the label of the nearest pour point downstream of it, so a
///   pour point inside another's basin splits off its own sub-basin. A
///   repeated cell keeps its first label.
///
/// - **No pour points**: every outlet (a sink, or a cell draining off the
///   grid or into nodata) seeds a basin, numbered in row-major order, and
///   the entire grid is partitioned.
///
/// # Returns
/// Raster<i32> with basin labels (0 = unassigned/nodata)
pub fn watershed(flow_dir: &Raster<u8>, params: WatershedParams) -> Result<Raster<i32>> {
    let (rows, cols) = flow_dir.shape();
    let mut basins = Array2::<i32>::zeros((rows, cols));
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    if params.pour_points.is_empty() {
        for (id, cell) in outlets(flow_dir).into_iter().enumerate() {
            basins[cell] = (id + 1) as i32;
            queue.push_back(cell);
        }
    } else {
        for (id, pour_point) in params.pour_points.iter().enumerate() {
            let cell = resolve_routed(flow_dir, pour_point)?;
            if basins[cell] == 0 {
                basins[cell] = (id + 1) as i32;
                queue.push_back(cell);
            }
        }
    }
    debug!(seeds = queue.len(), "watershed seeded");

    let upstream = upstream_mask(flow_dir);
    while let Some((row, col)) = queue.pop_front() {
        let basin_id = basins[(row, col)];
        for (_, nr, nc) in upstream_cells(upstream[(row, col)], row, col, rows, cols) {
            if basins[(nr, nc)] == 0 {
                basins[(nr, nc)] = basin_id;
                queue.push_back((nr, nc));
            }
        }
    }

    let mut output = flow_dir.with_same_meta::<i32>(rows, cols);
    output.set_nodata(Some(0));
    *output.data_mut() = basins;

    Ok(output)
}

/// Outlet cells of a flow direction grid in row-major order: sinks, and
/// cells draining off the grid or into nodata
pub fn outlets(flow_dir: &Raster<u8>) -> Vec<(usize, usize)> {
    let (rows, cols) = flow_dir.shape();
    let mut found = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let dir = unsafe { flow_dir.get_unchecked(row, col) };
            if is_routed(dir) && downstream(flow_dir, row, col).is_none() {
                found.push((row, col));
            }
        }
    }
    found
}
