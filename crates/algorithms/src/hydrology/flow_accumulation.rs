//! Flow accumulation algorithm
//!
//! Calculates, for every cell, the number of cells (or the sum of their
//! weights) that drain through it, the cell itself included.
//!
//! The D8 grid is a functional graph: each routed cell has at most one
//! receiver. Accumulation is a topological sweep over it (Kahn's
//! algorithm), processed in waves of ready cells with no recursion.

use std::sync::Arc;
use ndarray::Array2;
use tracing::debug;
use crate::maybe_rayon::*;
use hydroshed_core::d8;
use hydroshed_core::raster::Raster;
use hydroshed_core::{Algorithm, Error, Interrupt, Result};

use super::common::{downstream, is_routed};

/// Parameters for flow accumulation
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulationParams {
    /// Per-cell weights, same shape as the flow direction grid.
    /// `None` counts cells. Nodata weights contribute 0.
    pub weights: Option<Arc<Raster<f64>>>,
    /// Checked between processing waves
    pub interrupt: Interrupt,
}

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    type Input = Raster<u8>;
    type Output = Raster<f64>;
    type Params = FlowAccumulationParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Calculate upstream contributing area from D8 flow direction"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        flow_accumulation(input, params)
    }
}

/// Inverse adjacency of a D8 grid.
///
/// Bit `dir - 1` of a cell is set when its neighbour in direction `dir`
/// drains into it. Nodata cells receive nothing.
pub fn upstream_mask(flow_dir: &Raster<u8>) -> Array2<u8> {
    let (rows, cols) = flow_dir.shape();

    let data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    if !is_routed(unsafe { flow_dir.get_unchecked(row, col) }) {
                        return 0;
                    }
                    let mut mask = 0u8;
                    for &dir in &d8::DIRECTIONS {
                        if let Some((nr, nc)) = d8::target(dir, row, col, rows, cols) {
                            if unsafe { flow_dir.get_unchecked(nr, nc) } == d8::opposite(dir) {
                                mask |= 1 << (dir - 1);
                            }
                        }
                    }
                    mask
                })
                .collect::<Vec<u8>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).unwrap_or_else(|_| Array2::zeros((rows, cols)))
}

/// Calculate flow accumulation from a D8 flow direction raster.
///
/// Each routed cell starts at its own weight (1 without weights) and passes
/// its running total to its receiver once everything upstream of it is in.
/// Flow leaving the grid or entering nodata stops there.
///
/// # Arguments
/// * `flow_dir` - D8 flow direction raster (output from `flow_direction`)
/// * `params` - Optional weights and interruption token
///
/// # Returns
/// Raster<f64> with flow accumulation values; nodata cells are NaN.
///
/// # Errors
/// - `SizeMismatch` when the weights do not match the flow direction grid
/// - `CycleDetected` when some cells never become ready, which means the
///   direction grid is not acyclic
/// - `Interrupted` when the token fires
pub fn flow_accumulation(flow_dir: &Raster<u8>, params: FlowAccumulationParams) -> Result<Raster<f64>> {
    let (rows, cols) = flow_dir.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    if let Some(weights) = &params.weights {
        flow_dir.ensure_same_shape(weights.as_ref())?;
    }

    let upstream = upstream_mask(flow_dir);
    let mut pending = upstream.mapv(|m| m.count_ones() as u8);

    let weight_at = |row: usize, col: usize| -> f64 {
        match &params.weights {
            None => 1.0,
            Some(w) => {
                let v = unsafe { w.get_unchecked(row, col) };
                if !v.is_finite() || w.is_nodata(v) { 0.0 } else { v }
            }
        }
    };

    let mut accumulation = Array2::from_shape_fn((rows, cols), |(r, c)| {
        if is_routed(unsafe { flow_dir.get_unchecked(r, c) }) {
            weight_at(r, c)
        } else {
            f64::NAN
        }
    });

    let mut valid = 0usize;
    let mut wave: Vec<(usize, usize)> = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            if is_routed(unsafe { flow_dir.get_unchecked(row, col) }) {
                valid += 1;
                if pending[(row, col)] == 0 {
                    wave.push((row, col));
                }
            }
        }
    }

    let mut processed = 0usize;
    let mut waves = 0usize;
    while !wave.is_empty() {
        params.interrupt.check("flow accumulation")?;

        let mut next = Vec::new();
        for &(row, col) in &wave {
            processed += 1;
            if let Some((nr, nc)) = downstream(flow_dir, row, col) {
                accumulation[(nr, nc)] += accumulation[(row, col)];
                pending[(nr, nc)] -= 1;
                if pending[(nr, nc)] == 0 {
                    next.push((nr, nc));
                }
            }
        }

        wave = next;
        waves += 1;
    }
    debug!(rows, cols, valid, waves, "flow accumulation swept");

    if processed < valid {
        let (row, col) = pending
            .indexed_iter()
            .find(|&(_, &p)| p > 0)
            .map(|(rc, _)| rc)
            .unwrap_or((0, 0));
        return Err(Error::CycleDetected {
            cells: valid - processed,
            row,
            col,
            rows,
            cols,
        });
    }

    let mut output = flow_dir.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() = accumulation;

    Ok(output)
}
