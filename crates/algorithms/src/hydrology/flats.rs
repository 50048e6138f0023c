//! Flat resolution
//!
//! Gives every flat area of a filled DEM a tiny gradient so that D8
//! routing can drain it. A flat area ("terrace") is a maximal 8-connected
//! region of equal elevation containing at least one cell with no lower
//! neighbour.
//!
//! Each terrace is raised by two breadth-first distance transforms, after
//! Barnes, Lehman & Mulla (2014), "An efficient assignment of drainage
//! direction over flat surfaces in raster digital elevation models":
//!
//! - `towards`: steps to the nearest drain (a terrace cell with a lower
//!   neighbour), which makes every cell strictly higher than the cell it
//!   was reached from;
//! - `away`: steps from the nearest cell bordering higher terrain, inverted
//!   so the flat slopes away from the surrounding hills.
//!
//! A flat cell is raised by `(2·towards + away)·δ`. The factor 2 keeps the
//! descent strict where the two gradients disagree.
//!
//! A terrace with no lower neighbour at all drains through one outlet: its
//! first cell, in row-major order, on the grid border or next to nodata.

use std::collections::VecDeque;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use hydroshed_core::d8;
use hydroshed_core::raster::Raster;
use hydroshed_core::{Algorithm, Error, Result};

use super::common::{is_edge, validate_dem};

const UNSET: usize = usize::MAX;

/// Parameters for flat resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlatParams {
    /// Upper bound on the elevation step between consecutive cells of a
    /// resolved flat. The step actually used is smaller when the terrace
    /// has to stay below nearby higher terrain.
    pub max_increment: f64,
}

impl Default for FlatParams {
    fn default() -> Self {
        Self { max_increment: 1e-5 }
    }
}

impl FlatParams {
    pub fn validate(&self) -> Result<()> {
        if !self.max_increment.is_finite() || self.max_increment <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "max_increment",
                value: self.max_increment.to_string(),
                reason: "must be finite and positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Counters collected while resolving flats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FlatSummary {
    pub cells_raised: usize,
    pub terraces_resolved: usize,
    pub terraces_unresolved: usize,
}

enum Terrace {
    Resolved(usize),
    Undrainable,
    Unrepresentable,
}

/// Whether the cell has no strictly lower valid neighbour
fn is_flat(z: &Array2<f64>, nodata: &Array2<bool>, row: usize, col: usize) -> bool {
    let (rows, cols) = z.dim();
    let center = z[(row, col)];
    !d8::neighbors(row, col, rows, cols)
        .any(|(_, nr, nc)| !nodata[(nr, nc)] && z[(nr, nc)] < center)
}

/// Resolve all flats of `z` in place
pub(crate) fn resolve_flats_in_place(
    z: &mut Array2<f64>,
    nodata: &Array2<bool>,
    params: &FlatParams,
) -> FlatSummary {
    let (rows, cols) = z.dim();
    let orig = z.clone();
    let flat = Array2::from_shape_fn((rows, cols), |(r, c)| {
        !nodata[(r, c)] && is_flat(&orig, nodata, r, c)
    });

    let mut grid = TerraceGrid {
        orig: &orig,
        nodata,
        flat: &flat,
        label: Array2::zeros((rows, cols)),
        towards: Array2::from_elem((rows, cols), UNSET),
        away: Array2::from_elem((rows, cols), UNSET),
        queue: VecDeque::new(),
    };

    let mut summary = FlatSummary::default();
    let mut next_label = 0u32;

    for row in 0..rows {
        for col in 0..cols {
            if !flat[(row, col)] || grid.label[(row, col)] != 0 {
                continue;
            }
            next_label += 1;
            let cells = grid.collect(next_label, row, col);

            match grid.resolve(z, next_label, &cells, params) {
                Terrace::Resolved(0) => {}
                Terrace::Resolved(raised) => {
                    summary.cells_raised += raised;
                    summary.terraces_resolved += 1;
                }
                Terrace::Undrainable | Terrace::Unrepresentable => {
                    summary.terraces_unresolved += 1;
                }
            }
        }
    }

    summary
}

/// Scratch state shared by all terraces of one grid
struct TerraceGrid<'a> {
    orig: &'a Array2<f64>,
    nodata: &'a Array2<bool>,
    flat: &'a Array2<bool>,
    label: Array2<u32>,
    towards: Array2<usize>,
    away: Array2<usize>,
    queue: VecDeque<(usize, usize)>,
}

impl TerraceGrid<'_> {
    /// Label the terrace containing (row, col) and return its cells
    fn collect(&mut self, id: u32, row: usize, col: usize) -> Vec<(usize, usize)> {
        let (rows, cols) = self.orig.dim();
        let level = self.orig[(row, col)];
        let mut cells = vec![(row, col)];
        self.label[(row, col)] = id;

        let mut next = 0;
        while next < cells.len() {
            let (r, c) = cells[next];
            next += 1;
            for (_, nr, nc) in d8::neighbors(r, c, rows, cols) {
                if self.label[(nr, nc)] == 0
                    && !self.nodata[(nr, nc)]
                    && self.orig[(nr, nc)] == level
                {
                    self.label[(nr, nc)] = id;
                    cells.push((nr, nc));
                }
            }
        }

        cells
    }

    /// Breadth-first distances over terrace `id`, from `sources`.
    /// Only cells accepted by `admit` are entered.
    fn distances<F>(&mut self, away: bool, id: u32, sources: &[(usize, usize)], admit: F)
    where
        F: Fn(usize, usize) -> bool,
    {
        let (rows, cols) = self.orig.dim();
        let dist = if away { &mut self.away } else { &mut self.towards };

        self.queue.clear();
        for &(r, c) in sources {
            dist[(r, c)] = 0;
            self.queue.push_back((r, c));
        }

        while let Some((r, c)) = self.queue.pop_front() {
            let d = dist[(r, c)];
            for (_, nr, nc) in d8::neighbors(r, c, rows, cols) {
                if self.label[(nr, nc)] == id && dist[(nr, nc)] == UNSET && admit(nr, nc) {
                    dist[(nr, nc)] = d + 1;
                    self.queue.push_back((nr, nc));
                }
            }
        }
    }

    fn resolve(
        &mut self,
        z: &mut Array2<f64>,
        id: u32,
        cells: &[(usize, usize)],
        params: &FlatParams,
    ) -> Terrace {
        let (rows, cols) = self.orig.dim();
        let level = self.orig[cells[0]];

        let mut drains: Vec<(usize, usize)> = cells
            .iter()
            .copied()
            .filter(|&(r, c)| !self.flat[(r, c)])
            .collect();
        if drains.is_empty() {
            match cells.iter().copied().filter(|&(r, c)| is_edge(self.nodata, r, c)).min() {
                Some(outlet) => drains.push(outlet),
                None => return Terrace::Undrainable,
            }
        }
        if drains.len() == cells.len() {
            return Terrace::Resolved(0);
        }

        // Cells of the terrace bordering higher terrain, and the lowest
        // such terrain the raised surface has to stay under.
        let mut high_edges = Vec::new();
        let mut ceiling = f64::INFINITY;
        for &(r, c) in cells.iter().filter(|&&(r, c)| self.flat[(r, c)]) {
            let mut borders_higher = false;
            for (_, nr, nc) in d8::neighbors(r, c, rows, cols) {
                let n = self.orig[(nr, nc)];
                if !self.nodata[(nr, nc)] && n > level {
                    borders_higher = true;
                    ceiling = ceiling.min(n);
                }
            }
            if borders_higher {
                high_edges.push((r, c));
            }
        }

        self.distances(false, id, &drains, |_, _| true);
        let flat = self.flat;
        self.distances(true, id, &high_edges, |r, c| flat[(r, c)]);

        let max_away = cells
            .iter()
            .map(|&rc| self.away[rc])
            .filter(|&d| d != UNSET)
            .max()
            .unwrap_or(0);

        let increment = |rc: (usize, usize)| -> usize {
            let away = match self.away[rc] {
                UNSET => 0,
                d => max_away - d,
            };
            2 * self.towards[rc] + away
        };

        let raised: Vec<((usize, usize), usize)> = cells
            .iter()
            .copied()
            .filter(|&rc| self.towards[rc] > 0)
            .map(|rc| (rc, increment(rc)))
            .collect();
        let max_inc = raised.iter().map(|&(_, inc)| inc).max().unwrap_or(0);

        let delta = params
            .max_increment
            .min((ceiling - level) / (max_inc as f64 + 1.0));
        let top = level + max_inc as f64 * delta;
        if !(top < ceiling) || delta <= level.abs().max(top.abs()) * f64::EPSILON * 2.0 {
            return Terrace::Unrepresentable;
        }

        for &(rc, inc) in &raised {
            z[rc] = level + inc as f64 * delta;
        }

        Terrace::Resolved(raised.len())
    }
}

/// Flat resolution algorithm
#[derive(Debug, Clone, Default)]
pub struct ResolveFlats;

impl Algorithm for ResolveFlats {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = FlatParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ResolveFlats"
    }

    fn description(&self) -> &'static str {
        "Impose a drainable micro-gradient on flat areas"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        resolve_flats(input, params)
    }
}

/// Give every drainable flat area a gradient towards its outlet.
///
/// Expects a DEM without depressions; enclosed flats that cannot reach a
/// lower cell or the grid edge are left unchanged.
pub fn resolve_flats(dem: &Raster<f64>, params: FlatParams) -> Result<Raster<f64>> {
    params.validate()?;
    let (nodata, _) = validate_dem(dem)?;
    let mut z = dem.data().clone();
    resolve_flats_in_place(&mut z, &nodata, &params);

    let mut output = dem.like(0.0);
    *output.data_mut() = z;
    Ok(output)
}

/// Mask of cells on flat areas: valid cells with no lower neighbour and at
/// least one neighbour of equal elevation.
pub fn detect_flats(dem: &Raster<f64>) -> Result<Raster<bool>> {
    let (nodata, _) = validate_dem(dem)?;
    let (rows, cols) = dem.shape();
    let z = dem.data();

    let mut output = dem.with_same_meta::<bool>(rows, cols);
    for row in 0..rows {
        for col in 0..cols {
            if nodata[(row, col)] || !is_flat(z, &nodata, row, col) {
                continue;
            }
            let center = z[(row, col)];
            let has_equal = d8::neighbors(row, col, rows, cols)
                .any(|(_, nr, nc)| !nodata[(nr, nc)] && z[(nr, nc)] == center);
            output.data_mut()[(row, col)] = has_equal;
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drains(z: &Array2<f64>, row: usize, col: usize) -> bool {
        let (rows, cols) = z.dim();
        d8::neighbors(row, col, rows, cols).any(|(_, nr, nc)| z[(nr, nc)] < z[(row, col)])
    }

    /// 5x5 rim at 10 around a 3x3 plateau at 5, with a low border cell at (2,4)
    fn plateau_with_outlet() -> Raster<f64> {
        let mut dem = Raster::from_fn(5, 5, |r, c| {
            if r == 0 || r == 4 || c == 0 || c == 4 { 10.0 } else { 5.0 }
        });
        dem.set(2, 4, 4.0).unwrap();
        dem
    }

    #[test]
    fn test_plateau_drains_to_low_edge() {
        let resolved = resolve_flats(&plateau_with_outlet(), FlatParams::default()).unwrap();
        let z = resolved.data();

        for r in 1..4 {
            for c in 1..4 {
                assert!(drains(z, r, c), "({}, {}) still flat", r, c);
                assert!(z[(r, c)] < 10.0);
                assert!(z[(r, c)] >= 5.0);
            }
        }
        // Low edges are not raised
        assert_eq!(z[(2, 3)], 5.0);
        assert_eq!(z[(1, 3)], 5.0);
        // The far side of the plateau ends up highest
        assert!(z[(2, 1)] > z[(2, 2)]);
    }

    #[test]
    fn test_flat_grid_drains_to_first_border_cell() {
        let dem = Raster::filled(3, 3, 10.0);
        let resolved = resolve_flats(&dem, FlatParams::default()).unwrap();
        let z = resolved.data();

        assert_eq!(z[(0, 0)], 10.0);
        for r in 0..3 {
            for c in 0..3 {
                if (r, c) != (0, 0) {
                    assert!(drains(z, r, c));
                }
            }
        }
        approx::assert_relative_eq!(z[(2, 2)], 10.0 + 4.0 * 1e-5, epsilon = 1e-12);
    }

    #[test]
    fn test_enclosed_flat_is_left_unresolved() {
        let dem = Raster::from_fn(5, 5, |r, c| {
            if r == 0 || r == 4 || c == 0 || c == 4 { 10.0 } else { 2.0 }
        });
        let (nodata, _) = validate_dem(&dem).unwrap();
        let mut z = dem.data().clone();
        let summary = resolve_flats_in_place(&mut z, &nodata, &FlatParams::default());

        // The basin floor has no lower neighbour and never touches the edge
        assert_eq!(summary.terraces_unresolved, 1);
        assert_eq!(z[(2, 2)], 2.0);
    }

    #[test]
    fn test_unrepresentable_increment_leaves_terrace() {
        let dem = Raster::filled(3, 3, 1e15);
        let (nodata, _) = validate_dem(&dem).unwrap();
        let mut z = dem.data().clone();
        let summary = resolve_flats_in_place(&mut z, &nodata, &FlatParams::default());

        assert_eq!(summary.terraces_unresolved, 1);
        assert_eq!(summary.cells_raised, 0);
        assert!(z.iter().all(|&v| v == 1e15));
    }

    #[test]
    fn test_stays_below_higher_terrain() {
        // Plateau at 5 with a rim barely above it
        let mut dem = Raster::from_fn(5, 5, |r, c| {
            if r == 0 || r == 4 || c == 0 || c == 4 { 5.0 + 1e-7 } else { 5.0 }
        });
        dem.set(2, 4, 4.0).unwrap();
        let resolved = resolve_flats(&dem, FlatParams::default()).unwrap();

        for r in 1..4 {
            for c in 1..4 {
                assert!(resolved.get(r, c).unwrap() < 5.0 + 1e-7);
            }
        }
    }

    #[test]
    fn test_invalid_max_increment() {
        let dem = Raster::filled(3, 3, 1.0);
        let params = FlatParams { max_increment: 0.0 };
        assert!(matches!(
            resolve_flats(&dem, params),
            Err(Error::InvalidParameter { name: "max_increment", .. })
        ));
    }

    #[test]
    fn test_detect_flats() {
        let mask = detect_flats(&plateau_with_outlet()).unwrap();
        assert!(mask.get(2, 2).unwrap());
        // Has a lower neighbour
        assert!(!mask.get(2, 3).unwrap());
        // Outlet has no equal neighbour
        assert!(!mask.get(2, 4).unwrap());
    }
}
