//! D8 flow direction algorithm
//!
//! Calculates the direction of flow from each cell to its steepest
//! downslope neighbor using the D8 (deterministic eight-node) method.
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = sink (no outflow), 1-8 = direction to steepest neighbor,
//! 255 = nodata

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use crate::maybe_rayon::*;
use hydroshed_core::d8;
use hydroshed_core::raster::Raster;
use hydroshed_core::{Algorithm, Error, Result};

use super::common::validate_dem;

/// Flow routing scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RoutingScheme {
    /// Single flow direction to the steepest of the eight neighbours
    #[default]
    #[serde(alias = "d8")]
    D8,
}

/// Parameters for flow direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowDirectionParams {
    /// Routing scheme
    pub scheme: RoutingScheme,
    /// Let cells on the grid border or next to nodata with no lower
    /// neighbour drain out of the grid instead of becoming sinks
    pub boundary_as_outlet: bool,
}

impl Default for FlowDirectionParams {
    fn default() -> Self {
        Self {
            scheme: RoutingScheme::D8,
            boundary_as_outlet: true,
        }
    }
}

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = FlowDirectionParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Calculate D8 flow direction from a conditioned DEM"
    }

    fn execute(&self, input: &Self::Input, params: Self::Params) -> Result<Self::Output> {
        flow_direction(input, params)
    }
}

/// Steepest strictly-downhill direction of one cell
#[inline]
fn route_cell(
    dem: &Raster<f64>,
    nodata: &Array2<bool>,
    dist: &[f64; 9],
    boundary_as_outlet: bool,
    row: usize,
    col: usize,
) -> u8 {
    if nodata[(row, col)] {
        return d8::NODATA;
    }
    let (rows, cols) = dem.shape();
    let center = unsafe { dem.get_unchecked(row, col) };

    let mut max_slope = 0.0_f64;
    let mut best_dir = d8::SINK;
    let mut outlet = None;

    for &dir in &d8::DIRECTIONS {
        match d8::target(dir, row, col, rows, cols) {
            Some((nr, nc)) if !nodata[(nr, nc)] => {
                let neighbor = unsafe { dem.get_unchecked(nr, nc) };
                let slope = (center - neighbor) / dist[dir as usize];
                // Strict comparison: the earliest direction wins ties
                if slope > max_slope {
                    max_slope = slope;
                    best_dir = dir;
                }
            }
            _ => {
                if outlet.is_none() {
                    outlet = Some(dir);
                }
            }
        }
    }

    match (best_dir, outlet) {
        (d8::SINK, Some(dir)) if boundary_as_outlet => dir,
        _ => best_dir,
    }
}

/// Calculate D8 flow direction from a DEM.
///
/// The input DEM should be conditioned (see [`condition`]) for every cell
/// to get a direction.
///
/// # Direction Encoding
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
/// - `0` = sink (no strictly lower neighbor and no outlet)
/// - `1`-`8` = direction to the steepest downslope neighbor; on the grid
///   edge, possibly the first direction leaving the grid
/// - `255` = nodata, also set as the output's nodata value
///
/// Slopes use the real cell width and height, so rectangular cells are
/// routed correctly. Ties go to the lower code.
///
/// # Arguments
/// * `dem` - Input DEM (ideally conditioned)
/// * `params` - Routing scheme and boundary handling
///
/// # Returns
/// Raster<u8> with flow direction codes
///
/// [`condition`]: super::condition
pub fn flow_direction(dem: &Raster<f64>, params: FlowDirectionParams) -> Result<Raster<u8>> {
    let (nodata, _) = validate_dem(dem)?;
    let (rows, cols) = dem.shape();
    let (dx, dy) = dem.cell_sizes();
    if !(dx > 0.0 && dy > 0.0 && dx.is_finite() && dy.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "cell_size",
            value: format!("{} x {}", dx, dy),
            reason: "cell width and height must be finite and positive".to_string(),
        });
    }

    match params.scheme {
        RoutingScheme::D8 => {}
    }

    let dist = d8::distances(dx, dy);
    let boundary_as_outlet = params.boundary_as_outlet;

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| route_cell(dem, &nodata, &dist, boundary_as_outlet, row, col))
                .collect::<Vec<u8>>()
        })
        .collect();

    let mut output = dem.with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(d8::NODATA));
    *output.data_mut() = Array2::from_shape_vec((rows, cols), output_data)
        .map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}

/// Flow direction in the ESRI power-of-two encoding
/// (`E=1, SE=2, S=4, SW=8, W=16, NW=32, N=64, NE=128`).
pub fn flow_direction_esri(dem: &Raster<f64>, params: FlowDirectionParams) -> Result<Raster<u8>> {
    let mut fdir = flow_direction(dem, params)?;
    fdir.data_mut().mapv_inplace(d8::to_esri);
    Ok(fdir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydroshed_core::GeoTransform;

    fn dem_from(f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut dem = Raster::from_fn(5, 5, f);
        dem.set_transform(GeoTransform::new(0.0, 5.0, 1.0, -1.0));
        dem
    }

    fn route(dem: &Raster<f64>) -> Raster<u8> {
        flow_direction(dem, FlowDirectionParams::default()).unwrap()
    }

    #[test]
    fn test_flow_direction_slope_east() {
        let fdir = route(&dem_from(|_, col| (5 - col) as f64 * 10.0));
        assert_eq!(fdir.get(2, 2).unwrap(), 1, "Expected flow direction E (1)");
    }

    #[test]
    fn test_flow_direction_slope_south() {
        let fdir = route(&dem_from(|row, _| (5 - row) as f64 * 10.0));
        assert_eq!(fdir.get(2, 2).unwrap(), 7, "Expected flow direction S (7)");
    }

    #[test]
    fn test_flow_direction_pit() {
        let mut dem = dem_from(|_, _| 10.0);
        dem.set(2, 2, 1.0).unwrap();

        let fdir = route(&dem);
        assert_eq!(fdir.get(2, 2).unwrap(), d8::SINK);
    }

    #[test]
    fn test_flow_direction_diagonal() {
        let fdir = route(&dem_from(|row, col| (10 - row - col) as f64 * 10.0));
        assert_eq!(fdir.get(2, 2).unwrap(), 8, "Expected flow direction SE (8)");
    }

    #[test]
    fn test_tie_goes_to_first_direction() {
        // E and S drop by the same amount
        let mut dem = dem_from(|_, _| 10.0);
        dem.set(2, 3, 5.0).unwrap();
        dem.set(3, 2, 5.0).unwrap();
        assert_eq!(route(&dem).get(2, 2).unwrap(), 1);
    }

    #[test]
    fn test_rectangular_cells() {
        // dx = 1, dy = 10: a drop of 1 to the east beats 5 to the south
        let mut dem = Raster::filled(3, 3, 20.0);
        dem.set_transform(GeoTransform::new(0.0, 30.0, 1.0, -10.0));
        dem.set(1, 1, 10.0).unwrap();
        dem.set(1, 2, 9.0).unwrap();
        dem.set(2, 1, 5.0).unwrap();

        assert_eq!(route(&dem).get(1, 1).unwrap(), 1);
    }

    #[test]
    fn test_boundary_outlet() {
        let dem = dem_from(|_, _| 10.0);

        let open = route(&dem);
        // (0,0): E stays in the grid, NE is the first to leave it
        assert_eq!(open.get(0, 0).unwrap(), 2);
        // (4,2): SW is the first to leave the grid
        assert_eq!(open.get(4, 2).unwrap(), 6);
        // Interior flat cells have nowhere to go
        assert_eq!(open.get(2, 2).unwrap(), d8::SINK);

        let closed = flow_direction(
            &dem,
            FlowDirectionParams {
                boundary_as_outlet: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(closed.get(0, 0).unwrap(), d8::SINK);
    }

    #[test]
    fn test_nodata_cells_and_outlets() {
        let mut dem = dem_from(|_, _| 10.0);
        dem.set_nodata(Some(-9999.0));
        dem.set(2, 3, -9999.0).unwrap();

        let fdir = route(&dem);
        assert_eq!(fdir.get(2, 3).unwrap(), d8::NODATA);
        assert_eq!(fdir.nodata(), Some(d8::NODATA));
        // (2,2) drains into the nodata hole to its east
        assert_eq!(fdir.get(2, 2).unwrap(), 1);
    }

    #[test]
    fn test_esri_encoding() {
        let fdir = flow_direction_esri(
            &dem_from(|row, _| (5 - row) as f64 * 10.0),
            FlowDirectionParams::default(),
        )
        .unwrap();
        assert_eq!(fdir.get(2, 2).unwrap(), 4);
    }

    #[test]
    fn test_scheme_from_json() {
        let params: FlowDirectionParams = serde_json::from_str(r#"{"scheme": "D8"}"#).unwrap();
        assert_eq!(params.scheme, RoutingScheme::D8);
        assert!(params.boundary_as_outlet);
    }
}
