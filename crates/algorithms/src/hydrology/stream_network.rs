//! Stream network extraction
//!
//! Thresholds a flow accumulation raster: cells with accumulation >=
//! threshold are stream cells. The boolean form is the candidate mask
//! used for pour-point snapping.

use hydroshed_core::raster::Raster;
use hydroshed_core::{Error, Result};

/// Parameters for stream network extraction
#[derive(Debug, Clone)]
pub struct StreamNetworkParams {
    /// Flow accumulation threshold (in cell counts, or weight units).
    /// Cells with accumulation >= this value are classified as streams.
    /// Default: 1000.0
    pub threshold: f64,
}

impl Default for StreamNetworkParams {
    fn default() -> Self {
        Self { threshold: 1000.0 }
    }
}

fn check_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: threshold.to_string(),
            reason: "must be finite".to_string(),
        });
    }
    Ok(())
}

/// Mask of cells whose accumulation is at least `threshold`.
///
/// NaN accumulation (nodata) never qualifies.
pub fn accumulation_mask(flow_acc: &Raster<f64>, threshold: f64) -> Result<Raster<bool>> {
    check_threshold(threshold)?;
    let (rows, cols) = flow_acc.shape();

    let mut output = flow_acc.with_same_meta::<bool>(rows, cols);
    ndarray::Zip::from(output.data_mut())
        .and(flow_acc.data())
        .for_each(|m, &acc| *m = !acc.is_nan() && acc >= threshold);

    Ok(output)
}

/// Extract stream network from flow accumulation.
///
/// # Returns
/// Raster<u8> with 1 = stream cell, 0 = non-stream cell
pub fn stream_network(flow_acc: &Raster<f64>, params: StreamNetworkParams) -> Result<Raster<u8>> {
    let mask = accumulation_mask(flow_acc, params.threshold)?;
    let (rows, cols) = mask.shape();

    let mut output = flow_acc.with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(0));
    *output.data_mut() = mask.data().mapv(u8::from);

    Ok(output)
}
