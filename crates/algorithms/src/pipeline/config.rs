//! Pipeline configuration
//!
//! Every field has a default, so a JSON document only needs the settings
//! it changes:
//!
//! ```json
//! {
//!   "nodata": -9999.0,
//!   "routing_scheme": "D8",
//!   "accumulation_weights": "uniform",
//!   "accumulation_threshold": 500.0,
//!   "boundary_as_outlet": true,
//!   "snap_pour_point": true,
//!   "conditioning": { "resolve_flats": true, "flats": { "max_increment": 1e-5 } }
//! }
//! ```

use serde::{Deserialize, Serialize};
use hydroshed_core::{Error, Result};

use crate::hydrology::{ConditionParams, FlowDirectionParams, RoutingScheme};

/// Where accumulation weights come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulationWeights {
    /// Every cell weighs 1: accumulation counts cells
    #[default]
    Uniform,
    /// Per-cell weights supplied with
    /// [`WatershedPipeline::with_weights`](super::WatershedPipeline::with_weights)
    Grid,
}

/// Configuration of a [`WatershedPipeline`](super::WatershedPipeline)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Overrides the DEM's nodata sentinel
    pub nodata: Option<f64>,
    pub routing_scheme: RoutingScheme,
    pub accumulation_weights: AccumulationWeights,
    /// Minimum accumulation of a cell the pour point may snap to
    pub accumulation_threshold: f64,
    pub boundary_as_outlet: bool,
    /// Snap the pour point to the nearest cell passing the threshold
    pub snap_pour_point: bool,
    pub conditioning: ConditionParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            nodata: None,
            routing_scheme: RoutingScheme::D8,
            accumulation_weights: AccumulationWeights::Uniform,
            accumulation_threshold: 1000.0,
            boundary_as_outlet: true,
            snap_pour_point: true,
            conditioning: ConditionParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.accumulation_threshold.is_finite() || self.accumulation_threshold < 0.0 {
            return Err(Error::InvalidParameter {
                name: "accumulation_threshold",
                value: self.accumulation_threshold.to_string(),
                reason: "must be finite and non-negative".to_string(),
            });
        }
        if let Some(nodata) = self.nodata {
            if nodata.is_nan() {
                return Err(Error::InvalidParameter {
                    name: "nodata",
                    value: nodata.to_string(),
                    reason: "NaN is always nodata; leave the override unset".to_string(),
                });
            }
        }
        self.conditioning.flats.validate()
    }

    pub(crate) fn flow_direction_params(&self) -> FlowDirectionParams {
        FlowDirectionParams {
            scheme: self.routing_scheme,
            boundary_as_outlet: self.boundary_as_outlet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config.nodata, None);
        assert_eq!(config.routing_scheme, RoutingScheme::D8);
        assert_eq!(config.accumulation_weights, AccumulationWeights::Uniform);
        assert!(config.boundary_as_outlet);
        assert!(config.conditioning.fill_depressions);
    }

    #[test]
    fn test_partial_document() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "nodata": -9999.0,
                "accumulation_weights": "grid",
                "accumulation_threshold": 25,
                "conditioning": { "resolve_flats": false }
            }"#,
        )
        .unwrap();

        assert_eq!(config.nodata, Some(-9999.0));
        assert_eq!(config.accumulation_weights, AccumulationWeights::Grid);
        assert_eq!(config.accumulation_threshold, 25.0);
        assert!(!config.conditioning.resolve_flats);
        assert!(config.conditioning.fill_pits);
    }

    #[test]
    fn test_round_trip_keeps_settings() {
        let config = PipelineConfig {
            accumulation_threshold: 12.5,
            snap_pour_point: false,
            ..Default::default()
        };
        let json = config.to_json_string().unwrap();
        let back = PipelineConfig::from_json_str(&json).unwrap();
        assert_eq!(back.accumulation_threshold, 12.5);
        assert!(!back.snap_pour_point);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"accumulation_threshold": -1}"#),
            Err(Error::InvalidParameter { name: "accumulation_threshold", .. })
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"routing_scheme": "MFD"}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json_str(r#"{"conditioning": {"flats": {"max_increment": 0}}}"#),
            Err(Error::InvalidParameter { name: "max_increment", .. })
        ));
    }
}
