//! # hydroshed algorithms
//!
//! Watershed delineation on `hydroshed_core` rasters.
//!
//! ## Modules
//!
//! - **hydrology**: DEM conditioning, D8 flow direction, flow accumulation,
//!   stream masks, catchment and watershed delineation, pour-point snapping
//! - **pipeline**: JSON-configurable end-to-end run of the above

pub mod hydrology;
pub mod pipeline;
pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        accumulation_mask, catchment, condition, fill_depressions, fill_pits, flow_accumulation,
        flow_direction, flow_distance, resolve_flats, snap_pour_point, snap_to_accumulation,
        watershed, ConditionParams, Conditioned, ConditioningReport, FlatParams,
        FlowAccumulationParams, FlowDirectionParams, PourPoint, RoutingScheme, WatershedParams,
    };
    pub use crate::pipeline::{AccumulationWeights, PipelineConfig, PipelineOutput, WatershedPipeline};
    pub use hydroshed_core::prelude::*;
}
