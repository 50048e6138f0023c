//! Hydrological analysis algorithms
//!
//! Watershed delineation from Digital Elevation Models:
//! - Conditioning: pit filling, Priority-Flood depression filling
//!   (Barnes 2014) and flat resolution
//! - Flow direction: D8 single flow direction
//! - Flow accumulation: upstream contributing area, optionally weighted
//! - Stream network: accumulation threshold masks
//! - Catchment / watershed: basin delineation from pour points
//! - Flow distance: flow-path length to a pour point
//! - Snapping: moving pour points onto the stream network

mod common;
mod conditioning;
mod flats;
mod flow_accumulation;
mod flow_direction;
mod flow_distance;
mod pits;
mod priority_flood;
mod snap;
mod stream_network;
mod watershed;

pub use conditioning::{
    condition, ConditionParams, Conditioned, Conditioner, ConditioningReport,
    UNRESOLVED_SAMPLE_LIMIT,
};
pub use flats::{detect_flats, resolve_flats, FlatParams, ResolveFlats};
pub use flow_accumulation::{
    flow_accumulation, upstream_mask, FlowAccumulation, FlowAccumulationParams,
};
pub use flow_direction::{
    flow_direction, flow_direction_esri, FlowDirection, FlowDirectionParams, RoutingScheme,
};
pub use flow_distance::flow_distance;
pub use pits::{detect_pits, fill_pits};
pub use priority_flood::{detect_depressions, fill_depressions, PriorityFlood};
pub use snap::{snap_pour_point, snap_to_accumulation};
pub use stream_network::{accumulation_mask, stream_network, StreamNetworkParams};
pub use watershed::{
    catchment, catchment_with_interrupt, outlets, watershed, PourPoint, Watershed,
    WatershedParams,
};
