//! # hydroshed core
//!
//! Core types shared by the hydroshed watershed-delineation engine.
//!
//! This crate provides:
//! - `Raster<T>`: one generic grid container for elevations, flow
//!   directions, accumulation and masks
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: coordinate reference system identifier
//! - `d8`: the D8 direction encoding and neighbour iteration
//! - `Interrupt`: cooperative interruption of long sweeps
//! - `Algorithm`: the trait every engine component implements

pub mod crs;
pub mod error;
pub mod interrupt;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, Result};
pub use interrupt::Interrupt;
pub use raster::{d8, GeoTransform, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::interrupt::Interrupt;
    pub use crate::raster::{d8, GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Core trait for engine components.
///
/// Each component is a pure transformation: it borrows its input grid and
/// returns a newly allocated output.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: &Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: &Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
