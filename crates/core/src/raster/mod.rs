//! Raster data structures and the D8 direction encoding

pub mod d8;
mod element;
mod geotransform;
mod grid;

pub use d8::D8Neighbors;
pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
