//! Error types for hydroshed

use thiserror::Error;

/// Main error type for hydroshed operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Raster of size ({rows}, {cols}) contains only no-data cells")]
    AllNoData { rows: usize, cols: usize },

    #[error(
        "Coordinate ({x}, {y}) lies outside raster extent ({}, {}) - ({}, {})",
        bounds.0, bounds.1, bounds.2, bounds.3
    )]
    CoordinateOutOfBounds {
        x: f64,
        y: f64,
        bounds: (f64, f64, f64, f64),
    },

    #[error("Pour point ({row}, {col}) falls on a no-data cell")]
    PourPointOnNoData { row: usize, col: usize },

    #[error("Mask of size ({rows}, {cols}) has no candidate cells")]
    EmptyMask { rows: usize, cols: usize },

    #[error(
        "Flow graph is cyclic: {cells} cells never drained, first at ({row}, {col}) \
         in raster of size ({rows}, {cols})"
    )]
    CycleDetected {
        cells: usize,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Interrupted during {stage}")]
    Interrupted { stage: &'static str },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for hydroshed operations
pub type Result<T> = std::result::Result<T, Error>;
