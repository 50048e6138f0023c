//! D8 flow direction encoding
//!
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! `0` = sink (no outflow), `1`-`8` = direction to the receiving neighbour,
//! `255` = no-data. The code order is also the tie-breaking priority:
//! when two neighbours are equally steep, the lower code wins.

/// Cell with no outflow
pub const SINK: u8 = 0;

/// Cell excluded from routing
pub const NODATA: u8 = 255;

/// Direction codes in priority order
pub const DIRECTIONS: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];

/// Direction offsets: (row_offset, col_offset), indexed by direction code
pub const OFFSETS: [(isize, isize); 9] = [
    (0, 0),   // 0: sink
    (0, 1),   // 1: E
    (-1, 1),  // 2: NE
    (-1, 0),  // 3: N
    (-1, -1), // 4: NW
    (0, -1),  // 5: W
    (1, -1),  // 6: SW
    (1, 0),   // 7: S
    (1, 1),   // 8: SE
];

/// Power-of-two codes used by ESRI and pysheds, indexed by direction code
pub const ESRI_CODES: [u8; 9] = [0, 1, 128, 64, 32, 16, 8, 4, 2];

const NAMES: [&str; 9] = ["sink", "E", "NE", "N", "NW", "W", "SW", "S", "SE"];

/// Whether `code` is one of the eight directions
pub fn is_direction(code: u8) -> bool {
    (1..=8).contains(&code)
}

/// Whether `code` is a diagonal direction
pub fn is_diagonal(code: u8) -> bool {
    is_direction(code) && code % 2 == 0
}

/// Get the opposite direction
pub fn opposite(dir: u8) -> u8 {
    if !is_direction(dir) {
        dir
    } else {
        ((dir - 1 + 4) % 8) + 1
    }
}

/// Short compass name for a code
pub fn name(code: u8) -> &'static str {
    if code == NODATA {
        "nodata"
    } else {
        NAMES.get(code as usize).copied().unwrap_or("invalid")
    }
}

/// Distance to the neighbour in each direction, indexed by direction code,
/// for cells of width `dx` and height `dy`.
pub fn distances(dx: f64, dy: f64) -> [f64; 9] {
    let diag = dx.hypot(dy);
    [0.0, dx, diag, dy, diag, dx, diag, dy, diag]
}

/// The cell `code` points to, or `None` when it leaves a grid of
/// `rows` x `cols` or `code` is not a direction.
pub fn target(code: u8, row: usize, col: usize, rows: usize, cols: usize) -> Option<(usize, usize)> {
    if !is_direction(code) {
        return None;
    }
    let (dr, dc) = OFFSETS[code as usize];
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
        None
    } else {
        Some((nr as usize, nc as usize))
    }
}

/// Convert a D8 code to its ESRI power-of-two equivalent.
///
/// Sinks map to 0; no-data stays 255.
pub fn to_esri(code: u8) -> u8 {
    if is_direction(code) {
        ESRI_CODES[code as usize]
    } else if code == NODATA {
        NODATA
    } else {
        0
    }
}

/// Convert an ESRI power-of-two code back to the D8 encoding
pub fn from_esri(code: u8) -> Option<u8> {
    match code {
        0 => Some(SINK),
        NODATA => Some(NODATA),
        _ => ESRI_CODES[1..]
            .iter()
            .position(|&c| c == code)
            .map(|i| (i + 1) as u8),
    }
}

/// In-grid neighbours of (row, col) in priority order.
///
/// Yields `(direction, row, col)`; directions that leave the grid are skipped.
pub fn neighbors(row: usize, col: usize, rows: usize, cols: usize) -> D8Neighbors {
    D8Neighbors {
        row,
        col,
        rows,
        cols,
        next: 1,
    }
}

/// Iterator returned by [`neighbors`]
#[derive(Debug, Clone)]
pub struct D8Neighbors {
    row: usize,
    col: usize,
    rows: usize,
    cols: usize,
    next: u8,
}

impl Iterator for D8Neighbors {
    type Item = (u8, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while self.next <= 8 {
            let dir = self.next;
            self.next += 1;
            if let Some((nr, nc)) = target(dir, self.row, self.col, self.rows, self.cols) {
                return Some((dir, nr, nc));
            }
        }
        None
    }
}
