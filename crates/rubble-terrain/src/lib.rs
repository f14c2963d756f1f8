//! Rubble Terrain - Ring-buffered scrolling terrain
//!
//! A fixed `cols x rows` grid of height-animated cells. Scrolling advances a
//! ring pointer and regenerates the row that fell off the near edge, so no
//! memory is shifted. Cells are written into an instance buffer at their
//! storage index every update.

mod cell;
mod grid;
mod slice;

pub use cell::Cell;
pub use grid::{TerrainConfig, TerrainGrid, TerrainView};
