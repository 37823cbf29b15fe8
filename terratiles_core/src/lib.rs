//! Geometry of tile pyramids over georeferenced rasters.
//!
//! Contains the affine and CRS primitives, raster footprints, pyramid
//! geometry, tile coordinates, region units, the shared projection scale
//! cache and the error categories used across the workspace.

mod affine;
pub use affine::*;

mod bounds;
pub use bounds::*;

mod constants;
pub use constants::*;

mod crs;
pub use crs::*;

mod error;
pub use error::*;

mod pyramid;
pub use pyramid::*;

mod region;
pub use region::*;

mod scale_cache;
pub use scale_cache::*;

mod tile_coord;
pub use tile_coord::*;

mod window;
pub use window::*;
