//! Serves georeferenced rasters as tile pyramids.
//!
//! A [`GeoTileSource`] is opened through a [`RasterEngine`] with
//! [`SourceOptions`]. It answers tile, region, thumbnail and pixel requests
//! and describes the raster through metadata and band information.
//!
//! ```
//! use terratiles_source::{ColorInterp, GeoTileSource, MemoryDataset, MemoryEngine, SourceOptions, TileData};
//! use terratiles_core::Affine;
//!
//! let mut engine = MemoryEngine::new();
//! engine.insert(
//! 	"utm.tif",
//! 	MemoryDataset::new(1000, 800)
//! 		.with_crs("EPSG:32633")
//! 		.with_transform(Affine::north_up(500_000.0, 5_600_000.0, 30.0, 30.0))
//! 		.with_constant_band(ColorInterp::Gray, 7.0),
//! );
//! let source = GeoTileSource::open(&engine, "utm.tif", SourceOptions::default()).unwrap();
//! assert_eq!(source.geometry().levels, 3);
//! let TileData::Pixels(tile) = source.get_tile(0, 0, 0).unwrap() else { panic!() };
//! assert_eq!((tile.width, tile.height), (250, 200));
//! ```

mod bands;
pub use bands::*;

mod buffer;
pub use buffer::*;

mod dataset;
pub use dataset::*;

mod options;
pub use options::*;

mod path;
pub use path::*;

mod source;
pub use source::*;

mod style;
pub use style::*;
