//! The raster I/O engine a [`GeoTileSource`](crate::GeoTileSource) reads through.
//!
//! Decoding, window reads, reprojection and statistics are the engine's
//! business. A tile source only computes *which* window or *which* target
//! grid it needs and hands that to a [`RasterDataset`].

mod memory;
pub use memory::*;

use crate::RasterBuffer;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use terratiles_core::{Affine, Crs, GroundControlPoint, PixelWindow, TileSourceError};

/// Opens datasets by path.
pub trait RasterEngine: Send + Sync {
	/// Opens a dataset.
	///
	/// Implementations report a missing path as [`TileSourceError::NotFound`]
	/// and unreadable content as [`TileSourceError::CannotOpen`].
	fn open(&self, path: &str) -> Result<Box<dyn RasterDataset>>;
}

/// An open raster dataset. Handles are not shared between threads; the tile
/// source serializes all access behind its dataset lock.
pub trait RasterDataset: Send {
	fn driver(&self) -> &str;
	fn width(&self) -> u32;
	fn height(&self) -> u32;
	fn band_count(&self) -> usize;
	/// Declared CRS definition, if any.
	fn crs(&self) -> Option<String>;
	/// Declared pixel to CRS transform. Identity when the file has none.
	fn transform(&self) -> Affine;
	fn gcps(&self) -> Vec<GroundControlPoint>;
	fn gcp_crs(&self) -> Option<String>;
	fn metadata(&self) -> BTreeMap<String, String>;

	/// Metadata of the 1-based band `index`.
	fn band(&self, index: usize) -> Result<BandMetadata>;

	/// Statistics of the 1-based band `index`, `None` when unavailable.
	fn statistics(&mut self, index: usize) -> Result<Option<BandStatistics>>;

	/// Reads `window` of all bands, resampled to `out_width × out_height`.
	fn read(&mut self, window: &PixelWindow, out_width: u32, out_height: u32) -> Result<RasterBuffer>;

	/// Reprojects all bands onto the grid described by `request`.
	fn warp(&mut self, request: &WarpRequest) -> Result<RasterBuffer>;

	/// Structural problems that keep the file from being a cloud optimized GeoTIFF.
	fn cog_report(&mut self) -> Result<CogReport>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
	#[default]
	Nearest,
}

/// Target grid of a reprojection.
#[derive(Clone, Debug, PartialEq)]
pub struct WarpRequest {
	pub crs: Crs,
	pub transform: Affine,
	pub width: u32,
	pub height: u32,
	pub resampling: Resampling,
	/// Append an alpha band marking which target pixels received data.
	pub add_alpha: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CogReport {
	pub errors: Vec<String>,
	pub warnings: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandStatistics {
	pub min: f64,
	pub max: f64,
	pub mean: f64,
	pub stdev: f64,
}

/// Colour interpretation of a band.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorInterp {
	#[default]
	Undefined,
	Gray,
	Palette,
	Red,
	Green,
	Blue,
	Alpha,
	Hue,
	Saturation,
	Lightness,
	Cyan,
	Magenta,
	Yellow,
	Black,
}

impl ColorInterp {
	pub const ALL: [ColorInterp; 14] = [
		ColorInterp::Undefined,
		ColorInterp::Gray,
		ColorInterp::Palette,
		ColorInterp::Red,
		ColorInterp::Green,
		ColorInterp::Blue,
		ColorInterp::Alpha,
		ColorInterp::Hue,
		ColorInterp::Saturation,
		ColorInterp::Lightness,
		ColorInterp::Cyan,
		ColorInterp::Magenta,
		ColorInterp::Yellow,
		ColorInterp::Black,
	];

	pub fn name(&self) -> &'static str {
		use ColorInterp::*;
		match self {
			Undefined => "undefined",
			Gray => "gray",
			Palette => "palette",
			Red => "red",
			Green => "green",
			Blue => "blue",
			Alpha => "alpha",
			Hue => "hue",
			Saturation => "saturation",
			Lightness => "lightness",
			Cyan => "cyan",
			Magenta => "magenta",
			Yellow => "yellow",
			Black => "black",
		}
	}
}

impl FromStr for ColorInterp {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		let lower = s.trim().to_ascii_lowercase();
		if lower == "grey" {
			return Ok(ColorInterp::Gray);
		}
		ColorInterp::ALL
			.into_iter()
			.find(|c| c.name() == lower)
			.ok_or_else(|| TileSourceError::request(format!("unknown colour interpretation '{s}'")))
	}
}

impl fmt::Display for ColorInterp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// An RGBA entry of a colour table.
pub type Rgba = [u8; 4];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BandMetadata {
	pub interpretation: ColorInterp,
	pub nodata: Option<f64>,
	pub scale: Option<f64>,
	pub offset: Option<f64>,
	pub units: Option<String>,
	pub description: Option<String>,
	pub color_table: Option<Vec<Rgba>>,
}

/// Resolves the CRS of a dataset.
///
/// Ground control points that carry a CRS win over the declared CRS. A
/// dataset without any CRS is assumed to be WGS84 when it has a non-identity
/// transform or comes from the NITF driver.
pub fn resolve_crs(dataset: &dyn RasterDataset) -> Result<Option<Crs>> {
	let gcp_crs = if dataset.gcps().is_empty() { None } else { dataset.gcp_crs() };
	if let Some(definition) = gcp_crs.or_else(|| dataset.crs()) {
		return Crs::parse(&definition).map(Some);
	}
	if !dataset.transform().is_identity() || dataset.driver().eq_ignore_ascii_case("nitf") {
		log::debug!("dataset has no CRS, assuming EPSG:4326");
		return Ok(Some(Crs::wgs84()));
	}
	Ok(None)
}

/// Resolves the pixel to CRS transform, fitted from ground control points when they carry a CRS.
pub fn resolve_affine(dataset: &dyn RasterDataset) -> Result<Affine> {
	let gcps = dataset.gcps();
	if !gcps.is_empty() && dataset.gcp_crs().is_some() {
		return Affine::from_gcps(&gcps);
	}
	Ok(dataset.transform())
}
