//! Reading pixels: tiles, regions, thumbnails and single points.

use super::GeoTileSource;
use crate::{ColorInterp, RasterBuffer, Resampling, TileData, WarpRequest};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use terratiles_core::{
	Affine, DEFAULT_TILE_SIZE, PixelRegion, PixelWindow, RegionSpec, TileCoord, TileSourceError, Units,
};

/// Upper limits for the size of a region's output. The output never exceeds
/// the region's size in base pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputSize {
	pub max_width: Option<u32>,
	pub max_height: Option<u32>,
}

impl OutputSize {
	pub fn new(max_width: u32, max_height: u32) -> Self {
		Self {
			max_width: Some(max_width),
			max_height: Some(max_height),
		}
	}

	/// Output size for a `width × height` region, keeping the aspect ratio.
	fn fit(&self, width: f64, height: f64) -> (u32, u32) {
		let scale = [
			Some(1.0),
			self.max_width.map(|w| f64::from(w) / width),
			self.max_height.map(|h| f64::from(h) / height),
		]
		.into_iter()
		.flatten()
		.fold(f64::INFINITY, f64::min);
		let side = |v: f64| ((v * scale).round() as u32).max(1);
		(side(width), side(height))
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegionData {
	/// The region in world pixels.
	pub region: PixelRegion,
	pub buffer: RasterBuffer,
}

/// Band values at one point, keyed by 1-based band number.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PixelValue {
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub bands: BTreeMap<usize, f64>,
}

impl GeoTileSource {
	/// Reads tile `(x, y)` of `level`.
	///
	/// Pixel pyramids read the tile's source window. Projected pyramids warp
	/// the source onto the tile's grid, except for tiles outside the source
	/// bounds, which come back as transparent images without touching the
	/// dataset.
	pub fn get_tile(&self, x: u32, y: u32, level: u8) -> Result<TileData> {
		let coord = TileCoord::new(level, x, y);
		let _fill = self.tile_lock.lock();

		let Some(projection) = self.projection() else {
			let tile = self.geometry.tile_window(&coord)?;
			log::trace!("tile {coord}: reading {:?}", tile.window);
			let buffer = self
				.with_dataset(|ds| ds.read(&tile.window, tile.out_width, tile.out_height))
				.with_context(|| format!("reading tile {coord}"))?;
			return Ok(TileData::Pixels(buffer));
		};

		self.geometry.check_tile(&coord)?;
		let (x_min, y_min, x_max, y_max) = self.geometry.tile_corners(&coord);
		let (width, height) = (self.geometry.tile_width, self.geometry.tile_height);
		if let Some(bounds) = self.bounds_in(Some(projection))?
			&& !bounds.intersects(x_min, y_min, x_max, y_max)
		{
			log::trace!("tile {coord} is outside of the source");
			return Ok(TileData::empty(width, height));
		}

		let request = WarpRequest {
			crs: projection.clone(),
			transform: Affine::north_up(
				x_min,
				y_max,
				(x_max - x_min) / f64::from(width),
				(y_max - y_min) / f64::from(height),
			),
			width,
			height,
			resampling: Resampling::Nearest,
			add_alpha: !self.has_alpha_band()?,
		};
		log::trace!("tile {coord}: warping onto {:?}", request.transform);
		let buffer = self
			.with_dataset(|ds| ds.warp(&request))
			.with_context(|| format!("warping tile {coord}"))?;
		Ok(TileData::Pixels(buffer))
	}

	fn has_alpha_band(&self) -> Result<bool> {
		Ok(self
			.get_band_information()?
			.values()
			.any(|b| b.interpretation == ColorInterp::Alpha))
	}

	/// Reads a region, scaled down to fit `output`.
	pub fn get_region(&self, spec: &RegionSpec, output: OutputSize) -> Result<RegionData> {
		let region = self.resolve_region(spec)?;
		if region.is_empty() {
			return Err(TileSourceError::request(format!("region {spec:?} is empty")));
		}
		let (width, height) = output.fit(region.width(), region.height());
		log::debug!("reading region {region:?} into {width}×{height} pixels");

		let read = if let Some(projection) = self.projection() {
			let (x_min, y_max) = self.pixel_to_projection(region.left, region.top, None);
			let (x_max, y_min) = self.pixel_to_projection(region.right, region.bottom, None);
			let request = WarpRequest {
				crs: projection.clone(),
				transform: Affine::north_up(
					x_min,
					y_max,
					(x_max - x_min) / f64::from(width),
					(y_max - y_min) / f64::from(height),
				),
				width,
				height,
				resampling: Resampling::Nearest,
				add_alpha: !self.has_alpha_band()?,
			};
			self.with_dataset(|ds| ds.warp(&request))
		} else {
			let col_off = region.left.floor() as u64;
			let row_off = region.top.floor() as u64;
			let window = PixelWindow::new(
				col_off,
				row_off,
				(region.right.ceil() as u64).saturating_sub(col_off).max(1),
				(region.bottom.ceil() as u64).saturating_sub(row_off).max(1),
			);
			self.with_dataset(|ds| ds.read(&window, width, height))
		};
		let buffer = read.with_context(|| format!("reading region {region:?}"))?;

		Ok(RegionData { region, buffer })
	}

	/// Reads the whole source, or in projected mode its bounds, into at most
	/// `width × height` pixels (default 256 × 256).
	pub fn get_thumbnail(&self, width: Option<u32>, height: Option<u32>) -> Result<RegionData> {
		if width.is_some_and(|w| w < 2) || height.is_some_and(|h| h < 2) {
			return Err(TileSourceError::request("invalid width or height, the minimum value is 2"));
		}
		let output = match (width, height) {
			(None, None) => OutputSize::new(DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE),
			_ => OutputSize {
				max_width: width,
				max_height: height,
			},
		};
		let units = if self.geometry.is_projected() {
			Units::Projection
		} else {
			Units::BasePixels
		};
		self.get_region(&RegionSpec::new(units), output)
	}

	/// Band values of the source pixel under `(x, y)` in `units`.
	///
	/// Points outside the source give an empty result.
	pub fn get_pixel(&self, x: f64, y: f64, units: &Units) -> Result<PixelValue> {
		let (px, py) = self.native_pixel_of(x, y, units)?;
		let (width, height) = (f64::from(self.identity.width), f64::from(self.identity.height));
		if !(px.is_finite() && py.is_finite()) || px < 0.0 || py < 0.0 || px.floor() >= width || py.floor() >= height {
			return Ok(PixelValue::default());
		}

		let window = PixelWindow::new(px.floor() as u64, py.floor() as u64, 1, 1);
		let buffer = self
			.with_dataset(|ds| ds.read(&window, 1, 1))
			.with_context(|| format!("reading pixel ({x}, {y})"))?;
		Ok(PixelValue {
			bands: buffer.pixel(0, 0).iter().enumerate().map(|(i, v)| (i + 1, *v)).collect(),
		})
	}

	/// Native pixel position of a point given in `units`.
	fn native_pixel_of(&self, x: f64, y: f64, units: &Units) -> Result<(f64, f64)> {
		let geometry = &self.geometry;
		let world = match units {
			Units::BasePixels => (x, y),
			Units::Fraction => (x * geometry.size_x as f64, y * geometry.size_y as f64),
			Units::Projection => return self.native_pixel(x, y, None, false),
			Units::Crs(crs) => return self.native_pixel(x, y, Some(crs), false),
		};
		match geometry.world_pixel_to_projection(world.0, world.1, None) {
			Some((x, y)) => self.native_pixel(x, y, None, false),
			None => Ok(world),
		}
	}
}
