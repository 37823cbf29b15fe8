//! Pyramid geometry: level count, world size, and the mapping from tile
//! indices to source windows or projected rectangles.
//!
//! A pyramid is either in *pixel mode*, where the finest level is the source
//! raster itself, or in *projected mode*, where level 0 is a single tile
//! covering `units_across_level0` projection units centred on the projection
//! origin and every level doubles the resolution.

use crate::{Crs, PixelWindow, TileCoord, TileSourceError, TileWindow};
use anyhow::{Result, ensure};
use serde::Serialize;

/// Target projection of a projected pyramid.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectionConfig {
	pub crs: Crs,
	/// Width and height of the level 0 tile in projection units.
	pub units_across_level0: f64,
	pub origin: (f64, f64),
}

impl ProjectionConfig {
	pub fn new(crs: Crs, units_across_level0: f64) -> Result<Self> {
		if !(units_across_level0.is_finite() && units_across_level0 > 0.0) {
			return Err(TileSourceError::config(format!(
				"units across level 0 must be positive, got {units_across_level0}"
			)));
		}
		Ok(Self {
			crs,
			units_across_level0,
			origin: (0.0, 0.0),
		})
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidGeometry {
	pub levels: u8,
	pub size_x: u64,
	pub size_y: u64,
	pub tile_width: u32,
	pub tile_height: u32,
	pub source_levels: u8,
	pub source_size_x: u32,
	pub source_size_y: u32,
	#[serde(skip)]
	pub projection: Option<ProjectionConfig>,
}

/// `max(0, ceil(log2(max(W / tw, H / th)))) + 1`
pub fn pixel_levels(size_x: u32, size_y: u32, tile_width: u32, tile_height: u32) -> u8 {
	let ratio = (f64::from(size_x) / f64::from(tile_width)).max(f64::from(size_y) / f64::from(tile_height));
	(ratio.log2().ceil().max(0.0) as u8) + 1
}

/// `max(1, ceil(log2(units_across_level0 / (pixel_size * tile_width))) + 1)`
pub fn projected_levels(units_across_level0: f64, pixel_size: f64, tile_width: u32) -> Result<u8> {
	if !(pixel_size.is_finite() && pixel_size > 0.0) {
		return Err(TileSourceError::config(format!(
			"pixel size must be positive, got {pixel_size}"
		)));
	}
	let tiles = units_across_level0 / (pixel_size * f64::from(tile_width));
	let levels = (tiles.log2().ceil() + 1.0).max(1.0);
	if levels > 32.0 {
		return Err(TileSourceError::config(format!(
			"a pixel size of {pixel_size} needs {levels} levels, at most 32 are supported"
		)));
	}
	Ok(levels as u8)
}

impl PyramidGeometry {
	/// A pyramid whose finest level is the source raster.
	pub fn pixel(source_size_x: u32, source_size_y: u32, tile_width: u32, tile_height: u32) -> Result<Self> {
		ensure!(
			source_size_x > 0 && source_size_y > 0,
			"raster size {source_size_x}×{source_size_y} is empty"
		);
		ensure!(tile_width > 0 && tile_height > 0, "tile size must be positive");
		let levels = pixel_levels(source_size_x, source_size_y, tile_width, tile_height);
		Ok(Self {
			levels,
			size_x: u64::from(source_size_x),
			size_y: u64::from(source_size_y),
			tile_width,
			tile_height,
			source_levels: levels,
			source_size_x,
			source_size_y,
			projection: None,
		})
	}

	/// A pyramid in a target projection. `pixel_size` is the source's base
	/// pixel size in projection units (meters for the usual targets).
	pub fn projected(
		source_size_x: u32,
		source_size_y: u32,
		tile_width: u32,
		tile_height: u32,
		projection: ProjectionConfig,
		pixel_size: f64,
	) -> Result<Self> {
		let mut geometry = Self::pixel(source_size_x, source_size_y, tile_width, tile_height)?;
		let levels = projected_levels(projection.units_across_level0, pixel_size, tile_width)?;
		geometry.levels = levels;
		geometry.size_x = u64::from(tile_width) << (levels - 1);
		geometry.size_y = u64::from(tile_height) << (levels - 1);
		log::trace!(
			"projected pyramid in {}: {} levels, {}×{} world pixels",
			projection.crs,
			levels,
			geometry.size_x,
			geometry.size_y
		);
		geometry.projection = Some(projection);
		Ok(geometry)
	}

	pub fn is_projected(&self) -> bool {
		self.projection.is_some()
	}

	pub fn max_level(&self) -> u8 {
		self.levels - 1
	}

	/// Number of base pixels covered by one pixel at `level` in pixel mode.
	pub fn level_factor(&self, level: u8) -> f64 {
		2f64.powi(i32::from(self.levels) - 1 - i32::from(level))
	}

	/// Columns and rows of tiles at `level`.
	pub fn tiles_across(&self, level: u8) -> (u64, u64) {
		if self.is_projected() {
			let n = 1u64 << level;
			return (n, n);
		}
		let factor = 1u64 << (self.levels - 1 - level.min(self.levels - 1));
		(
			self.size_x.div_ceil(factor * u64::from(self.tile_width)),
			self.size_y.div_ceil(factor * u64::from(self.tile_height)),
		)
	}

	/// Rejects tile addresses outside the pyramid with a request error.
	pub fn check_tile(&self, coord: &TileCoord) -> Result<()> {
		if coord.level >= self.levels {
			return Err(TileSourceError::request(format!(
				"level {} is outside of the pyramid (levels: {})",
				coord.level, self.levels
			)));
		}
		let (cols, rows) = self.tiles_across(coord.level);
		if u64::from(coord.x) >= cols {
			return Err(TileSourceError::request(format!(
				"x {} is outside layer {} (0..{cols})",
				coord.x, coord.level
			)));
		}
		if u64::from(coord.y) >= rows {
			return Err(TileSourceError::request(format!(
				"y {} is outside layer {} (0..{rows})",
				coord.y, coord.level
			)));
		}
		Ok(())
	}

	/// Source window of a tile in pixel mode, clipped to the raster.
	///
	/// # Examples
	/// ```
	/// use terratiles_core::{PyramidGeometry, TileCoord};
	///
	/// let geometry = PyramidGeometry::pixel(10000, 8000, 256, 256).unwrap();
	/// assert_eq!(geometry.levels, 7);
	/// let tile = geometry.tile_window(&TileCoord::new(6, 0, 0)).unwrap();
	/// assert_eq!((tile.window.width, tile.out_width), (256, 256));
	/// ```
	pub fn tile_window(&self, coord: &TileCoord) -> Result<TileWindow> {
		self.check_tile(coord)?;
		let factor = 1u64 << (self.levels - 1 - coord.level);
		let tw = u64::from(self.tile_width);
		let th = u64::from(self.tile_height);
		let source_x = u64::from(self.source_size_x);
		let source_y = u64::from(self.source_size_y);

		let x_min = u64::from(coord.x) * factor * tw;
		let y_min = u64::from(coord.y) * factor * th;
		let x_max = (x_min + factor * tw).min(source_x);
		let y_max = (y_min + factor * th).min(source_y);
		ensure!(
			x_min < x_max && y_min < y_max,
			"tile {coord} lies outside of the {source_x}×{source_y} raster"
		);

		let out = |extent: u64| ((extent as f64 / factor as f64).round() as u32).max(1);
		Ok(TileWindow {
			window: PixelWindow::new(x_min, y_min, x_max - x_min, y_max - y_min),
			out_width: out(x_max - x_min),
			out_height: out(y_max - y_min),
		})
	}

	/// Bounds `(x_min, y_min, x_max, y_max)` of a tile.
	///
	/// In projected mode these are projection coordinates. In pixel mode they
	/// are base pixels with the y axis pointing up from the bottom edge.
	pub fn tile_corners(&self, coord: &TileCoord) -> (f64, f64, f64, f64) {
		let x = f64::from(coord.x);
		let y = f64::from(coord.y);
		if let Some(projection) = &self.projection {
			let n = 2f64.powi(i32::from(coord.level));
			let units = projection.units_across_level0;
			let (ox, oy) = projection.origin;
			(
				ox + (-0.5 + x / n) * units,
				oy + (0.5 - (y + 1.0) / n) * units,
				ox + (-0.5 + (x + 1.0) / n) * units,
				oy + (0.5 - y / n) * units,
			)
		} else {
			let scale = 2f64.powi(i32::from(self.source_levels) - 1 - i32::from(coord.level));
			let tw = f64::from(self.tile_width);
			let th = f64::from(self.tile_height);
			let x_min = scale * x * tw;
			let y_min = scale * y * th;
			let size_y = f64::from(self.source_size_y);
			(x_min, size_y - (y_min + scale * th), x_min + scale * tw, size_y - y_min)
		}
	}

	/// Converts a pixel position at `level` (default: finest) of a projected
	/// pyramid into projection coordinates. Returns `None` in pixel mode.
	pub fn world_pixel_to_projection(&self, x: f64, y: f64, level: Option<u8>) -> Option<(f64, f64)> {
		let projection = self.projection.as_ref()?;
		let level = i32::from(level.unwrap_or(self.max_level()));
		let x_scale = 2f64.powi(level) * f64::from(self.tile_width);
		let y_scale = 2f64.powi(level) * f64::from(self.tile_height);
		let units = projection.units_across_level0;
		Some((
			(x / x_scale - 0.5) * units + projection.origin.0,
			(0.5 - y / y_scale) * units + projection.origin.1,
		))
	}

	/// Inverse of [`world_pixel_to_projection`](Self::world_pixel_to_projection)
	/// at the finest level, without clamping.
	pub fn projection_to_world_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
		let projection = self.projection.as_ref()?;
		let units = projection.units_across_level0;
		let nx = (x - projection.origin.0) / units;
		let ny = (y - projection.origin.1) / units;
		Some(((0.5 + nx) * self.size_x as f64, (0.5 - ny) * self.size_y as f64))
	}
}
