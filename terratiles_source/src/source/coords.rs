use super::GeoTileSource;
use anyhow::{Context, Result};
use terratiles_core::{Crs, CrsTransform, TileSourceError};

impl GeoTileSource {
	/// Converts a pixel position at `level` (default: finest) to coordinates.
	///
	/// Projected sources answer in the target projection. Other sources apply
	/// the raster transform to the corresponding base pixel, so the result is
	/// in the native CRS.
	pub fn pixel_to_projection(&self, x: f64, y: f64, level: Option<u8>) -> (f64, f64) {
		if let Some(point) = self.geometry.world_pixel_to_projection(x, y, level) {
			return point;
		}
		let factor = self.geometry.level_factor(level.unwrap_or(self.geometry.max_level()));
		self.identity.affine.apply(x * factor, y * factor)
	}

	/// Converts coordinates in `crs` (default: the target projection, else
	/// the native CRS) to native pixel coordinates, rounded when `round` is set.
	pub fn to_native_pixel_coordinates(&self, x: f64, y: f64, crs: Option<&str>, round: bool) -> Result<(f64, f64)> {
		let from = crs.map(Crs::parse).transpose()?;
		self.native_pixel(x, y, from.as_ref(), round)
	}

	pub(super) fn native_pixel(&self, x: f64, y: f64, from: Option<&Crs>, round: bool) -> Result<(f64, f64)> {
		let native = self
			.resolve_crs()
			.ok_or_else(|| TileSourceError::config(format!("{} has no coordinate reference system", self.path)))?;
		let from = from.or(self.projection()).unwrap_or(native);
		let (nx, ny) = CrsTransform::new(from, native)?
			.transform(x, y)
			.with_context(|| format!("converting ({x}, {y}) from {from} to {native}"))?;
		let (px, py) = self.identity.affine.invert(nx, ny)?;
		Ok(if round { (px.round(), py.round()) } else { (px, py) })
	}
}

#[cfg(test)]
mod tests {
	use super::super::tests::{open, utm_dataset};
	use crate::{ColorInterp, MemoryDataset, SourceOptions};
	use anyhow::Result;
	use approx::assert_relative_eq;
	use std::sync::Arc;
	use terratiles_core::{Affine, ScaleCache, TileSourceError};

	#[test]
	fn unprojected_pixel_to_projection() {
		let source = open(utm_dataset(), SourceOptions::default());
		assert_eq!(source.pixel_to_projection(0.0, 0.0, None), (500_000.0, 5_600_000.0));
		assert_eq!(source.pixel_to_projection(100.0, 10.0, None), (503_000.0, 5_599_700.0));
		// level 0 of three: one pixel covers four base pixels
		assert_eq!(source.pixel_to_projection(100.0, 10.0, Some(0)), (512_000.0, 5_598_800.0));
	}

	#[test]
	fn rotated_transform_uses_the_original_x() {
		let dataset = MemoryDataset::new(10, 10)
			.with_crs("EPSG:32633")
			.with_transform(Affine::new(1.0, 2.0, 0.0, 3.0, 4.0, 0.0))
			.with_constant_band(ColorInterp::Gray, 1.0);
		let source = open(dataset, SourceOptions::default());
		assert_eq!(source.pixel_to_projection(1.0, 1.0, None), (3.0, 7.0));
	}

	#[test]
	fn projected_pixel_to_projection() {
		let options = SourceOptions::default()
			.with_projection("EPSG:3857")
			.with_units_per_pixel(1.0)
			.with_scale_cache(Arc::new(ScaleCache::new(2)));
		let source = open(utm_dataset(), options);
		let g = source.geometry();
		let half = g.size_x as f64 / 2.0;
		assert_eq!(source.pixel_to_projection(half, half, None), (0.0, 0.0));
		assert_eq!(source.pixel_to_projection(0.0, 0.0, Some(0)), (-128.0, 128.0));
	}

	#[test]
	fn native_pixel_round_trip() -> Result<()> {
		let source = open(utm_dataset(), SourceOptions::default());
		let (x, y) = source.pixel_to_projection(123.0, 456.0, None);
		assert_eq!(source.to_native_pixel_coordinates(x, y, None, true)?, (123.0, 456.0));

		let (px, py) = source.to_native_pixel_coordinates(503_015.0, 5_599_985.0, None, false)?;
		assert_relative_eq!(px, 100.5, epsilon = 1e-9);
		assert_relative_eq!(py, 0.5, epsilon = 1e-9);
		Ok(())
	}

	#[test]
	fn native_pixel_from_another_crs() -> Result<()> {
		let source = open(utm_dataset(), SourceOptions::default());
		let (x, y) = source.to_native_pixel_coordinates(15.2, 50.4, Some("EPSG:4326"), false)?;
		assert!((0.0..1000.0).contains(&x), "x {x}");
		assert!((0.0..800.0).contains(&y), "y {y}");
		Ok(())
	}

	#[test]
	fn native_pixel_needs_a_crs_and_an_invertible_transform() {
		let source = open(
			MemoryDataset::new(10, 10).with_constant_band(ColorInterp::Gray, 1.0),
			SourceOptions::default(),
		);
		let err = source.to_native_pixel_coordinates(1.0, 1.0, None, true).unwrap_err();
		assert!(matches!(TileSourceError::of(&err), Some(TileSourceError::Config(_))));

		let flat = MemoryDataset::new(10, 10)
			.with_crs("EPSG:32633")
			.with_transform(Affine::new(1.0, 2.0, 0.0, 2.0, 4.0, 0.0))
			.with_constant_band(ColorInterp::Gray, 1.0);
		let source = open(flat, SourceOptions::default());
		let err = source.to_native_pixel_coordinates(1.0, 1.0, None, true).unwrap_err();
		assert!(matches!(TileSourceError::of(&err), Some(TileSourceError::Config(_))));
	}
}
