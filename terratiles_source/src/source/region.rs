use super::GeoTileSource;
use anyhow::{Context, Result};
use terratiles_core::{Crs, CrsTransform, PixelRegion, RegionSpec, TileSourceError, Units};

impl GeoTileSource {
	/// Resolves a region request into world pixels of the pyramid.
	pub fn resolve_region(&self, spec: &RegionSpec) -> Result<PixelRegion> {
		let spec = match &spec.units {
			Units::Crs(crs) => self.convert_region(spec, crs)?,
			Units::Projection if !self.geometry.is_projected() => {
				let native = self.resolve_crs().cloned().ok_or_else(|| {
					TileSourceError::request(format!("{} has no projection to resolve the region in", self.path))
				})?;
				self.convert_region(spec, &native)?
			}
			_ => spec.clone(),
		};
		log::trace!("resolving {spec:?}");

		let spec = if spec.units == Units::Projection {
			self.projection_region(spec)?
		} else {
			spec
		};
		PixelRegion::from_pixel_spec(&spec, self.geometry.size_x as f64, self.geometry.size_y as f64)
	}

	/// Converts a region with edges in `from` into the target projection, or
	/// into native pixels when the source is not projected. Edges that were
	/// not given stay unknown.
	fn convert_region(&self, spec: &RegionSpec, from: &Crs) -> Result<RegionSpec> {
		if self.resolve_crs().is_none() {
			return Err(TileSourceError::request(format!(
				"{} has no coordinate reference system to resolve the region in",
				self.path
			)));
		}
		let mut spec = spec.clone();
		spec.fill_edges_from_size();
		let [(left, top), (right, bottom)] = spec.anchor_corners()?;

		let (a, b, units) = if let Some(projection) = self.projection() {
			let transform = CrsTransform::new(from, projection)?;
			let convert = |x: f64, y: f64| {
				transform
					.transform(x, y)
					.with_context(|| format!("converting ({x}, {y}) from {from} to {projection}"))
			};
			(convert(left, top)?, convert(right, bottom)?, Units::Projection)
		} else {
			(
				self.native_pixel(left, top, Some(from), true)?,
				self.native_pixel(right, bottom, Some(from), true)?,
				Units::BasePixels,
			)
		};

		let shared = spec.size_shares_units();
		Ok(RegionSpec {
			left: spec.left.map(|_| a.0),
			top: spec.top.map(|_| a.1),
			right: spec.right.map(|_| b.0),
			bottom: spec.bottom.map(|_| b.1),
			width: spec.width.filter(|_| !shared),
			height: spec.height.filter(|_| !shared),
			units,
			units_wh: spec.units_wh.filter(|_| !shared),
		})
	}

	/// Fills missing edges of a projection-unit region from the source bounds
	/// and moves it into world pixels.
	fn projection_region(&self, mut spec: RegionSpec) -> Result<RegionSpec> {
		spec.fill_edges_from_size();
		let pixel_width = !spec.size_shares_units() && spec.width.is_some();
		let pixel_height = !spec.size_shares_units() && spec.height.is_some();

		if let Some(bounds) = self.bounds_in(self.projection())? {
			let fill = |edge: &mut Option<f64>, partner: Option<f64>, size_later: bool, value: f64| {
				if edge.is_none() && !(size_later && partner.is_some()) {
					*edge = Some(value);
				}
			};
			fill(&mut spec.left, spec.right, pixel_width, bounds.x_min);
			fill(&mut spec.right, spec.left, pixel_width, bounds.x_max);
			fill(&mut spec.top, spec.bottom, pixel_height, bounds.y_max);
			fill(&mut spec.bottom, spec.top, pixel_height, bounds.y_min);
		}

		spec
			.projection_to_world_pixels(&self.geometry)
			.ok_or_else(|| TileSourceError::request("projection units need a projected source"))
	}
}

#[cfg(test)]
mod tests {
	use super::super::tests::{open, utm_dataset, world_dataset};
	use crate::{ColorInterp, MemoryDataset, SourceOptions};
	use anyhow::Result;
	use std::sync::Arc;
	use terratiles_core::{Crs, PixelRegion, RegionSpec, ScaleCache, TileSourceError, Units};

	fn mercator_options() -> SourceOptions {
		SourceOptions::default()
			.with_projection("EPSG:3857")
			.with_scale_cache(Arc::new(ScaleCache::new(4)))
	}

	#[test]
	fn full_world_in_projection_units() -> Result<()> {
		let source = open(world_dataset(), mercator_options());
		let units = source.geometry().projection.as_ref().unwrap().units_across_level0;
		let size = source.geometry().size_x as f64;

		let mut spec = RegionSpec::new(Units::Projection);
		spec.left = Some(-0.5 * units);
		spec.right = Some(0.5 * units);
		let region = source.resolve_region(&spec)?;
		assert_eq!((region.left, region.right), (0.0, size));
		Ok(())
	}

	#[test]
	fn missing_projection_edges_come_from_bounds() -> Result<()> {
		let source = open(utm_dataset(), mercator_options());
		let bounds = source.get_bounds(Some("EPSG:3857"))?.unwrap();
		let from_bounds = source.resolve_region(&RegionSpec::new(Units::Projection))?;
		let explicit = source.resolve_region(
			&RegionSpec::new(Units::Projection).with_edges(bounds.x_min, bounds.y_max, bounds.x_max, bounds.y_min),
		)?;
		assert_eq!(from_bounds, explicit);
		assert!(!from_bounds.is_empty());
		Ok(())
	}

	#[test]
	fn width_in_base_pixels_is_applied_after_conversion() -> Result<()> {
		let source = open(utm_dataset(), mercator_options());
		let bounds = source.get_bounds(Some("EPSG:3857"))?.unwrap();
		let mut spec = RegionSpec::new(Units::Projection);
		spec.left = Some(bounds.x_min);
		spec.width = Some(100.0);
		spec.units_wh = Some(Units::BasePixels);
		let region = source.resolve_region(&spec)?;
		assert!((region.width() - 100.0).abs() < 1e-6);
		Ok(())
	}

	#[test]
	fn wgs84_edges_on_a_pixel_source() -> Result<()> {
		let source = open(world_dataset(), SourceOptions::default());
		let spec = RegionSpec::new(Units::parse("wgs84")?).with_edges(-90.0, 45.0, 0.0, 0.0);
		assert_eq!(source.resolve_region(&spec)?, PixelRegion::new(180.0, 90.0, 360.0, 180.0));

		let mut spec = RegionSpec::new(Units::Crs(Crs::wgs84()));
		spec.left = Some(-90.0);
		spec.width = Some(90.0);
		spec.top = Some(45.0);
		assert_eq!(source.resolve_region(&spec)?, PixelRegion::new(180.0, 90.0, 360.0, 360.0));
		Ok(())
	}

	#[test]
	fn projection_units_without_projection_use_the_native_crs() -> Result<()> {
		let source = open(utm_dataset(), SourceOptions::default());
		let spec = RegionSpec::new(Units::Projection).with_edges(503_000.0, 5_597_000.0, 506_000.0, 5_594_000.0);
		assert_eq!(source.resolve_region(&spec)?, PixelRegion::new(100.0, 100.0, 200.0, 200.0));
		Ok(())
	}

	#[test]
	fn pixel_and_fraction_units() -> Result<()> {
		let source = open(utm_dataset(), SourceOptions::default());
		let spec = RegionSpec::new(Units::Fraction).with_edges(0.5, 0.5, 1.0, 1.0);
		assert_eq!(source.resolve_region(&spec)?, PixelRegion::new(500.0, 400.0, 1000.0, 800.0));

		let mut spec = RegionSpec::new(Units::BasePixels);
		spec.right = Some(50.0);
		spec.width = Some(20.0);
		assert_eq!(source.resolve_region(&spec)?, PixelRegion::new(30.0, 0.0, 50.0, 800.0));
		Ok(())
	}

	#[test]
	fn coordinate_units_without_a_crs_are_a_request_error() {
		let source = open(
			MemoryDataset::new(10, 10).with_constant_band(ColorInterp::Gray, 1.0),
			SourceOptions::default(),
		);
		for units in [Units::Crs(Crs::wgs84()), Units::Projection] {
			let spec = RegionSpec::new(units).with_edges(0.0, 1.0, 1.0, 0.0);
			let err = source.resolve_region(&spec).unwrap_err();
			assert!(matches!(TileSourceError::of(&err), Some(TileSourceError::Request(_))));
		}
	}

	#[test]
	fn coordinate_units_need_one_edge_per_axis() {
		let source = open(world_dataset(), SourceOptions::default());
		let mut spec = RegionSpec::new(Units::Crs(Crs::wgs84()));
		spec.left = Some(0.0);
		let err = source.resolve_region(&spec).unwrap_err();
		assert!(matches!(TileSourceError::of(&err), Some(TileSourceError::Request(_))));
	}
}
