//! Georeferencing of an opened raster: resolved CRS and transform, bounds in
//! arbitrary CRS, base pixel size and the world width of a target projection.

use crate::{RasterDataset, SourceOptions, resolve_affine, resolve_crs};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use terratiles_core::{
	Affine, BoundsRecord, Crs, CrsTransform, GroundControlPoint, MAX_LATITUDE, MAX_LATITUDE_WITHOUT_POLES,
	TileSourceError, geodesic_distance,
};

/// Snapshot of a dataset's identity, read once when the source is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct RasterIdentity {
	pub driver: String,
	pub width: u32,
	pub height: u32,
	pub band_count: usize,
	/// Resolved CRS, see [`resolve_crs`].
	pub crs: Option<Crs>,
	/// Resolved transform, see [`resolve_affine`].
	pub affine: Affine,
	pub declared_crs: Option<String>,
	pub declared_transform: Affine,
	pub gcps: Vec<GroundControlPoint>,
	pub gcp_crs: Option<String>,
	pub metadata: BTreeMap<String, String>,
}

impl RasterIdentity {
	pub fn read(dataset: &dyn RasterDataset) -> Result<RasterIdentity> {
		Ok(RasterIdentity {
			driver: dataset.driver().to_string(),
			width: dataset.width(),
			height: dataset.height(),
			band_count: dataset.band_count(),
			crs: resolve_crs(dataset).context("resolving the raster CRS")?,
			affine: resolve_affine(dataset).context("resolving the raster transform")?,
			declared_crs: dataset.crs(),
			declared_transform: dataset.transform(),
			gcps: dataset.gcps(),
			gcp_crs: dataset.gcp_crs(),
			metadata: dataset.metadata(),
		})
	}

	/// Footprint of the raster in `target`, or in the native CRS.
	pub fn compute_bounds(&self, target: Option<&Crs>) -> Result<Option<BoundsRecord>> {
		let Some(native) = &self.crs else {
			return Ok(None);
		};
		let mut corners = self.affine.corners(f64::from(self.width), f64::from(self.height));

		if native.is_geographic()
			&& let Some(target) = target
		{
			let y_limit = if has_poles(target) {
				MAX_LATITUDE
			} else {
				MAX_LATITUDE_WITHOUT_POLES
			};
			corners = corners.wrap_geographic(y_limit)?;
		}

		match target {
			Some(target) if target != native => {
				let corners = CrsTransform::new(native, target)?
					.transform_corners(&corners)
					.with_context(|| format!("reprojecting the raster corners from {native} to {target}"))?;
				Ok(Some(BoundsRecord::from_corners(corners, target.name())))
			}
			_ => Ok(Some(BoundsRecord::from_corners(corners, native.name()))),
		}
	}

	/// Mean edge length of a base pixel in meters, from the geodesic lengths
	/// of the four footprint edges on the WGS84 ellipsoid.
	pub fn pixel_size_in_meters(&self) -> Result<Option<f64>> {
		let Some(bounds) = self.compute_bounds(Some(&Crs::wgs84()))? else {
			return Ok(None);
		};
		let c = bounds.corners;
		let perimeter = geodesic_distance(c.ul, c.ur)
			+ geodesic_distance(c.ur, c.lr)
			+ geodesic_distance(c.lr, c.ll)
			+ geodesic_distance(c.ll, c.ul);
		Ok(Some(perimeter / (2.0 * (f64::from(self.width) + f64::from(self.height)))))
	}
}

/// Whether `target` can represent the north pole.
fn has_poles(target: &Crs) -> bool {
	CrsTransform::new(&Crs::wgs84(), target)
		.and_then(|t| t.transform(0.0, 90.0))
		.is_ok_and(|(_, y)| y.is_finite())
}

/// Width of the level 0 tile in units of `projection`.
///
/// Explicit `units_per_pixel` wins. Otherwise the distance between -180° and
/// 180° on the equator is measured once per projection and kept in the
/// scale cache of `options`.
pub(super) fn units_across_level0(projection: &Crs, options: &SourceOptions) -> Result<f64> {
	if let Some(units_per_pixel) = options.units_per_pixel {
		let units = units_per_pixel * f64::from(options.tile_size);
		if !(units.is_finite() && units > 0.0) {
			return Err(TileSourceError::config(format!(
				"units per pixel must be positive, got {units_per_pixel}"
			)));
		}
		return Ok(units);
	}

	options.scale_cache.get_or_try_insert_with(projection.name(), || {
		let missing = || TileSourceError::config(format!("unitsPerPixel must be specified for {projection}"));
		let equator = CrsTransform::new(&Crs::wgs84(), projection)?;
		let (Ok(west), Ok(east)) = (equator.transform(-180.0, 0.0), equator.transform(180.0, 0.0)) else {
			return Err(missing());
		};
		let units = (east.0 - west.0).abs();
		if !units.is_finite() || units == 0.0 {
			return Err(missing());
		}
		log::debug!("{projection} spans {units} units around the equator");
		Ok(units)
	})
}
