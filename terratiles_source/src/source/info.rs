//! Descriptive information about a source: metadata, band information and
//! the cache identity.

use super::GeoTileSource;
use crate::{BandInfo, BandInfoMap, BandSelector, SourceOptions};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use terratiles_core::{BoundsRecord, GroundControlPoint, PyramidGeometry, TileSourceError};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
	pub geospatial: bool,
	#[serde(flatten)]
	pub geometry: PyramidGeometry,
	/// Bounds in the target projection, or in the native CRS.
	pub bounds: Option<BoundsRecord>,
	pub source_bounds: Option<BoundsRecord>,
	pub bands: BandInfoMap,
	#[serde(flatten)]
	pub magnification: Magnification,
}

/// Size of a base pixel in millimeters. Rasters have no optical magnification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Magnification {
	pub magnification: Option<f64>,
	pub mm_x: Option<f64>,
	pub mm_y: Option<f64>,
}

/// What the raster engine reports about the file itself.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InternalMetadata {
	#[serde(rename = "driverShortName")]
	pub driver: String,
	#[serde(rename = "RasterXSize")]
	pub raster_x_size: u32,
	#[serde(rename = "RasterYSize")]
	pub raster_y_size: u32,
	/// Resolved transform in GDAL order `(c, a, b, f, d, e)`.
	#[serde(rename = "Affine")]
	pub affine: [f64; 6],
	#[serde(rename = "Projection")]
	pub projection: Option<String>,
	#[serde(rename = "GCPProjection")]
	pub gcp_projection: Option<String>,
	#[serde(rename = "Metadata")]
	pub metadata: BTreeMap<String, String>,
	#[serde(rename = "GCPs", skip_serializing_if = "Vec::is_empty")]
	pub gcps: Vec<GroundControlPoint>,
}

/// Identifies a source for caching: path, projection and units per pixel.
pub fn cache_key(path: &str, options: &SourceOptions) -> String {
	format!(
		"{path},{},{}",
		options.projection.as_deref().unwrap_or("None"),
		options
			.units_per_pixel
			.map_or_else(|| "None".to_string(), |u| u.to_string())
	)
}

impl GeoTileSource {
	/// Information on every band, keyed by 1-based band number.
	///
	/// Read once from the dataset and memoized. Statistics the engine cannot
	/// provide are left out.
	pub fn get_band_information(&self) -> Result<BandInfoMap> {
		if let Some(bands) = self.band_info.read().as_ref() {
			return Ok(bands.clone());
		}

		let _guard = self.dataset.lock();
		if let Some(bands) = self.band_info.read().as_ref() {
			return Ok(bands.clone());
		}
		let bands = self.with_dataset(|ds| {
			(1..=ds.band_count())
				.map(|index| {
					let metadata = ds.band(index).with_context(|| format!("reading band {index}"))?;
					let statistics = ds.statistics(index).unwrap_or_else(|err| {
						log::debug!("no statistics for band {index}: {err:#}");
						None
					});
					Ok((index, BandInfo::new(metadata, statistics)))
				})
				.collect::<Result<BandInfoMap>>()
		})?;
		*self.band_info.write() = Some(bands.clone());
		Ok(bands)
	}

	/// Validates a band selector against this source, see [`crate::band_number`].
	pub fn band_number(&self, selector: &BandSelector, strict: bool) -> Result<Option<i64>> {
		crate::band_number(&self.get_band_information()?, selector, strict)
	}

	pub fn get_native_magnification(&self) -> Magnification {
		let mm = self.pixel_size.map(|meters| meters * 1000.0);
		Magnification {
			magnification: None,
			mm_x: mm,
			mm_y: mm,
		}
	}

	pub fn get_metadata(&self) -> Result<SourceMetadata> {
		Ok(SourceMetadata {
			geospatial: self.identity.crs.is_some(),
			geometry: self.geometry.clone(),
			bounds: self.bounds_in(self.projection())?,
			source_bounds: self.bounds_in(None)?,
			bands: self.get_band_information()?,
			magnification: self.get_native_magnification(),
		})
	}

	pub fn get_internal_metadata(&self) -> InternalMetadata {
		let identity = &self.identity;
		InternalMetadata {
			driver: identity.driver.clone(),
			raster_x_size: identity.width,
			raster_y_size: identity.height,
			affine: identity.affine.to_gdal(),
			projection: identity.declared_crs.clone(),
			gcp_projection: identity.gcp_crs.clone(),
			metadata: identity.metadata.clone(),
			gcps: identity.gcps.clone(),
		}
	}

	/// Checks whether the file is a cloud optimized GeoTIFF.
	///
	/// Structural errors, and with `strict` also warnings, fail with
	/// [`TileSourceError::Inefficient`]. Otherwise warnings are logged when
	/// `warn` is set.
	pub fn validate_cog(&self, strict: bool, warn: bool) -> Result<bool> {
		let report = self
			.with_dataset(|ds| ds.cog_report())
			.with_context(|| format!("validating {} as cloud optimized GeoTIFF", self.path))?;
		if !report.errors.is_empty() {
			return Err(TileSourceError::Inefficient(report.errors).into());
		}
		if strict && !report.warnings.is_empty() {
			return Err(TileSourceError::Inefficient(report.warnings).into());
		}
		if warn {
			for warning in &report.warnings {
				log::warn!("{}: {warning}", self.path);
			}
		}
		Ok(true)
	}

	/// The cache identity of this source, see [`cache_key`].
	pub fn state(&self) -> String {
		cache_key(&self.path, &self.options)
	}
}

#[cfg(test)]
mod tests {
	use super::super::tests::{open, utm_dataset, world_dataset};
	use super::*;
	use crate::{BandMetadata, BandStatistics, CogReport, ColorInterp, MemoryDataset};
	use pretty_assertions::assert_eq;
	use serde_json::json;
	use std::sync::Arc;
	use terratiles_core::{Affine, ScaleCache};

	#[test]
	fn band_information_is_read_once() -> Result<()> {
		let dataset = utm_dataset()
			.with_band_fn(
				BandMetadata {
					interpretation: ColorInterp::Alpha,
					units: Some(String::new()),
					description: Some("mask".into()),
					..Default::default()
				},
				|_, _| 255.0,
			)
			.with_statistics(
				2,
				BandStatistics {
					min: 0.0,
					max: 255.0,
					mean: 200.0,
					stdev: 3.0,
				},
			);
		let source = open(dataset, SourceOptions::default());
		let bands = source.get_band_information()?;
		assert_eq!(bands.len(), 2);
		assert_eq!(bands[&1].nodata, Some(0.0));
		assert_eq!(bands[&1].min, Some(1.0));
		assert_eq!(bands[&2].mean, Some(200.0));
		assert_eq!(bands[&2].units, None);
		assert_eq!(bands[&2].description.as_deref(), Some("mask"));
		assert_eq!(source.band_number(&"alpha".into(), true)?, Some(2));
		assert_eq!(source.band_number(&BandSelector::Index(3), false)?, None);
		assert!(source.band_number(&"red".into(), true).is_err());
		Ok(())
	}

	#[test]
	fn metadata_of_a_pixel_source() -> Result<()> {
		let source = open(utm_dataset(), SourceOptions::default());
		let metadata = source.get_metadata()?;
		assert!(metadata.geospatial);
		assert_eq!(metadata.bounds, metadata.source_bounds);
		let mm = metadata.magnification.mm_x.unwrap();
		assert!((mm - 30_000.0).abs() < 100.0, "mm {mm}");

		let value = serde_json::to_value(&metadata)?;
		assert_eq!(value["levels"], json!(3));
		assert_eq!(value["sizeX"], json!(1000));
		assert_eq!(value["sourceSizeY"], json!(800));
		assert_eq!(value["tileWidth"], json!(256));
		assert_eq!(value["magnification"], json!(null));
		assert_eq!(value["sourceBounds"]["srs"], json!("EPSG:32633"));
		assert_eq!(value["sourceBounds"]["ul"], json!({"x": 500000.0, "y": 5600000.0}));
		assert_eq!(value["bands"]["1"]["interpretation"], json!("gray"));
		Ok(())
	}

	#[test]
	fn metadata_of_a_projected_source() -> Result<()> {
		let options = SourceOptions::default()
			.with_projection("EPSG:3857")
			.with_scale_cache(Arc::new(ScaleCache::new(4)));
		let source = open(world_dataset(), options);
		let metadata = source.get_metadata()?;
		assert_eq!(metadata.bounds.as_ref().map(|b| b.srs.as_str()), Some("EPSG:3857"));
		assert_eq!(metadata.source_bounds.as_ref().map(|b| b.srs.as_str()), Some("EPSG:4326"));
		assert_eq!(metadata.geometry.size_x, 256 << (metadata.geometry.levels - 1));
		Ok(())
	}

	#[test]
	fn ungeoreferenced_source() -> Result<()> {
		let source = open(
			MemoryDataset::new(300, 200).with_constant_band(ColorInterp::Gray, 1.0),
			SourceOptions::default(),
		);
		let metadata = source.get_metadata()?;
		assert!(!metadata.geospatial);
		assert_eq!(metadata.bounds, None);
		assert_eq!(metadata.magnification, Magnification::default());
		Ok(())
	}

	#[test]
	fn internal_metadata() -> Result<()> {
		let dataset = MemoryDataset::new(10, 20)
			.with_driver("GTiff")
			.with_crs("EPSG:32633")
			.with_transform(Affine::north_up(100.0, 200.0, 2.0, 3.0))
			.with_metadata("AREA_OR_POINT", "Area")
			.with_constant_band(ColorInterp::Gray, 1.0);
		let source = open(dataset, SourceOptions::default());
		let value = serde_json::to_value(source.get_internal_metadata())?;
		assert_eq!(
			value,
			json!({
				"driverShortName": "GTiff",
				"RasterXSize": 10,
				"RasterYSize": 20,
				"Affine": [100.0, 2.0, 0.0, 200.0, 0.0, -3.0],
				"Projection": "EPSG:32633",
				"GCPProjection": null,
				"Metadata": {"AREA_OR_POINT": "Area"},
			})
		);
		Ok(())
	}

	#[test]
	fn cog_validation() -> Result<()> {
		let report = |errors: &[&str], warnings: &[&str]| CogReport {
			errors: errors.iter().map(|s| s.to_string()).collect(),
			warnings: warnings.iter().map(|s| s.to_string()).collect(),
		};
		let with_report = |r: CogReport| open(utm_dataset().with_cog_report(r), SourceOptions::default());

		assert!(with_report(CogReport::default()).validate_cog(true, true)?);

		let source = with_report(report(&[], &["no overviews"]));
		assert!(source.validate_cog(false, true)?);
		let err = source.validate_cog(true, false).unwrap_err();
		assert_eq!(
			TileSourceError::of(&err),
			Some(&TileSourceError::Inefficient(vec!["no overviews".into()]))
		);

		let source = with_report(report(&["not tiled"], &[]));
		let err = source.validate_cog(false, false).unwrap_err();
		assert_eq!(
			TileSourceError::of(&err),
			Some(&TileSourceError::Inefficient(vec!["not tiled".into()]))
		);
		Ok(())
	}

	#[test]
	fn cache_identity() {
		let options = SourceOptions::default().with_projection("EPSG:3857").with_units_per_pixel(2.5);
		assert_eq!(cache_key("a.tif", &options), "a.tif,EPSG:3857,2.5");
		assert_eq!(cache_key("a.tif", &SourceOptions::default()), "a.tif,None,None");

		let source = open(utm_dataset(), SourceOptions::default());
		assert_eq!(source.state(), "test.tif,None,None");
	}
}
