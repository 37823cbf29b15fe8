//! The geospatial tile source.
//!
//! [`GeoTileSource`] exposes a georeferenced raster as a tile pyramid. At
//! open it resolves the raster's CRS and affine transform, measures its base
//! pixel size and derives the [`PyramidGeometry`], either in source pixels or
//! in a target projection. Afterwards it translates tile, region and point
//! requests into window reads or warps on the underlying [`RasterDataset`].
//!
//! All access to the dataset handle goes through a reentrant lock, so a
//! source can be shared between threads.

mod coords;
mod georef;
mod info;
mod read;
mod region;

pub use georef::RasterIdentity;
pub use info::*;
pub use read::*;

use crate::{BandInfoMap, RasterDataset, RasterEngine, SourceOptions, Style, build_style, dataset_path};
use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::{cell::RefCell, collections::HashMap};
use terratiles_core::{BoundsRecord, Crs, ProjectionConfig, PyramidGeometry, TileSourceError};

pub struct GeoTileSource {
	path: String,
	options: SourceOptions,
	identity: RasterIdentity,
	geometry: PyramidGeometry,
	pixel_size: Option<f64>,
	style: Style,
	dataset: ReentrantMutex<RefCell<Box<dyn RasterDataset>>>,
	tile_lock: Mutex<()>,
	bounds: RwLock<HashMap<String, Option<BoundsRecord>>>,
	band_info: RwLock<Option<BandInfoMap>>,
}

impl GeoTileSource {
	/// Opens `path` through `engine`. Remote locations are rewritten with [`dataset_path`].
	pub fn open(engine: &dyn RasterEngine, path: &str, options: SourceOptions) -> Result<GeoTileSource> {
		log::debug!("opening raster {path:?}");
		let dataset = engine
			.open(&dataset_path(path))
			.with_context(|| format!("opening raster {path:?}"))?;
		Self::from_dataset(path, dataset, options)
	}

	/// Builds a source over an already opened dataset.
	pub fn from_dataset(path: &str, dataset: Box<dyn RasterDataset>, options: SourceOptions) -> Result<GeoTileSource> {
		let dataset = ReentrantMutex::new(RefCell::new(dataset));
		let identity = {
			let guard = dataset.lock();
			let handle = guard.borrow();
			RasterIdentity::read(handle.as_ref())?
		};
		log::trace!(
			"raster {path:?}: {}×{} pixels, {} bands, driver {}, crs {:?}, {:?}",
			identity.width,
			identity.height,
			identity.band_count,
			identity.driver,
			identity.crs,
			identity.affine
		);

		if options.tile_size == 0 {
			return Err(TileSourceError::config("tile size must be positive"));
		}
		let projection = options.projection.as_deref().map(Crs::parse).transpose()?;
		if let Some(crs) = &projection
			&& crs.is_geographic()
		{
			return Err(TileSourceError::config(format!(
				"projection {crs} is geographic, tiles need a projection in linear units"
			)));
		}

		let pixel_size = identity.pixel_size_in_meters().context("measuring the pixel size")?;
		log::trace!("pixel size: {pixel_size:?} m");
		let is_projected = projection.is_some() || identity.driver.eq_ignore_ascii_case("png");
		let scale = pixel_size.filter(|s| s.is_finite() && *s > 0.0);
		if is_projected && scale.is_none() {
			return Err(TileSourceError::config(
				"file does not have a projected scale, so it cannot be opened as a projected pyramid",
			));
		}

		let tile_size = options.tile_size;
		let geometry = match (projection, scale) {
			(Some(crs), Some(scale)) => {
				let units = georef::units_across_level0(&crs, &options)?;
				PyramidGeometry::projected(
					identity.width,
					identity.height,
					tile_size,
					tile_size,
					ProjectionConfig::new(crs, units)?,
					scale,
				)?
			}
			_ => PyramidGeometry::pixel(identity.width, identity.height, tile_size, tile_size)?,
		};
		log::debug!(
			"raster {path:?}: {} levels, {}×{} pixels at the finest level",
			geometry.levels,
			geometry.size_x,
			geometry.size_y
		);

		let mut source = GeoTileSource {
			path: path.to_string(),
			options,
			identity,
			geometry,
			pixel_size,
			style: Style::default(),
			dataset,
			tile_lock: Mutex::new(()),
			bounds: RwLock::new(HashMap::new()),
			band_info: RwLock::new(None),
		};
		let bands = source.get_band_information()?;
		log::debug!(
			"raster {path:?}: bands [{}]",
			bands.iter().map(|(i, b)| format!("{i}: {}", b.interpretation)).join(", ")
		);
		source.style = build_style(source.options.style.as_ref(), &bands, source.geometry.is_projected())
			.context("validating the style")?;
		Ok(source)
	}

	/// Runs `f` with exclusive access to the dataset handle.
	fn with_dataset<R>(&self, f: impl FnOnce(&mut dyn RasterDataset) -> Result<R>) -> Result<R> {
		let guard = self.dataset.lock();
		let mut handle = guard
			.try_borrow_mut()
			.map_err(|_| anyhow!("dataset handle of {:?} is already in use on this thread", self.path))?;
		f(handle.as_mut())
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	pub fn options(&self) -> &SourceOptions {
		&self.options
	}

	pub fn geometry(&self) -> &PyramidGeometry {
		&self.geometry
	}

	pub fn identity(&self) -> &RasterIdentity {
		&self.identity
	}

	pub fn projection(&self) -> Option<&Crs> {
		self.geometry.projection.as_ref().map(|p| &p.crs)
	}

	/// The resolved CRS of the raster.
	pub fn resolve_crs(&self) -> Option<&Crs> {
		self.identity.crs.as_ref()
	}

	/// The resolved pixel to CRS transform of the raster.
	pub fn resolve_affine(&self) -> terratiles_core::Affine {
		self.identity.affine
	}

	/// Mean edge length of a base pixel in meters, measured on the WGS84 ellipsoid.
	pub fn pixel_size_in_meters(&self) -> Option<f64> {
		self.pixel_size
	}

	pub fn style(&self) -> &Style {
		&self.style
	}

	/// Bounds of the raster in `crs`, or in its native CRS when `crs` is `None`.
	///
	/// Returns `None` for rasters without CRS. Results are memoized per CRS.
	pub fn get_bounds(&self, crs: Option<&str>) -> Result<Option<BoundsRecord>> {
		let target = crs.map(Crs::parse).transpose()?;
		self.bounds_in(target.as_ref())
	}

	fn bounds_in(&self, target: Option<&Crs>) -> Result<Option<BoundsRecord>> {
		let key = target.map_or(terratiles_core::NATIVE_BOUNDS_KEY, Crs::name).to_string();
		if let Some(bounds) = self.bounds.read().get(&key) {
			return Ok(bounds.clone());
		}

		let _guard = self.dataset.lock();
		if let Some(bounds) = self.bounds.read().get(&key) {
			return Ok(bounds.clone());
		}
		let bounds = self
			.identity
			.compute_bounds(target)
			.with_context(|| format!("computing bounds in {key}"))?;
		log::trace!("bounds in {key}: {bounds:?}");
		self.bounds.write().insert(key, bounds.clone());
		Ok(bounds)
	}
}

impl std::fmt::Debug for GeoTileSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GeoTileSource")
			.field("path", &self.path)
			.field("geometry", &self.geometry)
			.finish_non_exhaustive()
	}
}
