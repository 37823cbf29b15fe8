pub mod probe;
pub mod region;
pub mod tile;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use terratiles_source::{GeoTileSource, RasterDescriptor, SourceOptions};

/// Which raster to open and how.
#[derive(Args, Debug)]
pub struct SourceArgs {
	/// YAML description of the raster
	#[arg(required = true)]
	descriptor: PathBuf,

	/// YAML file with source options
	#[arg(long, short)]
	config: Option<PathBuf>,

	/// target projection of the pyramid, e.g. EPSG:3857
	#[arg(long, short)]
	projection: Option<String>,

	/// projection units per pixel at level 0
	#[arg(long)]
	units_per_pixel: Option<f64>,

	/// tile width and height in pixels
	#[arg(long)]
	tile_size: Option<u32>,
}

impl SourceArgs {
	pub fn open(&self) -> Result<GeoTileSource> {
		let mut options = match &self.config {
			Some(path) => SourceOptions::from_path(path)?,
			None => SourceOptions::default(),
		};
		if let Some(projection) = &self.projection {
			options = options.with_projection(projection);
		}
		if let Some(units_per_pixel) = self.units_per_pixel {
			options = options.with_units_per_pixel(units_per_pixel);
		}
		if let Some(tile_size) = self.tile_size {
			options.tile_size = tile_size;
		}

		let dataset = RasterDescriptor::from_path(&self.descriptor)?.build();
		let path = self.descriptor.to_string_lossy();
		log::debug!("opening {path} with {options:?}");
		GeoTileSource::from_dataset(&path, Box::new(dataset), options).with_context(|| format!("opening {path}"))
	}
}
