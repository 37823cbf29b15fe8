//! Options a tile source is opened with.
//!
//! ```yaml
//! projection: EPSG:3857
//! units_per_pixel: 10.0
//! tile_size: 512
//! style:
//!   bands:
//!     - band: red
//!       palette: ["#000000", "#ff0000"]
//! ```

use crate::StyleConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path, sync::Arc};
use terratiles_core::{DEFAULT_TILE_SIZE, ScaleCache};

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceOptions {
	/// Target projection of the pyramid. Without one, tiles are cut from source pixels.
	#[serde(default)]
	pub projection: Option<String>,

	/// Projection units per pixel at level 0. Required for projections
	/// whose world width cannot be derived from ±180° longitude.
	#[serde(default)]
	pub units_per_pixel: Option<f64>,

	#[serde(default = "default_tile_size")]
	pub tile_size: u32,

	#[serde(default)]
	pub style: Option<StyleConfig>,

	#[serde(skip, default = "ScaleCache::shared")]
	pub scale_cache: Arc<ScaleCache>,
}

fn default_tile_size() -> u32 {
	DEFAULT_TILE_SIZE
}

impl Default for SourceOptions {
	fn default() -> Self {
		Self {
			projection: None,
			units_per_pixel: None,
			tile_size: DEFAULT_TILE_SIZE,
			style: None,
			scale_cache: ScaleCache::shared(),
		}
	}
}

impl SourceOptions {
	pub fn with_projection(mut self, projection: &str) -> Self {
		self.projection = Some(projection.to_string());
		self
	}

	pub fn with_units_per_pixel(mut self, units_per_pixel: f64) -> Self {
		self.units_per_pixel = Some(units_per_pixel);
		self
	}

	pub fn with_style(mut self, style: StyleConfig) -> Self {
		self.style = Some(style);
		self
	}

	pub fn with_scale_cache(mut self, cache: Arc<ScaleCache>) -> Self {
		self.scale_cache = cache;
		self
	}

	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("opening options file {path:?}"))?;
		serde_yaml_ng::from_reader(BufReader::new(file)).with_context(|| format!("parsing options file {path:?}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn defaults() -> Result<()> {
		let options = SourceOptions::from_string("{}")?;
		assert_eq!(options.projection, None);
		assert_eq!(options.tile_size, 256);
		assert!(Arc::ptr_eq(&options.scale_cache, &ScaleCache::shared()));
		Ok(())
	}

	#[test]
	fn unknown_fields_are_rejected() {
		assert!(SourceOptions::from_string("projektion: EPSG:3857").is_err());
	}

	#[test]
	fn from_file() -> Result<()> {
		let mut file = tempfile::NamedTempFile::new()?;
		writeln!(file, "projection: EPSG:3857\nunits_per_pixel: 2.5\ntile_size: 512")?;
		let options = SourceOptions::from_path(file.path())?;
		assert_eq!(options.projection.as_deref(), Some("EPSG:3857"));
		assert_eq!(options.units_per_pixel, Some(2.5));
		assert_eq!(options.tile_size, 512);
		Ok(())
	}
}
