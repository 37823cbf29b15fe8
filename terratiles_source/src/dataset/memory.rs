//! An in-memory raster engine.
//!
//! [`MemoryDataset`] holds band values in memory and implements window reads
//! and reprojection with nearest-neighbour sampling. It backs the tests and
//! the command line tool, where rasters are described in YAML.

use super::{
	BandMetadata, BandStatistics, CogReport, ColorInterp, RasterDataset, RasterEngine, WarpRequest, resolve_affine,
	resolve_crs,
};
use crate::RasterBuffer;
use anyhow::{Context, Result, anyhow, ensure};
use serde::Deserialize;
use std::{
	collections::{BTreeMap, HashMap},
	fs::File,
	io::{BufReader, Read},
	path::Path,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
use terratiles_core::{Affine, CrsTransform, GroundControlPoint, PixelWindow, TileSourceError};

/// Counts pixel reads and warps of a dataset and all its clones.
#[derive(Clone, Debug, Default)]
pub struct IoCounter(Arc<AtomicUsize>);

impl IoCounter {
	pub fn get(&self) -> usize {
		self.0.load(Ordering::SeqCst)
	}

	fn increment(&self) {
		self.0.fetch_add(1, Ordering::SeqCst);
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryBand {
	pub values: Vec<f64>,
	pub metadata: BandMetadata,
	pub statistics: Option<BandStatistics>,
}

#[derive(Clone, Debug)]
pub struct MemoryDataset {
	driver: String,
	width: u32,
	height: u32,
	bands: Vec<MemoryBand>,
	crs: Option<String>,
	transform: Affine,
	gcps: Vec<GroundControlPoint>,
	gcp_crs: Option<String>,
	metadata: BTreeMap<String, String>,
	cog: CogReport,
	io: IoCounter,
}

impl MemoryDataset {
	pub fn new(width: u32, height: u32) -> Self {
		Self {
			driver: "MEM".to_string(),
			width,
			height,
			bands: Vec::new(),
			crs: None,
			transform: Affine::identity(),
			gcps: Vec::new(),
			gcp_crs: None,
			metadata: BTreeMap::new(),
			cog: CogReport::default(),
			io: IoCounter::default(),
		}
	}

	pub fn with_driver(mut self, driver: &str) -> Self {
		self.driver = driver.to_string();
		self
	}

	pub fn with_crs(mut self, crs: &str) -> Self {
		self.crs = Some(crs.to_string());
		self
	}

	pub fn with_transform(mut self, transform: Affine) -> Self {
		self.transform = transform;
		self
	}

	pub fn with_gcps(mut self, gcps: Vec<GroundControlPoint>, crs: &str) -> Self {
		self.gcps = gcps;
		self.gcp_crs = Some(crs.to_string());
		self
	}

	pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
		self.metadata.insert(key.to_string(), value.to_string());
		self
	}

	pub fn with_cog_report(mut self, report: CogReport) -> Self {
		self.cog = report;
		self
	}

	/// Adds a band whose value at `(x, y)` is `value(x, y)`.
	pub fn with_band_fn(mut self, metadata: BandMetadata, value: impl Fn(u32, u32) -> f64) -> Self {
		let mut values = Vec::with_capacity(self.width as usize * self.height as usize);
		for y in 0..self.height {
			for x in 0..self.width {
				values.push(value(x, y));
			}
		}
		self.bands.push(MemoryBand {
			values,
			metadata,
			statistics: None,
		});
		self
	}

	pub fn with_constant_band(self, interpretation: ColorInterp, value: f64) -> Self {
		let metadata = BandMetadata {
			interpretation,
			..Default::default()
		};
		self.with_band_fn(metadata, |_, _| value)
	}

	/// Overrides the statistics reported for the 1-based band `index`.
	pub fn with_statistics(mut self, index: usize, statistics: BandStatistics) -> Self {
		if let Some(band) = index.checked_sub(1).and_then(|i| self.bands.get_mut(i)) {
			band.statistics = Some(statistics);
		}
		self
	}

	pub fn io_counter(&self) -> IoCounter {
		self.io.clone()
	}

	fn memory_band(&self, index: usize) -> Result<&MemoryBand> {
		index
			.checked_sub(1)
			.and_then(|i| self.bands.get(i))
			.ok_or_else(|| anyhow!("band {index} does not exist (bands: {})", self.bands.len()))
	}

	fn value(&self, band: usize, x: u32, y: u32) -> f64 {
		self.bands[band].values[y as usize * self.width as usize + x as usize]
	}

	fn nodata(&self, band: usize) -> f64 {
		self.bands[band].metadata.nodata.unwrap_or(0.0)
	}
}

impl RasterDataset for MemoryDataset {
	fn driver(&self) -> &str {
		&self.driver
	}

	fn width(&self) -> u32 {
		self.width
	}

	fn height(&self) -> u32 {
		self.height
	}

	fn band_count(&self) -> usize {
		self.bands.len()
	}

	fn crs(&self) -> Option<String> {
		self.crs.clone()
	}

	fn transform(&self) -> Affine {
		self.transform
	}

	fn gcps(&self) -> Vec<GroundControlPoint> {
		self.gcps.clone()
	}

	fn gcp_crs(&self) -> Option<String> {
		self.gcp_crs.clone()
	}

	fn metadata(&self) -> BTreeMap<String, String> {
		self.metadata.clone()
	}

	fn band(&self, index: usize) -> Result<BandMetadata> {
		Ok(self.memory_band(index)?.metadata.clone())
	}

	fn statistics(&mut self, index: usize) -> Result<Option<BandStatistics>> {
		let band = self.memory_band(index)?;
		if band.statistics.is_some() {
			return Ok(band.statistics);
		}
		let values: Vec<f64> = band
			.values
			.iter()
			.copied()
			.filter(|v| v.is_finite() && Some(*v) != band.metadata.nodata)
			.collect();
		if values.is_empty() {
			return Ok(None);
		}
		let n = values.len() as f64;
		let mean = values.iter().sum::<f64>() / n;
		let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
		Ok(Some(BandStatistics {
			min: values.iter().copied().fold(f64::INFINITY, f64::min),
			max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
			mean,
			stdev: variance.sqrt(),
		}))
	}

	fn read(&mut self, window: &PixelWindow, out_width: u32, out_height: u32) -> Result<RasterBuffer> {
		ensure!(
			!window.is_empty() && window.col_end() <= u64::from(self.width) && window.row_end() <= u64::from(self.height),
			"window {window:?} is outside of the {}×{} raster",
			self.width,
			self.height
		);
		ensure!(out_width > 0 && out_height > 0, "output size must not be empty");
		self.io.increment();

		let mut buffer = RasterBuffer::new(out_width, out_height, self.bands.len());
		let x_step = window.width as f64 / f64::from(out_width);
		let y_step = window.height as f64 / f64::from(out_height);
		for j in 0..out_height {
			let row = window.row_off + ((f64::from(j) + 0.5) * y_step) as u64;
			let row = row.min(window.row_end() - 1) as u32;
			for i in 0..out_width {
				let col = window.col_off + ((f64::from(i) + 0.5) * x_step) as u64;
				let col = col.min(window.col_end() - 1) as u32;
				for band in 0..self.bands.len() {
					buffer.pixel_mut(i, j)[band] = self.value(band, col, row);
				}
			}
		}
		Ok(buffer)
	}

	fn warp(&mut self, request: &WarpRequest) -> Result<RasterBuffer> {
		let src_crs = resolve_crs(&*self)?.context("cannot warp a dataset without CRS")?;
		let src_affine = resolve_affine(&*self)?;
		let transform = CrsTransform::new(&request.crs, &src_crs)?;
		self.io.increment();

		let band_count = self.bands.len();
		let mut buffer = RasterBuffer::new(
			request.width,
			request.height,
			band_count + usize::from(request.add_alpha),
		);
		for j in 0..request.height {
			for i in 0..request.width {
				let (x, y) = request.transform.apply(f64::from(i) + 0.5, f64::from(j) + 0.5);
				let source = transform
					.transform(x, y)
					.and_then(|(sx, sy)| src_affine.invert(sx, sy))
					.ok()
					.filter(|(c, r)| *c >= 0.0 && *r >= 0.0 && *c < f64::from(self.width) && *r < f64::from(self.height));

				let pixel: Vec<f64> = match source {
					Some((c, r)) => (0..band_count).map(|b| self.value(b, c as u32, r as u32)).collect(),
					None => (0..band_count).map(|b| self.nodata(b)).collect(),
				};
				let out = buffer.pixel_mut(i, j);
				out[..band_count].copy_from_slice(&pixel);
				if request.add_alpha {
					out[band_count] = if source.is_some() { 255.0 } else { 0.0 };
				}
			}
		}
		Ok(buffer)
	}

	fn cog_report(&mut self) -> Result<CogReport> {
		Ok(self.cog.clone())
	}
}

/// YAML description of an in-memory raster.
///
/// ```yaml
/// width: 1000
/// height: 800
/// crs: EPSG:32633
/// geotransform: [500000, 30, 0, 5600000, 0, -30]
/// bands:
///   - interpretation: gray
///     fill: 42
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RasterDescriptor {
	pub width: u32,
	pub height: u32,
	pub driver: Option<String>,
	pub crs: Option<String>,
	/// GDAL order: `[x_origin, x_res, row_rotation, y_origin, col_rotation, y_res]`.
	pub geotransform: Option<[f64; 6]>,
	#[serde(default)]
	pub gcps: Vec<GroundControlPoint>,
	pub gcp_crs: Option<String>,
	#[serde(default)]
	pub bands: Vec<BandDescriptor>,
	#[serde(default)]
	pub metadata: BTreeMap<String, String>,
	#[serde(default)]
	pub cog: CogReport,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BandDescriptor {
	#[serde(default)]
	pub fill: f64,
	#[serde(default)]
	pub interpretation: ColorInterp,
	pub nodata: Option<f64>,
	pub scale: Option<f64>,
	pub offset: Option<f64>,
	pub units: Option<String>,
	pub description: Option<String>,
	pub color_table: Option<Vec<[u8; 4]>>,
}

impl RasterDescriptor {
	pub fn from_reader(reader: impl Read) -> Result<Self> {
		Ok(serde_yaml_ng::from_reader(reader)?)
	}

	pub fn from_string(text: &str) -> Result<Self> {
		Ok(serde_yaml_ng::from_str(text)?)
	}

	pub fn from_path(path: &Path) -> Result<Self> {
		let file = File::open(path).with_context(|| format!("opening raster descriptor {path:?}"))?;
		Self::from_reader(BufReader::new(file)).with_context(|| format!("parsing raster descriptor {path:?}"))
	}

	pub fn build(&self) -> MemoryDataset {
		let mut dataset = MemoryDataset::new(self.width, self.height);
		if let Some(driver) = &self.driver {
			dataset = dataset.with_driver(driver);
		}
		if let Some(crs) = &self.crs {
			dataset = dataset.with_crs(crs);
		}
		if let Some(gt) = self.geotransform {
			dataset = dataset.with_transform(Affine::from_gdal(gt));
		}
		if !self.gcps.is_empty() {
			dataset.gcps = self.gcps.clone();
			dataset.gcp_crs = self.gcp_crs.clone();
		}
		for band in &self.bands {
			let metadata = BandMetadata {
				interpretation: band.interpretation,
				nodata: band.nodata,
				scale: band.scale,
				offset: band.offset,
				units: band.units.clone(),
				description: band.description.clone(),
				color_table: band.color_table.clone(),
			};
			let fill = band.fill;
			dataset = dataset.with_band_fn(metadata, move |_, _| fill);
		}
		dataset.metadata = self.metadata.clone();
		dataset.cog = self.cog.clone();
		dataset
	}
}

enum Entry {
	Dataset(MemoryDataset),
	Unreadable(String),
}

/// Serves registered [`MemoryDataset`]s by path. Every `open` returns a fresh clone.
#[derive(Default)]
pub struct MemoryEngine {
	entries: HashMap<String, Entry>,
}

impl MemoryEngine {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, path: &str, dataset: MemoryDataset) {
		self.entries.insert(path.to_string(), Entry::Dataset(dataset));
	}

	/// Registers a path that exists but cannot be decoded.
	pub fn insert_unreadable(&mut self, path: &str, reason: &str) {
		self.entries.insert(path.to_string(), Entry::Unreadable(reason.to_string()));
	}
}

impl RasterEngine for MemoryEngine {
	fn open(&self, path: &str) -> Result<Box<dyn RasterDataset>> {
		match self.entries.get(path) {
			Some(Entry::Dataset(dataset)) => Ok(Box::new(dataset.clone())),
			Some(Entry::Unreadable(reason)) => Err(TileSourceError::CannotOpen(format!("{path}: {reason}")).into()),
			None => Err(TileSourceError::NotFound(path.to_string()).into()),
		}
	}
}
