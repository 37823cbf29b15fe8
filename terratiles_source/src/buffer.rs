use anyhow::{Result, ensure};
use image::{DynamicImage, RgbaImage};

/// Pixel values of several bands, stored row by row with the bands of each
/// pixel next to each other (height × width × bands).
#[derive(Clone, Debug, PartialEq)]
pub struct RasterBuffer {
	pub width: u32,
	pub height: u32,
	pub bands: usize,
	pub data: Vec<f64>,
}

impl RasterBuffer {
	pub fn new(width: u32, height: u32, bands: usize) -> Self {
		Self {
			width,
			height,
			bands,
			data: vec![0.0; width as usize * height as usize * bands],
		}
	}

	pub fn from_data(width: u32, height: u32, bands: usize, data: Vec<f64>) -> Result<Self> {
		ensure!(
			data.len() == width as usize * height as usize * bands,
			"buffer of {} values does not fit {width}×{height}×{bands}",
			data.len()
		);
		Ok(Self {
			width,
			height,
			bands,
			data,
		})
	}

	fn offset(&self, x: u32, y: u32) -> usize {
		(y as usize * self.width as usize + x as usize) * self.bands
	}

	/// All band values of one pixel.
	pub fn pixel(&self, x: u32, y: u32) -> &[f64] {
		let offset = self.offset(x, y);
		&self.data[offset..offset + self.bands]
	}

	pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [f64] {
		let offset = self.offset(x, y);
		&mut self.data[offset..offset + self.bands]
	}

	pub fn get(&self, x: u32, y: u32, band: usize) -> f64 {
		self.pixel(x, y)[band]
	}
}

/// The content of a pyramid tile.
#[derive(Clone, Debug, PartialEq)]
pub enum TileData {
	/// A fully transparent RGBA tile, returned without touching the dataset.
	Empty(DynamicImage),
	Pixels(RasterBuffer),
}

impl TileData {
	pub fn empty(width: u32, height: u32) -> Self {
		TileData::Empty(DynamicImage::ImageRgba8(RgbaImage::new(width, height)))
	}

	pub fn is_empty(&self) -> bool {
		matches!(self, TileData::Empty(_))
	}

	pub fn width(&self) -> u32 {
		match self {
			TileData::Empty(image) => image.width(),
			TileData::Pixels(buffer) => buffer.width,
		}
	}

	pub fn height(&self) -> u32 {
		match self {
			TileData::Empty(image) => image.height(),
			TileData::Pixels(buffer) => buffer.height,
		}
	}
}
