use serde::Serialize;

/// A rectangular window of source pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PixelWindow {
	pub col_off: u64,
	pub row_off: u64,
	pub width: u64,
	pub height: u64,
}

impl PixelWindow {
	pub fn new(col_off: u64, row_off: u64, width: u64, height: u64) -> Self {
		Self {
			col_off,
			row_off,
			width,
			height,
		}
	}

	pub fn col_end(&self) -> u64 {
		self.col_off + self.width
	}

	pub fn row_end(&self) -> u64 {
		self.row_off + self.height
	}

	pub fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}
}

/// A source window together with the size the pixels are resampled to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TileWindow {
	pub window: PixelWindow,
	pub out_width: u32,
	pub out_height: u32,
}
