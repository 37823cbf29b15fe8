use std::fmt::{self, Debug, Display};

/// A tile address in the pyramid: zoom `level` and column/row indices.
///
/// Valid index ranges depend on the pyramid, see
/// [`PyramidGeometry::check_tile`](crate::PyramidGeometry::check_tile).
#[derive(Eq, PartialEq, Clone, Hash, Copy)]
pub struct TileCoord {
	pub level: u8,
	pub x: u32,
	pub y: u32,
}

impl TileCoord {
	pub fn new(level: u8, x: u32, y: u32) -> TileCoord {
		TileCoord { level, x, y }
	}
}

impl Display for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.level, self.x, self.y)
	}
}

impl Debug for TileCoord {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TileCoord({}, [{}, {}])", self.level, self.x, self.y)
	}
}
