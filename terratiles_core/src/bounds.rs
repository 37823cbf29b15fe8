//! Raster footprints: the four corners of a raster and the extent derived from them.

use crate::{MAX_WRAP_ITERATIONS, TileSourceError};
use anyhow::Result;
use serde::{Serialize, Serializer, ser::SerializeStruct};

/// The corners of a raster footprint, as `(x, y)` pairs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corners {
	pub ll: (f64, f64),
	pub ul: (f64, f64),
	pub lr: (f64, f64),
	pub ur: (f64, f64),
}

impl Corners {
	pub fn points(&self) -> [(f64, f64); 4] {
		[self.ll, self.ul, self.lr, self.ur]
	}

	fn shift_x(&mut self, dx: f64) {
		for p in [&mut self.ll, &mut self.ul, &mut self.lr, &mut self.ur] {
			p.0 += dx;
		}
	}

	/// Brings geographic corners into a shape that projected targets can digest.
	///
	/// Latitudes are clamped to `±y_limit`. Longitudes are shifted by -180
	/// while any exceeds 180 and then by +360 while any is below -180. A
	/// footprint still reaching 180 afterwards spans the antimeridian and is
	/// widened to the whole world.
	///
	/// # Errors
	/// Non-finite corners or a shift loop that does not settle within
	/// [`MAX_WRAP_ITERATIONS`] steps are configuration errors.
	pub fn wrap_geographic(&self, y_limit: f64) -> Result<Corners> {
		if self.points().iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
			return Err(TileSourceError::config(format!("raster corners {self:?} are not finite")));
		}

		let mut c = *self;
		for p in [&mut c.ll, &mut c.ul, &mut c.lr, &mut c.ur] {
			p.1 = p.1.clamp(-y_limit, y_limit);
		}

		let mut iterations = 0;
		while c.points().iter().any(|p| p.0 > 180.0) {
			c.shift_x(-180.0);
			iterations += 1;
			if iterations > MAX_WRAP_ITERATIONS {
				return Err(TileSourceError::config(format!(
					"longitudes of {self:?} do not converge into [-180, 180]"
				)));
			}
		}
		while c.points().iter().any(|p| p.0 < -180.0) {
			c.shift_x(360.0);
			iterations += 1;
			if iterations > MAX_WRAP_ITERATIONS {
				return Err(TileSourceError::config(format!(
					"longitudes of {self:?} do not converge into [-180, 180]"
				)));
			}
		}

		if c.points().iter().any(|p| p.0 >= 180.0) {
			c.ul.0 = -180.0;
			c.ll.0 = -180.0;
			c.ur.0 = 180.0;
			c.lr.0 = 180.0;
		}
		Ok(c)
	}
}

/// Corners and extent of a raster in one CRS.
///
/// Serializes with `{x, y}` objects for the corners and `xmin`, `xmax`,
/// `ymin`, `ymax`, `srs` for the extent.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundsRecord {
	pub corners: Corners,
	pub x_min: f64,
	pub x_max: f64,
	pub y_min: f64,
	pub y_max: f64,
	pub srs: String,
}

impl BoundsRecord {
	pub fn from_corners(corners: Corners, srs: impl Into<String>) -> Self {
		let points = corners.points();
		let fold = |init: f64, f: fn(f64, f64) -> f64, pick: fn(&(f64, f64)) -> f64| {
			points.iter().map(pick).fold(init, f)
		};
		BoundsRecord {
			corners,
			x_min: fold(f64::INFINITY, f64::min, |p| p.0),
			x_max: fold(f64::NEG_INFINITY, f64::max, |p| p.0),
			y_min: fold(f64::INFINITY, f64::min, |p| p.1),
			y_max: fold(f64::NEG_INFINITY, f64::max, |p| p.1),
			srs: srs.into(),
		}
	}

	pub fn width(&self) -> f64 {
		self.x_max - self.x_min
	}

	pub fn height(&self) -> f64 {
		self.y_max - self.y_min
	}

	/// Whether the axis-aligned rectangle `[x_min, x_max] × [y_min, y_max]` overlaps these bounds.
	/// Touching edges do not count as overlap.
	pub fn intersects(&self, x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> bool {
		x_min < self.x_max && x_max > self.x_min && y_min < self.y_max && y_max > self.y_min
	}
}

struct Xy((f64, f64));

impl Serialize for Xy {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut s = serializer.serialize_struct("Point", 2)?;
		s.serialize_field("x", &self.0.0)?;
		s.serialize_field("y", &self.0.1)?;
		s.end()
	}
}

impl Serialize for BoundsRecord {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut s = serializer.serialize_struct("Bounds", 9)?;
		s.serialize_field("ll", &Xy(self.corners.ll))?;
		s.serialize_field("ul", &Xy(self.corners.ul))?;
		s.serialize_field("lr", &Xy(self.corners.lr))?;
		s.serialize_field("ur", &Xy(self.corners.ur))?;
		s.serialize_field("xmin", &self.x_min)?;
		s.serialize_field("xmax", &self.x_max)?;
		s.serialize_field("ymin", &self.y_min)?;
		s.serialize_field("ymax", &self.y_max)?;
		s.serialize_field("srs", &self.srs)?;
		s.end()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{MAX_LATITUDE, MAX_LATITUDE_WITHOUT_POLES};
	use pretty_assertions::assert_eq;

	fn corners(x0: f64, y0: f64, x1: f64, y1: f64) -> Corners {
		Corners {
			ll: (x0, y0),
			ul: (x0, y1),
			lr: (x1, y0),
			ur: (x1, y1),
		}
	}

	#[test]
	fn extent_from_rotated_corners() {
		let c = Corners {
			ll: (0.0, 0.0),
			ul: (-1.0, 5.0),
			lr: (4.0, -2.0),
			ur: (3.0, 3.0),
		};
		let b = BoundsRecord::from_corners(c, "EPSG:32633");
		assert_eq!((b.x_min, b.x_max, b.y_min, b.y_max), (-1.0, 4.0, -2.0, 5.0));
		assert_eq!(b.srs, "EPSG:32633");
	}

	#[test]
	fn latitudes_are_clamped() -> Result<()> {
		let c = corners(-10.0, -95.0, 10.0, 95.0);
		let wrapped = c.wrap_geographic(MAX_LATITUDE_WITHOUT_POLES)?;
		assert_eq!(wrapped.ul.1, 89.999_999);
		assert_eq!(wrapped.ll.1, -89.999_999);
		let wrapped = c.wrap_geographic(MAX_LATITUDE)?;
		assert_eq!(wrapped.ur.1, 90.0);
		Ok(())
	}

	#[test]
	fn longitudes_beyond_180_are_shifted() -> Result<()> {
		let wrapped = corners(190.0, 0.0, 200.0, 10.0).wrap_geographic(MAX_LATITUDE)?;
		assert_eq!(wrapped.ll.0, 10.0);
		assert_eq!(wrapped.ur.0, 20.0);

		let wrapped = corners(-200.0, 0.0, -190.0, 10.0).wrap_geographic(MAX_LATITUDE)?;
		assert_eq!(wrapped.ll.0, 160.0);
		assert_eq!(wrapped.ur.0, 170.0);
		Ok(())
	}

	#[test]
	fn footprint_reaching_180_covers_the_world() -> Result<()> {
		let wrapped = corners(360.0, -10.0, 720.0, 10.0).wrap_geographic(MAX_LATITUDE)?;
		assert_eq!(wrapped.ul.0, -180.0);
		assert_eq!(wrapped.ll.0, -180.0);
		assert_eq!(wrapped.ur.0, 180.0);
		assert_eq!(wrapped.lr.0, 180.0);
		Ok(())
	}

	#[test]
	fn non_finite_or_runaway_corners_fail() {
		let err = corners(f64::NAN, 0.0, 1.0, 1.0)
			.wrap_geographic(MAX_LATITUDE)
			.unwrap_err();
		assert!(matches!(TileSourceError::of(&err), Some(TileSourceError::Config(_))));

		// spans far wider than the world never settle
		assert!(corners(-1e6, 0.0, 1e6, 1.0).wrap_geographic(MAX_LATITUDE).is_err());
	}

	#[test]
	fn intersects_excludes_touching_edges() {
		let b = BoundsRecord::from_corners(corners(0.0, 0.0, 10.0, 10.0), "EPSG:3857");
		assert!(b.intersects(5.0, 5.0, 15.0, 15.0));
		assert!(!b.intersects(10.0, 0.0, 20.0, 10.0));
		assert!(!b.intersects(-5.0, 11.0, 5.0, 20.0));
	}
}
