//! Coordinate reference systems and point transforms.
//!
//! A [`Crs`] keeps a canonical name (`EPSG:3857` or a proj string) together
//! with the proj4 definition used by [`proj4rs`]. Definitions for EPSG codes
//! come from the `crs-definitions` database. Projection objects are built per
//! [`CrsTransform`], so `Crs` itself is plain data and can be shared freely
//! between threads.

use crate::{Corners, TileSourceError};
use anyhow::{Result, anyhow};
use geo::{Distance, Geodesic, Point};
use proj4rs::{proj::Proj, transform::transform};
use std::{
	fmt::{self, Debug, Display},
	hash::{Hash, Hasher},
};

/// A coordinate reference system, identified by its canonical name.
#[derive(Clone)]
pub struct Crs {
	name: String,
	proj4: String,
}

impl Crs {
	/// Parses a CRS definition.
	///
	/// Accepted forms are `EPSG:<code>` (any case), a bare EPSG code, a proj
	/// string containing `+proj=`, each optionally prefixed with `proj4:`.
	///
	/// # Examples
	/// ```
	/// use terratiles_core::Crs;
	///
	/// let crs = Crs::parse("proj4:epsg:3857").unwrap();
	/// assert_eq!(crs.name(), "EPSG:3857");
	/// assert!(!crs.is_geographic());
	/// assert!(Crs::parse("4326").unwrap().is_geographic());
	/// ```
	pub fn parse(definition: &str) -> Result<Crs> {
		let mut text = definition.trim();
		if let Some(prefix) = text.get(..6)
			&& prefix.eq_ignore_ascii_case("proj4:")
		{
			text = text[6..].trim();
		}

		let code = if let Some(prefix) = text.get(..5)
			&& prefix.eq_ignore_ascii_case("epsg:")
		{
			Some(&text[5..])
		} else if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
			Some(text)
		} else {
			None
		};

		if let Some(code) = code {
			let code: u16 = code
				.trim()
				.parse()
				.map_err(|_| TileSourceError::config(format!("invalid EPSG code in CRS '{definition}'")))?;
			return Crs::from_epsg(code);
		}

		if text.contains("+proj=") {
			Proj::from_proj_string(text)
				.map_err(|e| TileSourceError::config(format!("invalid proj string '{text}': {e:?}")))?;
			return Ok(Crs {
				name: text.to_string(),
				proj4: text.to_string(),
			});
		}

		Err(TileSourceError::config(format!("unsupported CRS definition '{definition}'")))
	}

	pub fn from_epsg(code: u16) -> Result<Crs> {
		let proj4 = crs_definitions::from_code(code)
			.map(|def| def.proj4)
			.ok_or_else(|| TileSourceError::config(format!("EPSG:{code} is not a known CRS")))?;
		Ok(Crs {
			name: format!("EPSG:{code}"),
			proj4: proj4.to_string(),
		})
	}

	pub fn wgs84() -> Crs {
		Crs {
			name: "EPSG:4326".to_string(),
			proj4: "+proj=longlat +datum=WGS84 +no_defs".to_string(),
		}
	}

	/// Canonical name, used as the memoization key for bounds and scales.
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn proj4(&self) -> &str {
		&self.proj4
	}

	/// Whether coordinates are longitude/latitude in degrees.
	pub fn is_geographic(&self) -> bool {
		["+proj=longlat", "+proj=latlong", "+proj=lonlat", "+proj=latlon"]
			.iter()
			.any(|p| self.proj4.contains(p))
	}

	fn proj(&self) -> Result<Proj> {
		Proj::from_proj_string(&self.proj4).map_err(|e| anyhow!("invalid projection {}: {e:?}", self.name))
	}
}

impl PartialEq for Crs {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name
	}
}

impl Eq for Crs {}

impl Hash for Crs {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.name.hash(state);
	}
}

impl Display for Crs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.name)
	}
}

impl Debug for Crs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Crs({})", self.name)
	}
}

/// A prepared transform between two CRS.
pub struct CrsTransform {
	src: Proj,
	dst: Proj,
	src_geographic: bool,
	dst_geographic: bool,
	passthrough: bool,
}

impl CrsTransform {
	pub fn new(src: &Crs, dst: &Crs) -> Result<Self> {
		Ok(Self {
			src: src.proj()?,
			dst: dst.proj()?,
			src_geographic: src.is_geographic(),
			dst_geographic: dst.is_geographic(),
			passthrough: src == dst,
		})
	}

	/// Transforms one point. Geographic coordinates are in degrees on both sides.
	pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64)> {
		if self.passthrough {
			return Ok((x, y));
		}
		let mut point = if self.src_geographic {
			(x.to_radians(), y.to_radians(), 0.0)
		} else {
			(x, y, 0.0)
		};
		transform(&self.src, &self.dst, &mut point).map_err(|e| anyhow!("cannot transform ({x}, {y}): {e:?}"))?;
		Ok(if self.dst_geographic {
			(point.0.to_degrees(), point.1.to_degrees())
		} else {
			(point.0, point.1)
		})
	}

	pub fn transform_corners(&self, corners: &Corners) -> Result<Corners> {
		let t = |p: (f64, f64)| self.transform(p.0, p.1);
		Ok(Corners {
			ll: t(corners.ll)?,
			ul: t(corners.ul)?,
			lr: t(corners.lr)?,
			ur: t(corners.ur)?,
		})
	}
}

/// Geodesic distance in meters on the WGS84 ellipsoid between two `(lon, lat)` points.
pub fn geodesic_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
	Geodesic.distance(Point::new(a.0, a.1), Point::new(b.0, b.1))
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;
	use rstest::rstest;

	#[rstest]
	#[case("EPSG:3857", "EPSG:3857")]
	#[case("epsg:3857", "EPSG:3857")]
	#[case("proj4:EPSG:4326", "EPSG:4326")]
	#[case("  32633 ", "EPSG:32633")]
	#[case("+proj=merc +datum=WGS84", "+proj=merc +datum=WGS84")]
	fn parse_forms(#[case] input: &str, #[case] name: &str) -> Result<()> {
		assert_eq!(Crs::parse(input)?.name(), name);
		Ok(())
	}

	#[rstest]
	#[case("")]
	#[case("projection")]
	#[case("EPSG:abc")]
	#[case("EPSG:99999999")]
	fn parse_failures(#[case] input: &str) {
		let err = Crs::parse(input).unwrap_err();
		assert!(matches!(TileSourceError::of(&err), Some(TileSourceError::Config(_))));
	}

	#[test]
	fn geographic_detection() -> Result<()> {
		assert!(Crs::wgs84().is_geographic());
		assert!(Crs::parse("EPSG:4326")?.is_geographic());
		assert!(!Crs::parse("EPSG:3857")?.is_geographic());
		assert!(!Crs::parse("EPSG:32633")?.is_geographic());
		Ok(())
	}

	#[test]
	fn wgs84_to_web_mercator() -> Result<()> {
		let t = CrsTransform::new(&Crs::wgs84(), &Crs::parse("EPSG:3857")?)?;
		let (x, y) = t.transform(180.0, 0.0)?;
		assert_relative_eq!(x, 20_037_508.342_789_244, max_relative = 1e-9);
		assert_relative_eq!(y, 0.0, epsilon = 1e-6);

		let back = CrsTransform::new(&Crs::parse("EPSG:3857")?, &Crs::wgs84())?;
		let (lon, lat) = back.transform(1_000_000.0, 2_000_000.0)?;
		let (x, y) = t.transform(lon, lat)?;
		assert_relative_eq!(x, 1_000_000.0, epsilon = 1e-4);
		assert_relative_eq!(y, 2_000_000.0, epsilon = 1e-4);
		Ok(())
	}

	#[test]
	fn same_crs_is_passthrough() -> Result<()> {
		let crs = Crs::parse("EPSG:32633")?;
		let t = CrsTransform::new(&crs, &crs)?;
		assert_eq!(t.transform(123.0, 456.0)?, (123.0, 456.0));
		Ok(())
	}

	#[test]
	fn geodesic_equator_degree() {
		let d = geodesic_distance((0.0, 0.0), (1.0, 0.0));
		assert_relative_eq!(d, 111_319.490_793, max_relative = 1e-6);
	}
}
