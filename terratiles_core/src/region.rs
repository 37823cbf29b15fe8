//! Region requests and their units.
//!
//! A [`RegionSpec`] names up to four edges plus a width and height in some
//! [`Units`]. Resolution ends in a [`PixelRegion`] in base (finest level)
//! pixels of the pyramid.

use crate::{Crs, PyramidGeometry, TileSourceError};
use anyhow::Result;
use serde::Serialize;
use std::fmt::{self, Display};

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Units {
	/// Pixels of the finest pyramid level.
	#[default]
	BasePixels,
	/// Fractions of the pyramid's width and height.
	Fraction,
	/// Coordinates in the source's target projection, or in its native CRS
	/// when no target projection is configured.
	Projection,
	/// Coordinates in an explicit CRS.
	Crs(Crs),
}

impl Units {
	/// Parses a units name.
	///
	/// `projection`/`proj` select projection units, `wgs84`/`4326` are
	/// shortcuts for `EPSG:4326`, and any other CRS definition accepted by
	/// [`Crs::parse`] is allowed.
	pub fn parse(name: &str) -> Result<Units> {
		let lower = name.trim().to_ascii_lowercase();
		Ok(match lower.as_str() {
			"" | "base" | "base_pixel" | "base_pixels" | "pixel" | "pixels" => Units::BasePixels,
			"fraction" => Units::Fraction,
			"projection" | "proj" => Units::Projection,
			"wgs84" | "4326" => Units::Crs(Crs::wgs84()),
			_ => Units::Crs(
				Crs::parse(name).map_err(|_| TileSourceError::request(format!("invalid units '{name}'")))?,
			),
		})
	}

	pub fn is_coordinate(&self) -> bool {
		matches!(self, Units::Projection | Units::Crs(_))
	}
}

impl Display for Units {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Units::BasePixels => f.write_str("base_pixels"),
			Units::Fraction => f.write_str("fraction"),
			Units::Projection => f.write_str("projection"),
			Units::Crs(crs) => write!(f, "{crs}"),
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionSpec {
	pub left: Option<f64>,
	pub top: Option<f64>,
	pub right: Option<f64>,
	pub bottom: Option<f64>,
	pub width: Option<f64>,
	pub height: Option<f64>,
	pub units: Units,
	/// Units of `width` and `height` when they differ from `units`.
	pub units_wh: Option<Units>,
}

impl RegionSpec {
	pub fn new(units: Units) -> Self {
		Self {
			units,
			..Default::default()
		}
	}

	pub fn with_edges(mut self, left: f64, top: f64, right: f64, bottom: f64) -> Self {
		self.left = Some(left);
		self.top = Some(top);
		self.right = Some(right);
		self.bottom = Some(bottom);
		self
	}

	/// Whether width and height are given in the same units as the edges.
	pub fn size_shares_units(&self) -> bool {
		self.units_wh.as_ref().is_none_or(|u| *u == self.units)
	}

	/// Derives a missing edge from its partner and the width or height.
	/// Only applies when width and height share the edge units.
	pub fn fill_edges_from_size(&mut self) {
		if !self.size_shares_units() {
			return;
		}
		fill_pair(&mut self.left, &mut self.right, self.width);
		fill_pair(&mut self.top, &mut self.bottom, self.height);
	}

	/// Converts the known edges from projection units into world pixels of a
	/// projected pyramid. Returns `None` in pixel mode.
	///
	/// Width and height given in the edge units have been used up by
	/// [`fill_edges_from_size`](Self::fill_edges_from_size) and are dropped.
	/// In other units they are kept for the pixel stage.
	pub fn projection_to_world_pixels(&self, geometry: &PyramidGeometry) -> Option<RegionSpec> {
		let projection = geometry.projection.as_ref()?;
		let units = projection.units_across_level0;
		let (ox, oy) = projection.origin;
		let x = |v: Option<f64>| v.map(|v| (0.5 + (v - ox) / units) * geometry.size_x as f64);
		let y = |v: Option<f64>| v.map(|v| (0.5 - (v - oy) / units) * geometry.size_y as f64);
		let shared = self.size_shares_units();
		Some(RegionSpec {
			left: x(self.left),
			top: y(self.top),
			right: x(self.right),
			bottom: y(self.bottom),
			width: self.width.filter(|_| !shared),
			height: self.height.filter(|_| !shared),
			units: Units::BasePixels,
			units_wh: self.units_wh.clone().filter(|_| !shared),
		})
	}

	/// The corners `(left, top)` and `(right, bottom)` to convert, borrowing
	/// the partner edge where one is missing.
	///
	/// # Errors
	/// A request error when neither edge of an axis is known.
	pub fn anchor_corners(&self) -> Result<[(f64, f64); 2]> {
		let edge = |edge: Option<f64>, partner: Option<f64>, axis: &str| {
			edge
				.or(partner)
				.ok_or_else(|| TileSourceError::request(format!("either {axis} must be specified")))
		};
		let left = edge(self.left, self.right, "left or right")?;
		let right = edge(self.right, self.left, "left or right")?;
		let top = edge(self.top, self.bottom, "top or bottom")?;
		let bottom = edge(self.bottom, self.top, "top or bottom")?;
		Ok([(left, top), (right, bottom)])
	}
}

fn fill_pair(low: &mut Option<f64>, high: &mut Option<f64>, size: Option<f64>) {
	match (*low, *high, size) {
		(None, Some(h), Some(s)) => *low = Some(h - s),
		(Some(l), None, Some(s)) => *high = Some(l + s),
		_ => {}
	}
}

/// A region in base pixels, edges ordered so that `left <= right` and `top <= bottom`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PixelRegion {
	pub left: f64,
	pub top: f64,
	pub right: f64,
	pub bottom: f64,
}

impl PixelRegion {
	pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
		Self {
			left: left.min(right),
			top: top.min(bottom),
			right: left.max(right),
			bottom: top.max(bottom),
		}
	}

	pub fn width(&self) -> f64 {
		self.right - self.left
	}

	pub fn height(&self) -> f64 {
		self.bottom - self.top
	}

	pub fn is_empty(&self) -> bool {
		self.width() <= 0.0 || self.height() <= 0.0
	}

	/// Resolves base pixel and fraction units against a `size_x × size_y` image.
	///
	/// Missing edges come from width/height or default to the image edges.
	/// The result is clamped to the image.
	pub fn from_pixel_spec(spec: &RegionSpec, size_x: f64, size_y: f64) -> Result<PixelRegion> {
		let scale = |units: &Units| -> Result<(f64, f64)> {
			match units {
				Units::BasePixels => Ok((1.0, 1.0)),
				Units::Fraction => Ok((size_x, size_y)),
				other => Err(TileSourceError::request(format!(
					"units '{other}' cannot be resolved as pixels"
				))),
			}
		};
		let (sx, sy) = scale(&spec.units)?;
		let (wx, wy) = scale(spec.units_wh.as_ref().unwrap_or(&spec.units))?;

		let mut left = spec.left.map(|v| v * sx);
		let mut right = spec.right.map(|v| v * sx);
		let mut top = spec.top.map(|v| v * sy);
		let mut bottom = spec.bottom.map(|v| v * sy);
		fill_pair(&mut left, &mut right, spec.width.map(|v| v * wx));
		fill_pair(&mut top, &mut bottom, spec.height.map(|v| v * wy));

		let clamp_x = |v: f64| v.clamp(0.0, size_x);
		let clamp_y = |v: f64| v.clamp(0.0, size_y);
		Ok(PixelRegion::new(
			clamp_x(left.unwrap_or(0.0)),
			clamp_y(top.unwrap_or(0.0)),
			clamp_x(right.unwrap_or(size_x)),
			clamp_y(bottom.unwrap_or(size_y)),
		))
	}
}
