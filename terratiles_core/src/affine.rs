//! Six-coefficient affine transforms between raster pixels and CRS coordinates.
//!
//! Coefficients follow the usual `(a, b, c, d, e, f)` order:
//!
//! ```text
//! x = a * col + b * row + c
//! y = d * col + e * row + f
//! ```
//!
//! GDAL's geotransform order `(c, a, b, f, d, e)` is supported through
//! [`Affine::from_gdal`] and [`Affine::to_gdal`].

use crate::{Corners, TileSourceError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A ground control point tying a raster pixel to a CRS coordinate.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct GroundControlPoint {
	/// Pixel column.
	pub col: f64,
	/// Pixel row.
	pub row: f64,
	pub x: f64,
	pub y: f64,
}

impl GroundControlPoint {
	pub fn new(col: f64, row: f64, x: f64, y: f64) -> Self {
		Self { col, row, x, y }
	}
}

#[derive(Clone, Copy, PartialEq)]
pub struct Affine {
	pub a: f64,
	pub b: f64,
	pub c: f64,
	pub d: f64,
	pub e: f64,
	pub f: f64,
}

impl Affine {
	pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
		Self { a, b, c, d, e, f }
	}

	pub fn identity() -> Self {
		Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
	}

	/// A north-up transform with square or rectangular pixels and an upper-left origin.
	///
	/// # Examples
	/// ```
	/// use terratiles_core::Affine;
	///
	/// let t = Affine::north_up(-180.0, 90.0, 0.5, 0.5);
	/// assert_eq!(t.apply(2.0, 2.0), (-179.0, 89.0));
	/// ```
	pub fn north_up(x_min: f64, y_max: f64, x_res: f64, y_res: f64) -> Self {
		Self::new(x_res, 0.0, x_min, 0.0, -y_res, y_max)
	}

	/// Builds a transform from a GDAL geotransform `(c, a, b, f, d, e)`.
	pub fn from_gdal(gt: [f64; 6]) -> Self {
		Self::new(gt[1], gt[2], gt[0], gt[4], gt[5], gt[3])
	}

	pub fn to_gdal(&self) -> [f64; 6] {
		[self.c, self.a, self.b, self.f, self.d, self.e]
	}

	pub fn coefficients(&self) -> [f64; 6] {
		[self.a, self.b, self.c, self.d, self.e, self.f]
	}

	pub fn is_identity(&self) -> bool {
		*self == Self::identity()
	}

	pub fn determinant(&self) -> f64 {
		self.a * self.e - self.b * self.d
	}

	/// Maps a pixel position to CRS coordinates.
	pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
		(
			self.a * col + self.b * row + self.c,
			self.d * col + self.e * row + self.f,
		)
	}

	/// Maps CRS coordinates back to a pixel position using the closed-form inverse.
	///
	/// # Errors
	/// Returns a configuration error if the transform is degenerate.
	pub fn invert(&self, x: f64, y: f64) -> Result<(f64, f64)> {
		let Affine { a, b, c, d, e, f } = *self;
		let det = b * d - a * e;
		if det == 0.0 || !det.is_finite() {
			return Err(TileSourceError::config(format!(
				"affine transform {self:?} is degenerate and cannot be inverted"
			)));
		}
		Ok((
			(c * e - b * f - e * x + b * y) / det,
			(a * f - c * d + d * x - a * y) / det,
		))
	}

	/// The four corners of a `width × height` raster under this transform.
	///
	/// Corners are taken from the transform itself, so rotated or sheared
	/// rasters keep their true footprint.
	pub fn corners(&self, width: f64, height: f64) -> Corners {
		Corners {
			ll: self.apply(0.0, height),
			ul: self.apply(0.0, 0.0),
			lr: self.apply(width, height),
			ur: self.apply(width, 0.0),
		}
	}

	/// Least-squares fit of an affine transform to ground control points.
	///
	/// # Errors
	/// Fails with a configuration error for fewer than three points or
	/// collinear points.
	pub fn from_gcps(gcps: &[GroundControlPoint]) -> Result<Self> {
		if gcps.len() < 3 {
			return Err(TileSourceError::config(format!(
				"at least 3 ground control points are needed, got {}",
				gcps.len()
			)));
		}

		// normal equations: (Aᵀ A) p = Aᵀ v with rows [col, row, 1]
		let mut ata = [[0.0f64; 3]; 3];
		let mut atx = [0.0f64; 3];
		let mut aty = [0.0f64; 3];
		for gcp in gcps {
			let row = [gcp.col, gcp.row, 1.0];
			for i in 0..3 {
				for j in 0..3 {
					ata[i][j] += row[i] * row[j];
				}
				atx[i] += row[i] * gcp.x;
				aty[i] += row[i] * gcp.y;
			}
		}

		let [a, b, c] = solve3(&ata, &atx).context("fitting x coefficients to ground control points")?;
		let [d, e, f] = solve3(&ata, &aty).context("fitting y coefficients to ground control points")?;
		Ok(Self::new(a, b, c, d, e, f))
	}
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
	m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
		+ m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Cramer's rule for a 3×3 system.
fn solve3(m: &[[f64; 3]; 3], v: &[f64; 3]) -> Result<[f64; 3]> {
	let det = det3(m);
	let scale = m.iter().flatten().fold(0.0f64, |acc, x| acc.max(x.abs())).max(1.0);
	if det.abs() <= 1e-12 * scale.powi(3) {
		return Err(TileSourceError::config("ground control points are collinear"));
	}
	let mut out = [0.0; 3];
	for (k, value) in out.iter_mut().enumerate() {
		let mut mk = *m;
		for i in 0..3 {
			mk[i][k] = v[i];
		}
		*value = det3(&mk) / det;
	}
	Ok(out)
}

impl Default for Affine {
	fn default() -> Self {
		Self::identity()
	}
}

impl Debug for Affine {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(
			f,
			"Affine({}, {}, {}, {}, {}, {})",
			self.a, self.b, self.c, self.d, self.e, self.f
		)
	}
}
