//! Per-band information and band lookup by number or colour interpretation.

use crate::{BandMetadata, BandStatistics, Color, ColorInterp};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use terratiles_core::TileSourceError;

/// Everything known about one band. Unknown values are left out when serialized.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BandInfo {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub min: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mean: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stdev: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub nodata: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scale: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub offset: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub units: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub interpretation: ColorInterp,
	#[serde(rename = "colortable", skip_serializing_if = "Option::is_none")]
	pub color_table: Option<Vec<Color>>,
}

impl BandInfo {
	pub fn new(metadata: BandMetadata, statistics: Option<BandStatistics>) -> Self {
		let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
		BandInfo {
			min: statistics.map(|s| s.min),
			max: statistics.map(|s| s.max),
			mean: statistics.map(|s| s.mean),
			stdev: statistics.map(|s| s.stdev),
			nodata: metadata.nodata,
			scale: metadata.scale,
			offset: metadata.offset,
			units: non_empty(metadata.units),
			description: non_empty(metadata.description),
			interpretation: metadata.interpretation,
			color_table: metadata
				.color_table
				.filter(|t| !t.is_empty())
				.map(|t| t.into_iter().map(Color).collect()),
		}
	}
}

/// Band information keyed by 1-based band number.
pub type BandInfoMap = BTreeMap<usize, BandInfo>;

/// A band given by number (`-1` meaning all bands) or by colour interpretation name.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum BandSelector {
	Index(i64),
	Name(String),
}

impl From<i64> for BandSelector {
	fn from(index: i64) -> Self {
		BandSelector::Index(index)
	}
}

impl From<&str> for BandSelector {
	fn from(name: &str) -> Self {
		BandSelector::Name(name.to_string())
	}
}

impl Default for BandSelector {
	fn default() -> Self {
		BandSelector::Index(1)
	}
}

impl fmt::Display for BandSelector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BandSelector::Index(i) => write!(f, "{i}"),
			BandSelector::Name(name) => f.write_str(name),
		}
	}
}

/// Validates a band selector.
///
/// Digit strings are band numbers. Other names match the first band, in
/// band order, with that colour interpretation. Returns `-1` or an existing
/// band number, or `None` when nothing matches and `strict` is off.
pub fn band_number(bands: &BandInfoMap, selector: &BandSelector, strict: bool) -> Result<Option<i64>> {
	let band = match selector {
		BandSelector::Index(index) => Some(*index),
		BandSelector::Name(name) if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) => name.parse().ok(),
		BandSelector::Name(name) => name.parse::<ColorInterp>().ok().and_then(|interpretation| {
			let mut matches = bands.iter().filter(|(_, b)| b.interpretation == interpretation);
			let first = matches.next().map(|(i, _)| *i as i64);
			if matches.next().is_some() {
				log::debug!("several bands are '{interpretation}', using band {first:?}");
			}
			first
		}),
	};

	let band = band.filter(|b| *b == -1 || usize::try_from(*b).is_ok_and(|b| bands.contains_key(&b)));
	if strict && band.is_none() {
		return Err(TileSourceError::request(format!(
			"band '{selector}' has to be a positive integer, -1, or a band interpretation found in the source"
		)));
	}
	Ok(band)
}
