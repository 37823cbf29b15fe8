//! Band styles: how bands are mapped to colours when rendered.
//!
//! Styles are configured with [`StyleConfig`] and validated into a [`Style`]
//! when the source is opened. Without a configured style a default one is
//! derived from the bands' colour interpretations.

use crate::{BandInfoMap, BandSelector, ColorInterp, Rgba, band_number};
use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize, Serializer};
use std::{fmt, str::FromStr};
use terratiles_core::TileSourceError;

/// An RGBA colour, written as `#rgb`, `#rrggbb` or `#rrggbbaa`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color(pub Rgba);

impl FromStr for Color {
	type Err = anyhow::Error;

	fn from_str(s: &str) -> Result<Self> {
		(|| {
			let hex = s.trim().strip_prefix('#').context("missing '#'")?;
			ensure!(hex.is_ascii(), "not a hex colour");
			let digits: Vec<u8> = match hex.len() {
				3 => hex
					.chars()
					.map(|c| u8::from_str_radix(&format!("{c}{c}"), 16))
					.collect::<Result<_, _>>()?,
				6 | 8 => (0..hex.len())
					.step_by(2)
					.map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
					.collect::<Result<_, _>>()?,
				n => bail!("{n} hex digits"),
			};
			Ok::<_, anyhow::Error>(Color([
				digits[0],
				digits[1],
				digits[2],
				digits.get(3).copied().unwrap_or(255),
			]))
		})()
		.with_context(|| format!("invalid colour '{s}'"))
	}
}

impl fmt::Display for Color {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let [r, g, b, a] = self.0;
		write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
	}
}

impl Serialize for Color {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Composite {
	#[default]
	Lighten,
	Multiply,
}

/// Where a band's colours come from.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "RawPalette")]
pub enum PaletteSpec {
	/// An explicit colour ramp.
	Colors(Vec<Color>),
	/// The band's own colour table.
	ColorTable,
	/// The default ramp of a colour interpretation, e.g. `red`.
	Interpretation(ColorInterp),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPalette {
	List(Vec<String>),
	Name(String),
}

impl TryFrom<RawPalette> for PaletteSpec {
	type Error = anyhow::Error;

	fn try_from(raw: RawPalette) -> Result<Self> {
		match raw {
			RawPalette::List(colors) => Ok(PaletteSpec::Colors(
				colors.iter().map(|c| c.parse()).collect::<Result<_>>()?,
			)),
			RawPalette::Name(name) if name.eq_ignore_ascii_case("colortable") => Ok(PaletteSpec::ColorTable),
			RawPalette::Name(name) => {
				if let Ok(color) = name.parse::<Color>() {
					return Ok(PaletteSpec::Colors(vec![Color([0, 0, 0, 255]), color]));
				}
				Ok(PaletteSpec::Interpretation(name.parse()?))
			}
		}
	}
}

/// A range limit, either a number or `auto` (taken from the band statistics).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum StyleValue {
	#[default]
	Auto,
	Value(f64),
}

impl<'de> Deserialize<'de> for StyleValue {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Number(f64),
			Text(String),
		}
		match Raw::deserialize(deserializer)? {
			Raw::Number(v) => Ok(StyleValue::Value(v)),
			Raw::Text(t) if t.eq_ignore_ascii_case("auto") => Ok(StyleValue::Auto),
			Raw::Text(t) => Err(serde::de::Error::custom(format!("expected a number or 'auto', got '{t}'"))),
		}
	}
}

impl Serialize for StyleValue {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			StyleValue::Auto => serializer.serialize_str("auto"),
			StyleValue::Value(v) => serializer.serialize_f64(*v),
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandStyleConfig {
	#[serde(default)]
	pub band: BandSelector,
	pub palette: Option<PaletteSpec>,
	pub min: Option<StyleValue>,
	pub max: Option<StyleValue>,
	pub nodata: Option<StyleValue>,
	pub composite: Option<Composite>,
}

/// A configured style: one band, or a list of bands.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StyleConfig {
	Bands { bands: Vec<BandStyleConfig> },
	Band(BandStyleConfig),
}

impl StyleConfig {
	fn band_configs(&self) -> &[BandStyleConfig] {
		match self {
			StyleConfig::Bands { bands } => bands,
			StyleConfig::Band(band) => std::slice::from_ref(band),
		}
	}

	/// A style without bands, or a single band numbered zero or below, asks for the default style.
	fn is_default_request(&self) -> bool {
		match self.band_configs() {
			[] => true,
			[only] => matches!(only.band, BandSelector::Index(i) if i <= 0),
			_ => false,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BandStyle {
	pub band: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub palette: Option<Vec<Color>>,
	pub min: StyleValue,
	pub max: StyleValue,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub nodata: Option<f64>,
	pub composite: Composite,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Style {
	pub bands: Vec<BandStyle>,
}

fn interpretation_ramp(interpretation: ColorInterp) -> Option<Vec<Color>> {
	let ramp = |from: Rgba, to: Rgba| Some(vec![Color(from), Color(to)]);
	match interpretation {
		ColorInterp::Red => ramp([0, 0, 0, 255], [255, 0, 0, 255]),
		ColorInterp::Green => ramp([0, 0, 0, 255], [0, 255, 0, 255]),
		ColorInterp::Blue => ramp([0, 0, 0, 255], [0, 0, 255, 255]),
		ColorInterp::Gray => ramp([0, 0, 0, 255], [255, 255, 255, 255]),
		ColorInterp::Alpha => ramp([255, 255, 255, 0], [255, 255, 255, 255]),
		_ => None,
	}
}

fn color_table(bands: &BandInfoMap, band: i64) -> Result<Vec<Color>> {
	usize::try_from(band)
		.ok()
		.and_then(|b| bands.get(&b))
		.and_then(|info| info.color_table.clone())
		.ok_or_else(|| TileSourceError::config(format!("band {band} has no colour table")))
}

fn band_nodata(bands: &BandInfoMap, band: i64) -> Option<f64> {
	usize::try_from(band).ok().and_then(|b| bands.get(&b)).and_then(|info| info.nodata)
}

fn default_bands(bands: &BandInfoMap) -> Result<Vec<BandStyle>> {
	let mut style: Vec<BandStyle> = Vec::new();
	for interpretation in [
		ColorInterp::Red,
		ColorInterp::Green,
		ColorInterp::Blue,
		ColorInterp::Gray,
		ColorInterp::Palette,
		ColorInterp::Alpha,
	] {
		let Some(band) = band_number(bands, &BandSelector::Name(interpretation.name().to_string()), false)? else {
			continue;
		};
		let skip = match interpretation {
			ColorInterp::Alpha => style.is_empty(),
			ColorInterp::Gray | ColorInterp::Palette => !style.is_empty(),
			_ => false,
		};
		if skip {
			continue;
		}

		if interpretation == ColorInterp::Palette {
			let table = color_table(bands, band)?;
			style.push(BandStyle {
				band,
				min: StyleValue::Value(0.0),
				max: StyleValue::Value((table.len() - 1) as f64),
				palette: Some(table),
				nodata: None,
				composite: Composite::Lighten,
			});
		} else {
			style.push(BandStyle {
				band,
				palette: interpretation_ramp(interpretation),
				min: StyleValue::Auto,
				max: StyleValue::Auto,
				nodata: band_nodata(bands, band),
				composite: if interpretation == ColorInterp::Alpha {
					Composite::Multiply
				} else {
					Composite::Lighten
				},
			});
		}
	}
	Ok(style)
}

fn configured_band(bands: &BandInfoMap, config: &BandStyleConfig) -> Result<BandStyle> {
	let band = band_number(bands, &config.band, true)?.unwrap_or(-1);
	let palette = match &config.palette {
		None => None,
		Some(PaletteSpec::Colors(colors)) => Some(colors.clone()),
		Some(PaletteSpec::ColorTable) => Some(color_table(bands, band)?),
		Some(PaletteSpec::Interpretation(interpretation)) => Some(interpretation_ramp(*interpretation).ok_or_else(
			|| TileSourceError::config(format!("there is no default palette for '{interpretation}'")),
		)?),
	};
	let nodata = match config.nodata {
		None => None,
		Some(StyleValue::Auto) => band_nodata(bands, band),
		Some(StyleValue::Value(v)) => Some(v),
	};
	Ok(BandStyle {
		band,
		palette,
		min: config.min.unwrap_or_default(),
		max: config.max.unwrap_or_default(),
		nodata,
		composite: config.composite.unwrap_or_default(),
	})
}

/// Validates a configured style, or derives the default style.
///
/// Projected sources get an extra alpha band (number `band count + 1`,
/// produced by the warp) unless a styled band is already alpha.
pub fn build_style(config: Option<&StyleConfig>, bands: &BandInfoMap, projected: bool) -> Result<Style> {
	let config = config.filter(|c| !c.is_default_request());
	let mut style = match config {
		Some(config) => config
			.band_configs()
			.iter()
			.map(|band| configured_band(bands, band))
			.collect::<Result<Vec<_>>>()
			.context("validating style")?,
		None => default_bands(bands)?,
	};

	if !style.is_empty() {
		let has_alpha = style.iter().any(|s| {
			usize::try_from(s.band)
				.ok()
				.and_then(|b| bands.get(&b))
				.is_some_and(|info| info.interpretation == ColorInterp::Alpha)
		});
		if projected && !has_alpha {
			style.push(BandStyle {
				band: bands.len() as i64 + 1,
				palette: interpretation_ramp(ColorInterp::Alpha),
				min: StyleValue::Value(0.0),
				max: StyleValue::Auto,
				nodata: None,
				composite: Composite::Multiply,
			});
		}
	}
	log::debug!("using style {style:?}");
	Ok(Style { bands: style })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::BandInfo;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	fn bands(interpretations: &[ColorInterp]) -> BandInfoMap {
		interpretations
			.iter()
			.enumerate()
			.map(|(i, interpretation)| {
				(
					i + 1,
					BandInfo {
						interpretation: *interpretation,
						..Default::default()
					},
				)
			})
			.collect()
	}

	fn style_bands(style: &Style) -> Vec<(i64, Composite)> {
		style.bands.iter().map(|b| (b.band, b.composite)).collect()
	}

	#[rstest]
	#[case("#f00", [255, 0, 0, 255])]
	#[case("#00ff00", [0, 255, 0, 255])]
	#[case("#ffffff00", [255, 255, 255, 0])]
	fn parse_colors(#[case] text: &str, #[case] rgba: Rgba) -> Result<()> {
		assert_eq!(text.parse::<Color>()?, Color(rgba));
		Ok(())
	}

	#[rstest]
	#[case("ff0000")]
	#[case("#ff00")]
	#[case("#gg0000")]
	fn reject_colors(#[case] text: &str) {
		assert!(text.parse::<Color>().is_err());
	}

	#[test]
	fn color_hex_output() {
		assert_eq!(Color([255, 16, 0, 128]).to_string(), "#ff100080");
	}

	#[test]
	fn default_rgba_style() -> Result<()> {
		use ColorInterp::*;
		let style = build_style(None, &bands(&[Red, Green, Blue, Alpha]), false)?;
		assert_eq!(
			style_bands(&style),
			vec![
				(1, Composite::Lighten),
				(2, Composite::Lighten),
				(3, Composite::Lighten),
				(4, Composite::Multiply)
			]
		);
		assert_eq!(style.bands[0].palette, Some(vec![Color([0, 0, 0, 255]), Color([255, 0, 0, 255])]));
		Ok(())
	}

	#[test]
	fn default_gray_style_in_projection_gets_alpha() -> Result<()> {
		let style = build_style(None, &bands(&[ColorInterp::Gray]), true)?;
		assert_eq!(style_bands(&style), vec![(1, Composite::Lighten), (2, Composite::Multiply)]);
		assert_eq!(style.bands[1].min, StyleValue::Value(0.0));
		Ok(())
	}

	#[test]
	fn gray_is_skipped_after_color_and_alpha_needs_company() -> Result<()> {
		use ColorInterp::*;
		let style = build_style(None, &bands(&[Red, Gray]), false)?;
		assert_eq!(style_bands(&style), vec![(1, Composite::Lighten)]);

		let style = build_style(None, &bands(&[Alpha]), false)?;
		assert!(style.bands.is_empty());
		Ok(())
	}

	#[test]
	fn palette_band_uses_its_color_table() -> Result<()> {
		let mut map = bands(&[ColorInterp::Palette]);
		map.get_mut(&1).unwrap().color_table = Some(vec![Color([0, 0, 0, 255]), Color([1, 2, 3, 255]), Color([9, 9, 9, 0])]);
		let style = build_style(None, &map, false)?;
		assert_eq!(style.bands[0].min, StyleValue::Value(0.0));
		assert_eq!(style.bands[0].max, StyleValue::Value(2.0));
		assert_eq!(style.bands[0].palette.as_ref().map(Vec::len), Some(3));
		Ok(())
	}

	#[test]
	fn configured_style_from_yaml() -> Result<()> {
		let config: StyleConfig = serde_yaml_ng::from_str(
			"bands:\n  - band: green\n    palette: ['#000', '#0f0']\n    min: 0\n    max: auto\n  - band: 3\n    palette: blue\n    composite: multiply\n",
		)?;
		let style = build_style(Some(&config), &bands(&[ColorInterp::Red, ColorInterp::Green, ColorInterp::Blue]), false)?;
		assert_eq!(style_bands(&style), vec![(2, Composite::Lighten), (3, Composite::Multiply)]);
		assert_eq!(style.bands[0].min, StyleValue::Value(0.0));
		assert_eq!(style.bands[0].max, StyleValue::Auto);
		assert_eq!(style.bands[1].palette, Some(vec![Color([0, 0, 0, 255]), Color([0, 0, 255, 255])]));
		Ok(())
	}

	#[test]
	fn single_band_config_and_default_request() -> Result<()> {
		let config: StyleConfig = serde_yaml_ng::from_str("band: 0")?;
		let style = build_style(Some(&config), &bands(&[ColorInterp::Gray]), false)?;
		assert_eq!(style_bands(&style), vec![(1, Composite::Lighten)]);

		let config: StyleConfig = serde_yaml_ng::from_str("band: 1\npalette: ['#000', '#fff']")?;
		let style = build_style(Some(&config), &bands(&[ColorInterp::Undefined]), false)?;
		assert_eq!(style.bands.len(), 1);
		Ok(())
	}

	#[test]
	fn invalid_styles_are_rejected() {
		let map = bands(&[ColorInterp::Gray]);
		let config: StyleConfig = serde_yaml_ng::from_str("band: alpha").unwrap();
		let err = build_style(Some(&config), &map, false).unwrap_err();
		assert!(matches!(TileSourceError::of(&err), Some(TileSourceError::Request(_))));

		let config: StyleConfig = serde_yaml_ng::from_str("band: 1\npalette: colortable").unwrap();
		assert!(build_style(Some(&config), &map, false).is_err());

		assert!(serde_yaml_ng::from_str::<StyleConfig>("band: 1\npalette: chartreuse").is_err());
		assert!(serde_yaml_ng::from_str::<StyleConfig>("band: 1\nmin: lowest").is_err());
	}
}
