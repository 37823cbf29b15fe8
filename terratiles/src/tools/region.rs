use super::SourceArgs;
use anyhow::Result;
use clap::Args;
use serde_json::json;
use terratiles_core::{RegionSpec, Units};
use terratiles_source::OutputSize;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(flatten)]
	source: SourceArgs,

	#[arg(long, allow_negative_numbers = true)]
	left: Option<f64>,

	#[arg(long, allow_negative_numbers = true)]
	top: Option<f64>,

	#[arg(long, allow_negative_numbers = true)]
	right: Option<f64>,

	#[arg(long, allow_negative_numbers = true)]
	bottom: Option<f64>,

	#[arg(long)]
	width: Option<f64>,

	#[arg(long)]
	height: Option<f64>,

	/// units of the edges: base_pixels, fraction, projection, wgs84 or any CRS
	#[arg(long, short, default_value = "base_pixels")]
	units: String,

	/// units of width and height, if they differ from the edge units
	#[arg(long)]
	units_wh: Option<String>,

	/// maximum output width in pixels
	#[arg(long)]
	max_width: Option<u32>,

	/// maximum output height in pixels
	#[arg(long)]
	max_height: Option<u32>,
}

pub fn run(arguments: &Subcommand) -> Result<String> {
	let source = arguments.source.open()?;
	let spec = RegionSpec {
		left: arguments.left,
		top: arguments.top,
		right: arguments.right,
		bottom: arguments.bottom,
		width: arguments.width,
		height: arguments.height,
		units: Units::parse(&arguments.units)?,
		units_wh: arguments.units_wh.as_deref().map(Units::parse).transpose()?,
	};
	let output = OutputSize {
		max_width: arguments.max_width,
		max_height: arguments.max_height,
	};

	let data = source.get_region(&spec, output)?;
	let output = json!({
		"region": data.region,
		"output": { "width": data.buffer.width, "height": data.buffer.height },
	});
	Ok(serde_json::to_string_pretty(&output)?)
}
