use super::SourceArgs;
use anyhow::Result;
use clap::Args;
use serde_json::json;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(flatten)]
	source: SourceArgs,

	/// also show what the raster engine reports about the file
	#[arg(long, short)]
	internal: bool,

	/// check whether the file is a cloud optimized GeoTIFF, warnings fail the check
	#[arg(long)]
	cog: bool,
}

pub fn run(arguments: &Subcommand) -> Result<String> {
	let source = arguments.source.open()?;

	let mut output = serde_json::to_value(source.get_metadata()?)?;
	if arguments.internal {
		output["internal"] = serde_json::to_value(source.get_internal_metadata())?;
	}
	if arguments.cog {
		output["cog"] = json!(source.validate_cog(true, true)?);
	}
	Ok(serde_json::to_string_pretty(&output)?)
}

#[cfg(test)]
mod tests {
	use crate::tests::{run_command, utm_descriptor};
	use anyhow::Result;
	use pretty_assertions::assert_eq;
	use serde_json::Value;

	#[test]
	fn probe_pixel_pyramid() -> Result<()> {
		let file = utm_descriptor();
		let output = run_command(vec!["terratiles", "probe", file.path().to_str().unwrap()])?;
		let value: Value = serde_json::from_str(&output)?;
		assert_eq!(value["levels"], 3);
		assert_eq!(value["sizeX"], 1000);
		assert_eq!(value["geospatial"], true);
		assert_eq!(value["bands"]["1"]["interpretation"], "gray");
		assert_eq!(value["bounds"]["srs"], "EPSG:32633");
		assert!(value.get("internal").is_none());
		Ok(())
	}

	#[test]
	fn probe_projected_pyramid() -> Result<()> {
		let file = utm_descriptor();
		let path = file.path().to_str().unwrap();
		let output = run_command(vec![
			"terratiles",
			"probe",
			path,
			"--projection",
			"EPSG:3857",
			"--units-per-pixel",
			"10",
			"--internal",
			"--cog",
		])?;
		let value: Value = serde_json::from_str(&output)?;
		// 2560 m at level 0 and 30 m pixels fit in one level
		assert_eq!(value["levels"], 1);
		assert_eq!(value["sizeX"], 256);
		assert_eq!(value["bounds"]["srs"], "EPSG:3857");
		assert_eq!(value["sourceBounds"]["srs"], "EPSG:32633");
		assert_eq!(value["internal"]["driverShortName"], "GTiff");
		assert_eq!(value["cog"], true);
		Ok(())
	}

	#[test]
	fn geographic_projection_is_rejected() {
		let file = utm_descriptor();
		let err = run_command(vec![
			"terratiles",
			"probe",
			file.path().to_str().unwrap(),
			"--projection",
			"EPSG:4326",
		])
		.unwrap_err();
		assert!(format!("{err:#}").contains("geographic"));
	}
}
