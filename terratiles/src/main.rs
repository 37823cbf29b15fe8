mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{ErrorLevel, Verbosity};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<ErrorLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Show the pyramid, bounds and bands of a raster
	Probe(tools::probe::Subcommand),

	/// Show where a tile lies and whether it has data
	Tile(tools::tile::Subcommand),

	/// Resolve a region request into pyramid pixels
	Region(tools::region::Subcommand),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	println!("{}", run(&cli)?);
	Ok(())
}

fn run(cli: &Cli) -> Result<String> {
	match &cli.command {
		Commands::Probe(arguments) => tools::probe::run(arguments),
		Commands::Tile(arguments) => tools::tile::run(arguments),
		Commands::Region(arguments) => tools::region::run(arguments),
	}
}

#[cfg(test)]
mod tests {
	use crate::{Cli, run};
	use anyhow::Result;
	use clap::Parser;
	use std::io::Write;
	use tempfile::NamedTempFile;

	pub fn run_command(arg_vec: Vec<&str>) -> Result<String> {
		let cli = Cli::try_parse_from(arg_vec)?;
		run(&cli)
	}

	/// A descriptor of a 1000×800 UTM raster with 30 m pixels.
	pub fn utm_descriptor() -> NamedTempFile {
		let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
		writeln!(
			file,
			"width: 1000\nheight: 800\ndriver: GTiff\ncrs: EPSG:32633\ngeotransform: [500000, 30, 0, 5600000, 0, -30]\nbands:\n  - interpretation: gray\n    fill: 42\n    nodata: 0"
		)
		.unwrap();
		file
	}

	#[test]
	fn help() {
		let err = run_command(vec!["terratiles"]).unwrap_err().to_string();
		assert!(err.contains("Usage: terratiles [OPTIONS] <COMMAND>"));
	}

	#[test]
	fn version() {
		let err = run_command(vec!["terratiles", "-V"]).unwrap_err().to_string();
		assert!(err.starts_with("terratiles "));
	}

	#[test]
	fn subcommands_require_arguments() {
		let err = run_command(vec!["terratiles", "probe"]).unwrap_err().to_string();
		assert!(err.starts_with("Show the pyramid, bounds and bands of a raster"));
		let err = run_command(vec!["terratiles", "tile"]).unwrap_err().to_string();
		assert!(err.starts_with("Show where a tile lies and whether it has data"));
		let err = run_command(vec!["terratiles", "region"]).unwrap_err().to_string();
		assert!(err.starts_with("Resolve a region request into pyramid pixels"));
	}
}
