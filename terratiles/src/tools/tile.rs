use super::SourceArgs;
use anyhow::Result;
use clap::Args;
use serde_json::json;
use terratiles_core::TileCoord;

#[derive(Args, Debug)]
#[command(arg_required_else_help = true, disable_version_flag = true)]
pub struct Subcommand {
	#[command(flatten)]
	source: SourceArgs,

	/// zoom level
	level: u8,

	/// column
	x: u32,

	/// row
	y: u32,
}

pub fn run(arguments: &Subcommand) -> Result<String> {
	let source = arguments.source.open()?;
	let coord = TileCoord::new(arguments.level, arguments.x, arguments.y);
	let geometry = source.geometry();
	geometry.check_tile(&coord)?;

	let window = if geometry.is_projected() {
		None
	} else {
		let tile = geometry.tile_window(&coord)?;
		Some(json!({
			"col_off": tile.window.col_off,
			"row_off": tile.window.row_off,
			"width": tile.window.width,
			"height": tile.window.height,
		}))
	};
	let (x_min, y_min, x_max, y_max) = geometry.tile_corners(&coord);
	let tile = source.get_tile(arguments.x, arguments.y, arguments.level)?;

	let output = json!({
		"tile": coord.to_string(),
		"corners": [x_min, y_min, x_max, y_max],
		"window": window,
		"width": tile.width(),
		"height": tile.height(),
		"empty": tile.is_empty(),
	});
	Ok(serde_json::to_string_pretty(&output)?)
}
