//! Maps remote dataset locations to the virtual paths raster engines understand.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

const URL_QUERY: &AsciiSet = &NON_ALPHANUMERIC.remove(b'_').remove(b'.').remove(b'-').remove(b'~');

/// Rewrites `s3://` and `http(s)://`/`ftp://` locations into virtual file
/// system paths. Local paths are returned unchanged.
///
/// # Examples
/// ```
/// use terratiles_source::dataset_path;
///
/// assert_eq!(dataset_path("s3://bucket/dem.tif"), "/vsis3/bucket/dem.tif");
/// assert_eq!(dataset_path("/data/dem.tif"), "/data/dem.tif");
/// ```
pub fn dataset_path(path: &str) -> String {
	if let Some(rest) = path.strip_prefix("s3://") {
		return format!("/vsis3/{rest}");
	}
	let lower = path.to_ascii_lowercase();
	if ["http://", "https://", "ftp://"].iter().any(|p| lower.starts_with(p)) {
		return format!(
			"/vsicurl?url={}&use_head=no&list_dir=no",
			utf8_percent_encode(path, URL_QUERY)
		);
	}
	path.to_string()
}
