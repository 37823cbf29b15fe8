//! Error categories raised by tile sources.
//!
//! Functions in this workspace return [`anyhow::Result`]. The root cause of
//! every failure that a caller may want to react to is a [`TileSourceError`],
//! so callers can classify a failure with
//! `err.downcast_ref::<TileSourceError>()` while still reading the full
//! context chain.

use thiserror::Error;

/// The failure categories of a geospatial tile source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileSourceError {
	/// The dataset path does not exist.
	#[error("no such file: {0}")]
	NotFound(String),

	/// The I/O engine could not open the dataset.
	#[error("file cannot be opened via the raster engine: {0}")]
	CannotOpen(String),

	/// The dataset and the requested options cannot form a valid pyramid.
	#[error("configuration error: {0}")]
	Config(String),

	/// A single request is malformed or out of range.
	#[error("request error: {0}")]
	Request(String),

	/// The dataset is not an efficiently tiled file.
	#[error("file is not an efficiently tiled raster: {}", .0.join("; "))]
	Inefficient(Vec<String>),
}

impl TileSourceError {
	pub fn config(msg: impl Into<String>) -> anyhow::Error {
		anyhow::Error::new(TileSourceError::Config(msg.into()))
	}

	pub fn request(msg: impl Into<String>) -> anyhow::Error {
		anyhow::Error::new(TileSourceError::Request(msg.into()))
	}

	/// Returns the category of an error chain, if any link is a [`TileSourceError`].
	pub fn of(err: &anyhow::Error) -> Option<&TileSourceError> {
		err.chain().find_map(|e| e.downcast_ref::<TileSourceError>())
	}
}
