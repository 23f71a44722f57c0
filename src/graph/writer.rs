//! CSV neighbour export.
//!
//! One row per node: its id followed by every neighbour id from order 1 up to
//! its highest order, all comma separated. Orders are not marked in the output.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use csv::WriterBuilder;
use log::info;
use thiserror::Error;

use super::node::Node;

/// Header record of the neighbour table.
pub const CSV_HEADER: [&str; 2] = ["Id", "neighbours"];

/// Why the neighbour table could not be written.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ExportError {
	#[error("No nodes to output!")]
	NoNodes,
	#[error("Failed to open file for writing: {0}")]
	Open(#[source] io::Error),
	#[error("Failed to write neighbours: {0}")]
	Csv(#[from] csv::Error),
	#[error("Failed to write neighbours: {0}")]
	Write(#[from] io::Error),
}

/// Writes the neighbour table and returns the number of rows.
pub fn write_csv<'a, W: Write>(
	nodes: impl IntoIterator<Item = &'a Node>,
	out: &mut W,
) -> Result<usize, ExportError> {
	let mut nodes = nodes.into_iter().peekable();
	if nodes.peek().is_none() {
		return Err(ExportError::NoNodes);
	}

	// rows differ in length
	let mut wtr = WriterBuilder::new().flexible(true).from_writer(out);
	wtr.write_record(CSV_HEADER)?;
	let mut rows = 0;
	for node in nodes {
		let mut record = vec![node.id().to_string()];
		for order in 1..=node.max_order() {
			record.extend(node.neighbours(order).map(|id| id.to_string()));
		}
		wtr.write_record(&record)?;
		rows += 1;
	}
	wtr.flush()?;
	Ok(rows)
}

/// Creates (or truncates) `path` and writes the neighbour table into it.
pub fn write_csv_file<'a>(
	nodes: impl IntoIterator<Item = &'a Node>,
	path: impl AsRef<Path>,
) -> Result<usize, ExportError> {
	let path = path.as_ref();
	let mut nodes = nodes.into_iter().peekable();
	if nodes.peek().is_none() {
		return Err(ExportError::NoNodes);
	}
	let file = File::create(path).map_err(ExportError::Open)?;
	let rows = write_csv(nodes, &mut BufWriter::new(file))?;
	info!("wrote {} rows to {}", rows, path.display());
	Ok(rows)
}

#[allow(missing_docs)]
pub fn to_csv_string<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Result<String, ExportError> {
	let mut buf = Vec::new();
	write_csv(nodes, &mut buf)?;
	Ok(String::from_utf8_lossy(&buf).into_owned())
}
