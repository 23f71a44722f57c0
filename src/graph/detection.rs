//! Read-only detection overlays: groups of hit node ids drawn on top of a scene.
//!
//! Input is JSON of the form
//! `{"Events": [{"ID": 0, "Trajectories": [{"ID": 0, "Hits": [1, 2, 3]}]}]}`.
//! Missing `ID`s are filled from running counters.

use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;
use thiserror::Error;

use super::color::{Color, GOLDEN_RATIO_CONJUGATE};
use super::node::NodeId;

/// Why a detection file could not be loaded.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DetectionError {
	#[error("Unable to open file for reading: {0}")]
	Io(#[from] std::io::Error),
	#[error("Invalid detection event file: {0}")]
	Parse(#[from] serde_json::Error),
}

/// Hits attributed to one particle track.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub struct Trajectory {
	pub id: i64,
	pub hits: Vec<NodeId>,
	pub color: Color,
}

/// A set of trajectories recorded together.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub struct DetectionEvent {
	pub id: i64,
	pub trajectories: Vec<Trajectory>,
}

impl DetectionEvent {
	/// Assigns each trajectory its overlay color: the hue starts at
	/// `1 / (id + 1)` and steps by the golden-ratio conjugate per trajectory.
	pub fn new(id: i64, hits: impl IntoIterator<Item = (i64, Vec<NodeId>)>) -> Self {
		let mut hue = 1.0 / (id as f64 + 1.0);
		let trajectories = hits
			.into_iter()
			.map(|(tid, hits)| {
				hue = (hue + GOLDEN_RATIO_CONJUGATE) % 1.0;
				Trajectory {
					id: tid,
					hits,
					color: Color::from_hsl(hue, 1.0, 0.45),
				}
			})
			.collect();
		Self { id, trajectories }
	}
}

#[derive(Deserialize)]
struct RawFile {
	#[serde(rename = "Events", default)]
	events: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct RawEvent {
	#[serde(rename = "ID")]
	id: Option<i64>,
	#[serde(rename = "Trajectories", default)]
	trajectories: Vec<RawTrajectory>,
}

#[derive(Deserialize)]
struct RawTrajectory {
	#[serde(rename = "ID")]
	id: Option<i64>,
	#[serde(rename = "Hits", default)]
	hits: Vec<NodeId>,
}

/// Parses a detection event document.
pub fn parse_events(json: &str) -> Result<Vec<DetectionEvent>, DetectionError> {
	let raw: RawFile = serde_json::from_str(json)?;

	let mut next_event = 0;
	let events: Vec<DetectionEvent> = raw
		.events
		.into_iter()
		.map(|event| {
			let id = event.id.unwrap_or_else(|| {
				next_event += 1;
				next_event - 1
			});
			let mut next_traj = 0;
			let hits = event.trajectories.into_iter().map(|t| {
				let tid = t.id.unwrap_or_else(|| {
					next_traj += 1;
					next_traj - 1
				});
				(tid, t.hits)
			});
			DetectionEvent::new(id, hits.collect::<Vec<_>>())
		})
		.collect();

	info!("parsed {} detection events", events.len());
	Ok(events)
}

#[allow(missing_docs)]
pub fn read_events_file(path: impl AsRef<Path>) -> Result<Vec<DetectionEvent>, DetectionError> {
	let json = fs::read_to_string(path)?;
	parse_events(&json)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_parse_assigns_missing_ids() {
		let json = r#"{
			"Events": [
				{"Trajectories": [{"Hits": [1, 2]}, {"ID": 7, "Hits": [3]}, {"Hits": []}]},
				{"ID": 42},
				{}
			]
		}"#;
		let events = parse_events(json).unwrap();

		assert_eq!(events.iter().map(|e| e.id).collect::<Vec<_>>(), vec![0, 42, 1]);
		let ids: Vec<_> = events[0].trajectories.iter().map(|t| t.id).collect();
		assert_eq!(ids, vec![0, 7, 1]);
		assert_eq!(events[0].trajectories[0].hits, vec![1, 2]);
		assert!(events[1].trajectories.is_empty());
	}

	#[test]
	fn test_trajectory_colors_follow_golden_ratio() {
		let event = DetectionEvent::new(0, vec![(0, vec![1]), (1, vec![2])]);
		let h0 = (1.0 + GOLDEN_RATIO_CONJUGATE) % 1.0;
		let h1 = (h0 + GOLDEN_RATIO_CONJUGATE) % 1.0;
		assert_eq!(event.trajectories[0].color, Color::from_hsl(h0, 1.0, 0.45));
		assert_eq!(event.trajectories[1].color, Color::from_hsl(h1, 1.0, 0.45));
	}

	#[test]
	fn test_missing_events_key_yields_nothing() {
		assert!(parse_events("{}").unwrap().is_empty());
	}

	#[test]
	fn test_bad_json_is_an_error() {
		let err = parse_events("{not json").unwrap_err();
		assert!(matches!(err, DetectionError::Parse(_)));
	}

	#[test]
	fn test_read_events_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, r#"{{"Events": [{{"ID": 3, "Trajectories": [{{"Hits": [5]}}]}}]}}"#).unwrap();

		let events = read_events_file(file.path()).unwrap();
		assert_eq!(events.len(), 1);
		assert_eq!(events[0].trajectories[0].hits, vec![5]);

		let missing = read_events_file(file.path().with_extension("missing"));
		assert!(matches!(missing, Err(DetectionError::Io(_))));
	}
}
