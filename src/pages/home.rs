use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::ops::ControlFlow;
use std::rc::Rc;

use leptos::prelude::*;
use log::error;

use crate::components::graph_scene::{Axes, GraphSceneCanvas, SharedModel};
use crate::graph::detection::parse_events;
use crate::graph::writer::to_csv_string;
use crate::graph::{
	BuildParams, GraphBuilder, GraphEvent, GraphModel, Node, NodeGeometry, NodeId, NodeSize,
	NodeStore, Order, Position, RelationBuilder,
};

const LAYERS: i64 = 4;
const GRID: i64 = 6;
const PITCH: f64 = 2.0;
const LAYER_GAP: f64 = 3.0;

const SAMPLE_EVENTS: &str = r#"{
	"Events": [
		{
			"ID": 0,
			"Trajectories": [
				{ "ID": 0, "Hits": [1, 38, 75, 112] },
				{ "ID": 1, "Hits": [36, 71, 106, 141] },
				{ "Hits": [16, 52, 88, 124] }
			]
		}
	]
}"#;

/// Layered grid of sensor elements, `LAYERS` planes of `GRID` x `GRID`.
fn generate_sample_nodes() -> Vec<Node> {
	let mut nodes = Vec::new();
	for layer in 0..LAYERS {
		for row in 0..GRID {
			for col in 0..GRID {
				let id = layer * GRID * GRID + row * GRID + col + 1;
				let pos = Position::new(
					col as f64 * PITCH,
					row as f64 * PITCH,
					layer as f64 * LAYER_GAP,
				);
				nodes.push(Node::new(id, pos, NodeSize { x: 1.2, y: 1.2 }));
			}
		}
	}
	nodes
}

/// Stand-in for the detector's neighbour discovery: elements are direct
/// neighbours when they are within one pitch in-plane or stacked in adjacent
/// layers; higher orders are graph distances over those.
struct GridRelations;

impl GridRelations {
	fn adjacent(a: &NodeGeometry, b: &NodeGeometry, tolerance: f64) -> bool {
		let slack = 1.0 + tolerance;
		let (dx, dy, dz) = (
			(a.pos.x - b.pos.x).abs(),
			(a.pos.y - b.pos.y).abs(),
			(a.pos.z - b.pos.z).abs(),
		);
		if dz < f64::EPSILON {
			dx <= PITCH * slack && dy <= PITCH * slack
		} else {
			dx < f64::EPSILON && dy < f64::EPSILON && dz <= LAYER_GAP * slack
		}
	}
}

impl RelationBuilder for GridRelations {
	fn build(
		&mut self,
		nodes: &[NodeGeometry],
		params: BuildParams,
		progress: &mut dyn FnMut() -> ControlFlow<()>,
		edge: &mut dyn FnMut(NodeId, NodeId, Order),
	) {
		let direct: Vec<Vec<usize>> = nodes
			.iter()
			.enumerate()
			.map(|(i, a)| {
				(0..nodes.len())
					.filter(|&j| j != i && Self::adjacent(a, &nodes[j], params.tolerance))
					.collect()
			})
			.collect();

		for (i, source) in nodes.iter().enumerate() {
			if progress().is_break() {
				return;
			}
			let mut dist: BTreeMap<usize, Order> = BTreeMap::from([(i, 0)]);
			let mut queue = VecDeque::from([i]);
			while let Some(cur) = queue.pop_front() {
				let d = dist[&cur];
				if d == params.order {
					continue;
				}
				for &next in &direct[cur] {
					if !dist.contains_key(&next) {
						dist.insert(next, d + 1);
						queue.push_back(next);
					}
				}
			}
			// each pair once, from the lower index
			for (&j, &order) in dist.range(i + 1..) {
				edge(source.id, nodes[j].id, order);
			}
		}
	}
}

/// Default Home Page
#[component]
pub fn Home() -> impl IntoView {
	let model = SharedModel::new(GraphModel::new());
	let builder = Rc::new(RefCell::new(GraphBuilder::new(GridRelations)));

	let (order, set_order) = signal(BuildParams::default().order);
	let (status, set_status) = signal(String::new());
	let (csv, set_csv) = signal(String::new());
	let (show_detection, set_show_detection) = signal(false);
	let (selected, set_selected) = signal(None::<NodeId>);

	model.with_mut(|m| {
		m.subscribe(Rc::new(RefCell::new(
			move |event: &GraphEvent, _: &NodeStore| {
				if let GraphEvent::SelectionChanged { id, selected: on } = *event {
					set_selected.set(on.then_some(id));
				}
			},
		)));
	});

	let rebuild = {
		let (model, builder) = (model.clone(), builder.clone());
		move || {
			let params = BuildParams {
				order: order.get_untracked(),
				..BuildParams::default()
			};
			set_show_detection.set(false);
			let mut ticks = 0usize;
			let report = model.with_mut(|m| {
				let mut builder = builder.borrow_mut();
				builder.add_nodes(m, generate_sample_nodes());
				builder.build(m, params, || {
					ticks += 1;
					ControlFlow::Continue(())
				})
			});
			set_status.set(format!(
				"{} nodes, {} relations up to order {} ({} progress steps)",
				model.with(|m| m.node_count()),
				report.discovered,
				params.order,
				ticks
			));
		}
	};
	rebuild();

	let events = parse_events(SAMPLE_EVENTS).unwrap_or_else(|e| {
		error!("{}", e);
		Vec::new()
	});
	let detection = Signal::derive(move || {
		if show_detection.get() {
			events.first().cloned()
		} else {
			None
		}
	});

	let model_csv = model.clone();
	let export_csv = move |_: web_sys::MouseEvent| {
		let text = model_csv.with(|m| to_csv_string(m.get_nodes()));
		set_csv.set(text.unwrap_or_else(|e| e.to_string()));
	};

	view! {
		<div class="graph-page">
			<div class="graph-toolbar">
				<label>
					"Order "
					<input
						type="number"
						min="1"
						max="6"
						prop:value=move || order.get().to_string()
						on:input=move |ev| {
							if let Ok(v) = event_target_value(&ev).parse::<Order>() {
								set_order.set(v.clamp(1, 6));
							}
						}
					/>
				</label>
				<button on:click=move |_| rebuild()>"Rebuild"</button>
				<label>
					<input
						type="checkbox"
						prop:checked=move || show_detection.get()
						on:change=move |ev| set_show_detection.set(event_target_checked(&ev))
					/>
					" Show detection"
				</label>
				<button on:click=export_csv>"Export CSV"</button>
				<span class="status">{move || status.get()}</span>
				<span class="selection">
					{move || match selected.get() {
						Some(id) => format!("Selected node {}", id),
						None => "No selection".to_string(),
					}}
				</span>
			</div>
			<div class="graph-views" style="display: flex; height: 70vh;">
				<div style="flex: 1;">
					<GraphSceneCanvas model=model.clone() axes=Axes::XY detection=detection />
				</div>
				<div style="flex: 1;">
					<GraphSceneCanvas model=model.clone() axes=Axes::XZ detection=detection />
				</div>
			</div>
			<pre class="graph-csv">{move || csv.get()}</pre>
			<p class="subtitle">
				"Drag from node to node to add a relation. Click to select. Middle-drag to pan, scroll to zoom, double-click to refit."
			</p>
		</div>
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sample_grid_relations() {
		let mut model = GraphModel::new();
		let mut builder = GraphBuilder::new(GridRelations);
		builder.add_nodes(&mut model, generate_sample_nodes());
		let report = builder.build(
			&mut model,
			BuildParams {
				order: 2,
				tolerance: 0.1,
			},
			|| ControlFlow::Continue(()),
		);
		assert!(!report.cancelled);

		// corner of the first layer: 3 in-plane plus 1 stacked
		let corner = model.get_node(1).unwrap();
		assert_eq!(corner.neighbours(1).collect::<Vec<_>>(), vec![2, 7, 8, 37]);
		assert!(corner.has_neighbour(3, 2));
		assert!(corner.has_neighbour(73, 2));
		assert_eq!(corner.max_order(), 2);
	}

	#[test]
	fn test_sample_events_parse() {
		let events = parse_events(SAMPLE_EVENTS).unwrap();
		assert_eq!(events[0].trajectories.len(), 3);
		assert_eq!(events[0].trajectories[2].id, 0);
	}
}
