use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;

use neighbour_graph_canvas::graph::writer::{to_csv_string, write_csv_file};
use neighbour_graph_canvas::graph::{
	BuildParams, GraphBuilder, GraphEvent, GraphModel, Node, NodeGeometry, NodeId, NodeSize,
	NodeStore, Order, Position, RelationBuilder,
};

fn node(id: NodeId) -> Node {
	Node::new(id, Position::new(id as f64, 0.0, 0.0), NodeSize::default())
}

/// Reports a fixed list of relations, ticking progress before each.
struct Scripted(Vec<(NodeId, NodeId, Order)>);

impl RelationBuilder for Scripted {
	fn build(
		&mut self,
		_nodes: &[NodeGeometry],
		_params: BuildParams,
		progress: &mut dyn FnMut() -> ControlFlow<()>,
		edge: &mut dyn FnMut(NodeId, NodeId, Order),
	) {
		for &(a, b, order) in &self.0 {
			if progress().is_break() {
				return;
			}
			edge(a, b, order);
		}
	}
}

#[test]
fn csv_export_of_a_chain() {
	let mut model = GraphModel::new();
	let mut builder = GraphBuilder::new(Scripted(vec![(1, 2, 1), (2, 3, 1)]));
	builder.add_nodes(&mut model, [node(3), node(1), node(2)]);
	builder.build(&mut model, BuildParams::default(), || ControlFlow::Continue(()));

	let csv = to_csv_string(model.get_nodes()).unwrap();
	assert_eq!(csv, "Id,neighbours\n1,2\n2,1,3\n3,2\n");
}

#[test]
fn csv_export_to_file() {
	let mut model = GraphModel::new();
	let mut builder = GraphBuilder::new(Scripted(vec![(1, 2, 1), (1, 3, 2)]));
	builder.add_nodes(&mut model, [node(1), node(2), node(3)]);
	builder.build(&mut model, BuildParams::default(), || ControlFlow::Continue(()));

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("graph.csv");
	assert_eq!(write_csv_file(model.get_nodes(), &path).unwrap(), 3);
	assert_eq!(
		std::fs::read_to_string(&path).unwrap(),
		"Id,neighbours\n1,2,3\n2,1\n3,1\n"
	);
}

#[test]
fn symmetry_holds_for_every_discovered_relation() {
	let relations = vec![(1, 2, 1), (2, 3, 1), (1, 3, 2), (4, 1, 3), (5, 1, 1)];
	let mut model = GraphModel::new();
	let mut builder = GraphBuilder::new(Scripted(relations.clone()));
	builder.add_nodes(&mut model, (1..=4).map(node));
	let report = builder.build(&mut model, BuildParams::default(), || ControlFlow::Continue(()));

	assert_eq!(report.discovered, 5);
	for (a, b, order) in relations.into_iter().filter(|&(a, _, _)| a != 5) {
		assert!(model.get_node(a).unwrap().has_neighbour(b, order));
		assert!(model.get_node(b).unwrap().has_neighbour(a, order));
	}
	assert!(model.get_node(5).is_none());
	assert!(!model.get_node(1).unwrap().has_neighbour(5, 1));
}

#[test]
fn rebuild_tears_down_before_loading() {
	let mut model = GraphModel::new();
	let mut builder = GraphBuilder::new(Scripted(vec![(1, 2, 1)]));
	builder.add_nodes(&mut model, [node(1), node(2)]);
	builder.build(&mut model, BuildParams::default(), || ControlFlow::Continue(()));
	model.select_node(1);

	let log = Rc::new(RefCell::new(Vec::new()));
	let sink = log.clone();
	model.subscribe(Rc::new(RefCell::new(
		move |event: &GraphEvent, nodes: &NodeStore| {
			if let GraphEvent::NodeRemoved(id) = *event {
				assert!(nodes.get(id).is_some());
			}
			sink.borrow_mut().push(*event);
		},
	)));

	builder.add_nodes(&mut model, [node(7)]);

	assert_eq!(model.current_selection(), None);
	assert_eq!(model.nodes().ids().collect::<Vec<_>>(), vec![7]);
	assert_eq!(
		*log.borrow(),
		vec![
			GraphEvent::EdgeRemoved {
				from: 1,
				to: 2,
				order: 1
			},
			GraphEvent::SelectionChanged {
				id: 1,
				selected: false
			},
			GraphEvent::NodeRemoved(1),
			GraphEvent::NodeRemoved(2),
			GraphEvent::NodeAdded(7),
		]
	);
}

#[test]
fn cancelled_build_keeps_partial_graph() {
	let mut model = GraphModel::new();
	let mut builder = GraphBuilder::new(Scripted(vec![(1, 2, 1), (2, 3, 1), (3, 4, 1)]));
	builder.add_nodes(&mut model, (1..=4).map(node));

	let mut budget = 2;
	let report = builder.build(&mut model, BuildParams::default(), || {
		if budget == 0 {
			return ControlFlow::Break(());
		}
		budget -= 1;
		ControlFlow::Continue(())
	});

	assert!(report.cancelled);
	assert_eq!(model.edges().len(), 2);
	assert_eq!(model.get_node(4).unwrap().max_order(), 0);
}
