//! Bulk (re)construction of the graph.
//!
//! The geometric neighbour discovery itself lives behind [`RelationBuilder`];
//! this module only feeds it the current nodes and forwards what it finds into
//! the model.

use std::ops::ControlFlow;

use log::info;
use serde::{Deserialize, Serialize};

use super::model::GraphModel;
use super::node::{Node, NodeGeometry, NodeId, Order};

/// Parameters of one discovery run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildParams {
	/// Highest relation order to discover.
	pub order: Order,
	/// Geometric threshold, interpreted by the relation builder only.
	pub tolerance: f64,
}

impl Default for BuildParams {
	fn default() -> Self {
		Self {
			order: 3,
			tolerance: 0.1,
		}
	}
}

/// Geometric neighbour discovery, supplied from outside the core.
///
/// Implementations call `progress` as often as they like; a
/// `ControlFlow::Break` asks them to stop as soon as possible. `edge` is called
/// once per discovered relation. The call blocks until discovery is over.
pub trait RelationBuilder {
	/// Discovers relations up to `params.order` among `nodes`.
	fn build(
		&mut self,
		nodes: &[NodeGeometry],
		params: BuildParams,
		progress: &mut dyn FnMut() -> ControlFlow<()>,
		edge: &mut dyn FnMut(NodeId, NodeId, Order),
	);
}

/// Outcome of [`GraphBuilder::build`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
	/// Relations reported by the relation builder, accepted or not.
	pub discovered: usize,
	/// Progress asked the relation builder to stop.
	pub cancelled: bool,
}

/// Drives bulk loading and relation discovery for a [`GraphModel`].
pub struct GraphBuilder<R> {
	relations: R,
}

#[allow(missing_docs)]
impl<R: RelationBuilder> GraphBuilder<R> {
	pub fn new(relations: R) -> Self {
		Self { relations }
	}

	pub fn relations(&self) -> &R {
		&self.relations
	}

	/// Edges first: they reference nodes.
	pub fn clear_all(&self, model: &mut GraphModel) {
		self.clear_edges(model);
		self.clear_nodes(model);
	}

	pub fn clear_nodes(&self, model: &mut GraphModel) {
		model.remove_all_nodes();
	}

	pub fn clear_edges(&self, model: &mut GraphModel) {
		model.remove_all_edges();
	}

	pub fn node_count(&self, model: &GraphModel) -> usize {
		model.node_count()
	}

	/// Replaces everything in the model with `nodes`.
	pub fn add_nodes(&self, model: &mut GraphModel, nodes: impl IntoIterator<Item = Node>) {
		self.clear_all(model);
		for node in nodes {
			model.add_node(node);
		}
		info!("loaded {} nodes", model.node_count());
	}

	/// Runs relation discovery over the model's current nodes, adding every
	/// reported relation to the model as it arrives.
	pub fn build(
		&mut self,
		model: &mut GraphModel,
		params: BuildParams,
		mut progress: impl FnMut() -> ControlFlow<()>,
	) -> BuildReport {
		let nodes: Vec<NodeGeometry> = model.get_nodes().map(Node::geometry).collect();
		let mut report = BuildReport::default();

		self.relations.build(
			&nodes,
			params,
			&mut || {
				let flow = progress();
				if flow.is_break() {
					report.cancelled = true;
				}
				flow
			},
			&mut |from, to, order| {
				report.discovered += 1;
				model.add_edge(from, to, order);
			},
		);

		info!(
			"build finished: {} nodes, {} relations{}",
			nodes.len(),
			report.discovered,
			if report.cancelled { " (cancelled)" } else { "" }
		);
		report
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::model::{GraphEvent, NodeStore};
	use crate::graph::node::{NodeSize, Position};
	use std::cell::RefCell;
	use std::rc::Rc;

	/// Chains nodes in the order given, reporting every pair up to `params.order` apart.
	struct ChainBuilder;

	impl RelationBuilder for ChainBuilder {
		fn build(
			&mut self,
			nodes: &[NodeGeometry],
			params: BuildParams,
			progress: &mut dyn FnMut() -> ControlFlow<()>,
			edge: &mut dyn FnMut(NodeId, NodeId, Order),
		) {
			for (i, a) in nodes.iter().enumerate() {
				if progress().is_break() {
					return;
				}
				for k in 1..=params.order as usize {
					if let Some(b) = nodes.get(i + k) {
						edge(a.id, b.id, k as Order);
					}
				}
			}
		}
	}

	fn nodes(ids: &[i64]) -> Vec<Node> {
		ids.iter()
			.map(|&id| Node::new(id, Position::default(), NodeSize::default()))
			.collect()
	}

	#[test]
	fn test_add_nodes_clears_first() {
		let mut model = GraphModel::new();
		let builder = GraphBuilder::new(ChainBuilder);
		builder.add_nodes(&mut model, nodes(&[1, 2, 3]));
		model.add_edge(1, 2, 1);

		let log = Rc::new(RefCell::new(Vec::new()));
		let sink = log.clone();
		model.subscribe(Rc::new(RefCell::new(
			move |e: &GraphEvent, _: &NodeStore| sink.borrow_mut().push(*e),
		)));

		builder.add_nodes(&mut model, nodes(&[10, 11]));

		assert_eq!(model.nodes().ids().collect::<Vec<_>>(), vec![10, 11]);
		let log = log.borrow();
		assert!(matches!(log[0], GraphEvent::EdgeRemoved { .. }));
		assert_eq!(log.iter().filter(|e| matches!(e, GraphEvent::NodeRemoved(_))).count(), 3);
		assert_eq!(log.last(), Some(&GraphEvent::NodeAdded(11)));
	}

	#[test]
	fn test_build_forwards_edges() {
		let mut model = GraphModel::new();
		let mut builder = GraphBuilder::new(ChainBuilder);
		builder.add_nodes(&mut model, nodes(&[1, 2, 3, 4]));

		let mut ticks = 0;
		let report = builder.build(
			&mut model,
			BuildParams {
				order: 2,
				tolerance: 0.0,
			},
			|| {
				ticks += 1;
				ControlFlow::Continue(())
			},
		);

		assert_eq!(ticks, 4);
		assert_eq!(report, BuildReport { discovered: 5, cancelled: false });
		let n2 = model.get_node(2).unwrap();
		assert_eq!(n2.neighbours(1).collect::<Vec<_>>(), vec![1, 3]);
		assert_eq!(n2.neighbours(2).collect::<Vec<_>>(), vec![4]);
	}

	#[test]
	fn test_build_can_be_cancelled() {
		let mut model = GraphModel::new();
		let mut builder = GraphBuilder::new(ChainBuilder);
		builder.add_nodes(&mut model, nodes(&[1, 2, 3, 4]));

		let mut ticks = 0;
		let report = builder.build(&mut model, BuildParams::default(), || {
			ticks += 1;
			if ticks > 1 {
				ControlFlow::Break(())
			} else {
				ControlFlow::Continue(())
			}
		});

		assert!(report.cancelled);
		assert_eq!(report.discovered, 3);
		assert_eq!(model.edges().len(), 3);
	}

	#[test]
	fn test_clear_all_empties_model() {
		let mut model = GraphModel::new();
		let mut builder = GraphBuilder::new(ChainBuilder);
		builder.add_nodes(&mut model, nodes(&[1, 2]));
		builder.build(&mut model, BuildParams::default(), || ControlFlow::Continue(()));

		builder.clear_all(&mut model);
		assert_eq!(builder.node_count(&model), 0);
		assert!(model.edges().is_empty());
	}
}
