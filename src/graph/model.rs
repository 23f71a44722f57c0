//! Authoritative node registry with multi-order adjacency and a single selection slot.
//!
//! Every mutation is announced to the registered observers as a [`GraphEvent`],
//! synchronously and in subscription order. Observers receive a read-only view
//! of the node store alongside the event, so a `NodeRemoved` handler can still
//! look the node up: the storage entry is erased only after delivery.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{debug, error, warn};

use super::node::{Node, NodeId, Order};

/// Change notification delivered to every [`GraphObserver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphEvent {
	/// Delivered once the node is stored.
	NodeAdded(NodeId),
	/// Delivered while the node is still resolvable in the store.
	NodeRemoved(NodeId),
	/// Delivered after both adjacency tables were updated.
	#[allow(missing_docs)]
	EdgeAdded {
		from: NodeId,
		to: NodeId,
		order: Order,
	},
	#[allow(missing_docs)]
	EdgeRemoved {
		from: NodeId,
		to: NodeId,
		order: Order,
	},
	#[allow(missing_docs)]
	SelectionChanged {
		id: NodeId,
		selected: bool,
	},
}

/// One relation as it was requested, in the direction it was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub struct Edge {
	pub from: NodeId,
	pub to: NodeId,
	pub order: Order,
}

impl Edge {
	/// True if this edge joins `a` and `b`, in either direction.
	pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
		(self.from == a && self.to == b) || (self.from == b && self.to == a)
	}

	/// True if `id` is one of the endpoints.
	pub fn touches(&self, id: NodeId) -> bool {
		self.from == id || self.to == id
	}
}

/// Id-indexed node arena. Read-only outside of [`GraphModel`].
#[derive(Debug, Default)]
pub struct NodeStore {
	nodes: BTreeMap<NodeId, Node>,
}

#[allow(missing_docs)]
impl NodeStore {
	pub fn get(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(&id)
	}

	pub fn contains(&self, id: NodeId) -> bool {
		self.nodes.contains_key(&id)
	}

	/// Nodes in ascending id order.
	pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
		self.nodes.values()
	}

	pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
		self.nodes.keys().copied()
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}
}

/// Receiver of model change notifications.
pub trait GraphObserver {
	/// Called synchronously for every change, in subscription order.
	fn on_event(&mut self, event: &GraphEvent, nodes: &NodeStore);
}

impl<F> GraphObserver for F
where
	F: FnMut(&GraphEvent, &NodeStore),
{
	fn on_event(&mut self, event: &GraphEvent, nodes: &NodeStore) {
		self(event, nodes)
	}
}

/// Handle returned by [`GraphModel::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Mutation requested by a view. Views never mutate the model themselves;
/// they hand these back to whoever owns the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ModelRequest {
	AddEdge {
		from: NodeId,
		to: NodeId,
		order: Order,
	},
	Select(NodeId),
	Deselect(NodeId),
}

/// Single source of truth for nodes, relations and selection.
#[derive(Default)]
pub struct GraphModel {
	store: NodeStore,
	edges: Vec<Edge>,
	selection: Option<NodeId>,
	observers: Vec<(ObserverId, Rc<RefCell<dyn GraphObserver>>)>,
	next_observer: u64,
}

impl GraphModel {
	#[allow(missing_docs)]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an observer. Delivery order follows registration order.
	pub fn subscribe(&mut self, observer: Rc<RefCell<dyn GraphObserver>>) -> ObserverId {
		let id = ObserverId(self.next_observer);
		self.next_observer += 1;
		self.observers.push((id, observer));
		id
	}

	/// Returns false when `id` was not subscribed.
	pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
		let before = self.observers.len();
		self.observers.retain(|(oid, _)| *oid != id);
		self.observers.len() != before
	}

	fn emit(&self, event: GraphEvent) {
		for (id, observer) in &self.observers {
			match observer.try_borrow_mut() {
				Ok(mut observer) => observer.on_event(&event, &self.store),
				Err(_) => error!("observer {:?} is busy, dropped {:?}", id, event),
			}
		}
	}

	/// Registers `node` under its id. A duplicate id leaves the model untouched.
	pub fn add_node(&mut self, node: Node) {
		let id = node.id();
		if self.store.contains(id) {
			warn!("node {} already registered, ignoring", id);
			return;
		}
		self.store.nodes.insert(id, node);
		self.emit(GraphEvent::NodeAdded(id));
	}

	/// Adds a symmetric relation between two registered nodes.
	///
	/// Missing endpoints, self relations, order 0 and relations that already
	/// exist at this order are silently ignored.
	pub fn add_edge(&mut self, from: NodeId, to: NodeId, order: Order) {
		if order == 0 || from == to {
			debug!("ignoring edge {} -> {} at order {}", from, to, order);
			return;
		}
		if !self.store.contains(from) || !self.store.contains(to) {
			debug!("ignoring edge {} -> {}: missing endpoint", from, to);
			return;
		}
		if self
			.store
			.get(from)
			.is_some_and(|n| n.has_neighbour(to, order))
		{
			debug!("edge {} -> {} at order {} already exists", from, to, order);
			return;
		}

		if let Some(n) = self.store.nodes.get_mut(&from) {
			n.add_neighbour(to, order);
		}
		if let Some(n) = self.store.nodes.get_mut(&to) {
			n.add_neighbour(from, order);
		}
		self.edges.push(Edge { from, to, order });
		self.emit(GraphEvent::EdgeAdded { from, to, order });
	}

	fn detach_edge(&mut self, edge: Edge) {
		if let Some(n) = self.store.nodes.get_mut(&edge.from) {
			n.remove_neighbour_at(edge.to, edge.order);
		}
		if let Some(n) = self.store.nodes.get_mut(&edge.to) {
			n.remove_neighbour_at(edge.from, edge.order);
		}
		self.emit(GraphEvent::EdgeRemoved {
			from: edge.from,
			to: edge.to,
			order: edge.order,
		});
	}

	/// Removes a node: deselects it if needed, drops its incident edges, then
	/// announces `NodeRemoved` before erasing the storage entry.
	pub fn remove_node(&mut self, id: NodeId) {
		if !self.store.contains(id) {
			return;
		}
		if self.selection == Some(id) {
			self.deselect_node(id);
		}

		let (incident, rest): (Vec<Edge>, Vec<Edge>) =
			std::mem::take(&mut self.edges).into_iter().partition(|e| e.touches(id));
		self.edges = rest;
		for edge in incident {
			self.detach_edge(edge);
		}

		self.emit(GraphEvent::NodeRemoved(id));
		self.store.nodes.remove(&id);
	}

	/// Removes every node, one by one, over a snapshot of the ids.
	pub fn remove_all_nodes(&mut self) {
		let ids: Vec<NodeId> = self.store.ids().collect();
		for id in ids {
			self.remove_node(id);
		}
	}

	/// Removes every relation of every order.
	pub fn remove_all_edges(&mut self) {
		let edges = std::mem::take(&mut self.edges);
		for edge in edges {
			self.detach_edge(edge);
		}
	}

	/// Selects `id`, deselecting any other node first. Selecting the current
	/// selection again, or an unknown id, does nothing.
	pub fn select_node(&mut self, id: NodeId) {
		if self.selection == Some(id) {
			return;
		}
		if !self.store.contains(id) {
			debug!("cannot select unknown node {}", id);
			return;
		}
		if let Some(prev) = self.selection.take() {
			self.emit(GraphEvent::SelectionChanged {
				id: prev,
				selected: false,
			});
		}
		self.selection = Some(id);
		self.emit(GraphEvent::SelectionChanged { id, selected: true });
	}

	/// Always announces the deselection of `id` and clears the selection slot.
	/// If another node held the selection, its deselection is announced first.
	pub fn deselect_node(&mut self, id: NodeId) {
		if let Some(prev) = self.selection.take().filter(|&prev| prev != id) {
			self.emit(GraphEvent::SelectionChanged {
				id: prev,
				selected: false,
			});
		}
		self.emit(GraphEvent::SelectionChanged {
			id,
			selected: false,
		});
	}

	#[allow(missing_docs)]
	pub fn current_selection(&self) -> Option<NodeId> {
		self.selection
	}

	/// `None` for unknown ids.
	pub fn get_node(&self, id: NodeId) -> Option<&Node> {
		self.store.get(id)
	}

	/// Nodes in ascending id order.
	pub fn get_nodes(&self) -> impl Iterator<Item = &Node> + '_ {
		self.store.iter()
	}

	/// Read-only view of the node arena.
	pub fn nodes(&self) -> &NodeStore {
		&self.store
	}

	#[allow(missing_docs)]
	pub fn node_count(&self) -> usize {
		self.store.len()
	}

	/// Every registered relation, all orders, in insertion order.
	pub fn edges(&self) -> &[Edge] {
		&self.edges
	}

	/// Carries out a request coming from a view.
	pub fn apply(&mut self, request: ModelRequest) {
		match request {
			ModelRequest::AddEdge { from, to, order } => self.add_edge(from, to, order),
			ModelRequest::Select(id) => self.select_node(id),
			ModelRequest::Deselect(id) => self.deselect_node(id),
		}
	}

	#[allow(missing_docs)]
	pub fn apply_all(&mut self, requests: impl IntoIterator<Item = ModelRequest>) {
		for request in requests {
			self.apply(request);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::node::{NodeSize, Position};

	fn node(id: NodeId) -> Node {
		Node::new(id, Position::new(id as f64, 0.0, 0.0), NodeSize::default())
	}

	fn model_with(ids: &[NodeId]) -> GraphModel {
		let mut model = GraphModel::new();
		for &id in ids {
			model.add_node(node(id));
		}
		model
	}

	fn record(model: &mut GraphModel) -> Rc<RefCell<Vec<GraphEvent>>> {
		let log = Rc::new(RefCell::new(Vec::new()));
		let sink = log.clone();
		model.subscribe(Rc::new(RefCell::new(
			move |event: &GraphEvent, _: &NodeStore| sink.borrow_mut().push(*event),
		)));
		log
	}

	#[test]
	fn test_add_edge_is_symmetric() {
		let mut model = model_with(&[1, 2, 3]);
		model.add_edge(1, 2, 1);
		model.add_edge(3, 1, 2);

		let a = model.get_node(1).unwrap();
		let b = model.get_node(2).unwrap();
		let c = model.get_node(3).unwrap();
		assert!(a.has_neighbour(2, 1) && b.has_neighbour(1, 1));
		assert!(c.has_neighbour(1, 2) && a.has_neighbour(3, 2));
		assert_eq!(a.max_order(), 2);
	}

	#[test]
	fn test_add_edge_missing_endpoint_is_noop() {
		let mut model = model_with(&[1, 2]);
		model.add_edge(1, 2, 1);
		let log = record(&mut model);

		model.add_edge(1, 99, 1);
		model.add_edge(99, 2, 1);

		assert_eq!(model.node_count(), 2);
		assert_eq!(model.get_node(1).unwrap().neighbours(1).collect::<Vec<_>>(), vec![2]);
		assert_eq!(model.get_node(2).unwrap().neighbours(1).collect::<Vec<_>>(), vec![1]);
		assert_eq!(model.edges().len(), 1);
		assert!(log.borrow().is_empty());
	}

	#[test]
	fn test_add_edge_dedups_at_model_level() {
		let mut model = model_with(&[1, 2]);
		let log = record(&mut model);

		model.add_edge(1, 2, 1);
		model.add_edge(2, 1, 1);
		model.add_edge(1, 2, 1);

		assert_eq!(model.edges().len(), 1);
		assert_eq!(
			*log.borrow(),
			vec![GraphEvent::EdgeAdded {
				from: 1,
				to: 2,
				order: 1
			}]
		);
	}

	#[test]
	fn test_duplicate_node_is_ignored() {
		let mut model = model_with(&[1]);
		let log = record(&mut model);
		model.add_node(Node::new(1, Position::new(9.0, 9.0, 9.0), NodeSize::default()));

		assert_eq!(model.node_count(), 1);
		assert_eq!(model.get_node(1).unwrap().pos().x, 1.0);
		assert!(log.borrow().is_empty());
	}

	#[test]
	fn test_node_removed_fires_before_erase() {
		let mut model = model_with(&[1, 2]);
		let seen = Rc::new(RefCell::new(None));
		let sink = seen.clone();
		model.subscribe(Rc::new(RefCell::new(
			move |event: &GraphEvent, nodes: &NodeStore| {
				if let GraphEvent::NodeRemoved(id) = event {
					*sink.borrow_mut() = Some(nodes.contains(*id));
				}
			},
		)));

		model.remove_node(1);
		assert_eq!(*seen.borrow(), Some(true));
		assert!(model.get_node(1).is_none());
	}

	#[test]
	fn test_remove_node_drops_incident_edges_and_selection() {
		let mut model = model_with(&[1, 2, 3]);
		model.add_edge(1, 2, 1);
		model.add_edge(2, 3, 1);
		model.select_node(2);
		let log = record(&mut model);

		model.remove_node(2);

		assert_eq!(model.current_selection(), None);
		assert_eq!(model.get_node(1).unwrap().max_order(), 0);
		assert_eq!(model.get_node(3).unwrap().max_order(), 0);
		assert!(model.edges().is_empty());
		assert_eq!(
			*log.borrow(),
			vec![
				GraphEvent::SelectionChanged {
					id: 2,
					selected: false
				},
				GraphEvent::EdgeRemoved {
					from: 1,
					to: 2,
					order: 1
				},
				GraphEvent::EdgeRemoved {
					from: 2,
					to: 3,
					order: 1
				},
				GraphEvent::NodeRemoved(2),
			]
		);
	}

	#[test]
	fn test_remove_all_nodes_empties_store() {
		let mut model = model_with(&[1, 2, 3]);
		let log = record(&mut model);

		model.remove_all_nodes();

		assert_eq!(model.get_nodes().count(), 0);
		assert!(model.get_node(2).is_none());
		let removed = log
			.borrow()
			.iter()
			.filter(|e| matches!(e, GraphEvent::NodeRemoved(_)))
			.count();
		assert_eq!(removed, 3);
	}

	#[test]
	fn test_remove_all_edges_restores_isolation() {
		let mut model = model_with(&[1, 2, 3]);
		model.add_edge(1, 2, 1);
		model.add_edge(1, 3, 2);
		let log = record(&mut model);

		model.remove_all_edges();

		assert!(model.get_nodes().all(|n| n.max_order() == 0));
		assert_eq!(log.borrow().len(), 2);
		assert!(model.edges().is_empty());
	}

	#[test]
	fn test_single_selection() {
		let mut model = model_with(&[1, 2]);
		model.select_node(1);
		let log = record(&mut model);

		model.select_node(2);

		assert_eq!(
			*log.borrow(),
			vec![
				GraphEvent::SelectionChanged {
					id: 1,
					selected: false
				},
				GraphEvent::SelectionChanged {
					id: 2,
					selected: true
				},
			]
		);
		assert_eq!(model.current_selection(), Some(2));
	}

	#[test]
	fn test_reselect_is_noop_and_deselect_always_emits() {
		let mut model = model_with(&[1]);
		model.select_node(1);
		let log = record(&mut model);

		model.select_node(1);
		assert!(log.borrow().is_empty());

		model.deselect_node(1);
		model.deselect_node(1);
		assert_eq!(log.borrow().len(), 2);
		assert_eq!(model.current_selection(), None);
	}

	#[test]
	fn test_deselect_other_id_releases_selection() {
		let mut model = model_with(&[1, 2]);
		model.select_node(1);
		let log = record(&mut model);

		model.deselect_node(2);
		assert_eq!(
			*log.borrow(),
			vec![
				GraphEvent::SelectionChanged {
					id: 1,
					selected: false
				},
				GraphEvent::SelectionChanged {
					id: 2,
					selected: false
				},
			]
		);
		assert_eq!(model.current_selection(), None);
	}

	#[test]
	fn test_unsubscribe_stops_delivery() {
		let mut model = GraphModel::new();
		let log = Rc::new(RefCell::new(0));
		let sink = log.clone();
		let id = model.subscribe(Rc::new(RefCell::new(
			move |_: &GraphEvent, _: &NodeStore| *sink.borrow_mut() += 1,
		)));

		model.add_node(node(1));
		assert!(model.unsubscribe(id));
		model.add_node(node(2));
		assert_eq!(*log.borrow(), 1);
	}
}
