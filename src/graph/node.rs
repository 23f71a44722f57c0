//! Sensor element nodes and their per-order neighbourhood table.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Globally unique node identity, assigned by whoever produced the node list.
pub type NodeId = i64;

/// Distance in the neighbourhood graph. Order 1 is a direct neighbour.
pub type Order = u32;

/// Position of a sensor element in detector space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
	#[allow(missing_docs)]
	pub x: f64,
	#[allow(missing_docs)]
	pub y: f64,
	#[allow(missing_docs)]
	pub z: f64,
}

impl Position {
	#[allow(missing_docs)]
	pub fn new(x: f64, y: f64, z: f64) -> Self {
		Self { x, y, z }
	}
}

/// Render size of a node in scene units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeSize {
	/// Extent along the first projected axis.
	pub x: f64,
	/// Extent along the second projected axis.
	pub y: f64,
}

impl Default for NodeSize {
	fn default() -> Self {
		Self { x: 1.0, y: 1.0 }
	}
}

/// A sensor element together with its neighbour ids, grouped by order.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
	id: NodeId,
	pos: Position,
	size: NodeSize,
	neighbours: BTreeMap<Order, BTreeSet<NodeId>>,
}

impl Node {
	/// A node with no neighbours yet.
	pub fn new(id: NodeId, pos: Position, size: NodeSize) -> Self {
		Self {
			id,
			pos,
			size,
			neighbours: BTreeMap::new(),
		}
	}

	#[allow(missing_docs)]
	pub fn id(&self) -> NodeId {
		self.id
	}

	#[allow(missing_docs)]
	pub fn pos(&self) -> Position {
		self.pos
	}

	#[allow(missing_docs)]
	pub fn size(&self) -> NodeSize {
		self.size
	}

	/// Records `id` as a neighbour at `order`. Returns false if it was already there.
	pub fn add_neighbour(&mut self, id: NodeId, order: Order) -> bool {
		self.neighbours.entry(order).or_default().insert(id)
	}

	/// Drops `id` from every order.
	pub fn remove_neighbour(&mut self, id: NodeId) {
		for set in self.neighbours.values_mut() {
			set.remove(&id);
		}
		self.neighbours.retain(|_, set| !set.is_empty());
	}

	/// Drops `id` from a single order, leaving other orders untouched.
	pub fn remove_neighbour_at(&mut self, id: NodeId, order: Order) -> bool {
		let Some(set) = self.neighbours.get_mut(&order) else {
			return false;
		};
		let removed = set.remove(&id);
		if set.is_empty() {
			self.neighbours.remove(&order);
		}
		removed
	}

	/// Neighbour ids at exactly `order`, ascending.
	pub fn neighbours(&self, order: Order) -> impl Iterator<Item = NodeId> + '_ {
		self.neighbours
			.get(&order)
			.into_iter()
			.flat_map(|set| set.iter().copied())
	}

	/// Whether `id` is a neighbour at exactly `order`.
	pub fn has_neighbour(&self, id: NodeId, order: Order) -> bool {
		self.neighbours
			.get(&order)
			.is_some_and(|set| set.contains(&id))
	}

	/// Highest order with at least one neighbour, 0 when isolated.
	pub fn max_order(&self) -> Order {
		self.neighbours.keys().next_back().copied().unwrap_or(0)
	}

	/// Snapshot of id, position and size.
	pub fn geometry(&self) -> NodeGeometry {
		NodeGeometry {
			id: self.id,
			pos: self.pos,
			size: self.size,
		}
	}
}

/// Copy of a node's geometry, handed to relation builders so the model keeps
/// ownership of the nodes while edges are being added.
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
pub struct NodeGeometry {
	pub id: NodeId,
	pub pos: Position,
	pub size: NodeSize,
}
