use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::graph::{
	Color, DetectionEvent, Edge, GraphEvent, GraphModel, GraphObserver, ModelRequest, Node, NodeId,
	NodeStore, ObserverId, Position, order_style,
};

/// Press and release closer than this (in screen pixels) count as a click.
pub const CLICK_SLOP: f64 = 3.0;

/// Which pair of detector axes a scene projects onto.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axes {
	#[default]
	XY,
	XZ,
}

impl Axes {
	pub fn project(self, pos: Position) -> (f64, f64) {
		match self {
			Axes::XY => (pos.x, pos.y),
			Axes::XZ => (pos.z, pos.x),
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			Axes::XY => "XY",
			Axes::XZ => "XZ",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
	pub background: Color,
	pub default_fill: Color,
	pub outline: Color,
	pub selected_fill: Color,
	pub direct_fill: Color,
	/// Hue origin for neighbours of order two and above.
	pub highlight_base: Color,
	pub highlight_scale: f64,
	pub shadow_factor: u32,
	pub shadow_blur: f64,
	pub shadow_offset: f64,
	pub trajectory_scale: f64,
	pub edge_color: Color,
	pub edge_width: f64,
	/// Draw order-1 edges even when nothing is selected.
	pub show_all_edges: bool,
	pub min_zoom: f64,
	pub max_zoom: f64,
}

impl Default for SceneConfig {
	fn default() -> Self {
		Self {
			background: Color::rgb(0x1a, 0x1a, 0x2e),
			default_fill: Color::WHITE,
			outline: Color::rgb(0, 0, 0),
			selected_fill: Color::GREEN,
			direct_fill: Color::YELLOW,
			highlight_base: Color::GREEN,
			highlight_scale: 1.15,
			shadow_factor: 150,
			shadow_blur: 10.0,
			shadow_offset: 0.15,
			trajectory_scale: 1.5,
			edge_color: Color::rgb(100, 180, 255),
			edge_width: 1.0,
			show_all_edges: false,
			min_zoom: 0.8,
			max_zoom: 40.0,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
	pub color: Color,
	pub blur: f64,
	pub offset: f64,
}

/// View-local mirror of one model node.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualNode {
	pub id: NodeId,
	/// Top-left corner of the unscaled ellipse, in scene units.
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
	pub fill: Color,
	pub outlined: bool,
	pub shadow: Option<Shadow>,
	pub scale: f64,
	selected: bool,
}

impl VisualNode {
	fn new(node: &Node, axes: Axes, fill: Color) -> Self {
		let (x, y) = axes.project(node.pos());
		let size = node.size();
		Self {
			id: node.id(),
			x,
			y,
			width: size.x,
			height: size.y,
			fill,
			outlined: true,
			shadow: None,
			scale: 1.0,
			selected: false,
		}
	}

	pub fn center(&self) -> (f64, f64) {
		(self.x + self.width / 2.0, self.y + self.height / 2.0)
	}

	/// Semi-axes after scaling. Scaling keeps the center fixed.
	pub fn radii(&self) -> (f64, f64) {
		(self.width * self.scale / 2.0, self.height * self.scale / 2.0)
	}

	pub fn contains(&self, px: f64, py: f64) -> bool {
		let (cx, cy) = self.center();
		let (rx, ry) = self.radii();
		if rx <= 0.0 || ry <= 0.0 {
			return false;
		}
		let (dx, dy) = ((px - cx) / rx, (py - cy) / ry);
		dx * dx + dy * dy <= 1.0
	}

	/// Extent of the ellipse from its center towards `angle`.
	fn reach(&self, angle: f64) -> f64 {
		let (a, b) = self.radii();
		let (c, s) = (angle.cos(), angle.sin());
		let denom = ((b * c).powi(2) + (a * s).powi(2)).sqrt();
		if denom == 0.0 { 0.0 } else { a * b / denom }
	}

	/// Whether the two ellipses touch along the line joining their centers.
	pub fn overlaps(&self, other: &VisualNode) -> bool {
		let ((x1, y1), (x2, y2)) = (self.center(), other.center());
		let (dx, dy) = (x2 - x1, y2 - y1);
		let dist = (dx * dx + dy * dy).sqrt();
		let angle = dy.atan2(dx);
		dist <= self.reach(angle) + other.reach(angle)
	}

	pub fn is_selected(&self) -> bool {
		self.selected
	}

	/// Toggles the selection flag from the view side. A change is returned as
	/// the request the owner must forward to the model.
	pub fn set_selected(&mut self, selected: bool) -> Option<ModelRequest> {
		if self.selected == selected {
			return None;
		}
		self.selected = selected;
		Some(if selected {
			ModelRequest::Select(self.id)
		} else {
			ModelRequest::Deselect(self.id)
		})
	}

	fn restore(&mut self, fill: Color) {
		self.fill = fill;
		self.outlined = true;
		self.shadow = None;
		self.scale = 1.0;
	}
}

/// View-local mirror of one order-1 relation.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualEdge {
	pub from: NodeId,
	pub to: NodeId,
	pub visible: bool,
	line: ((f64, f64), (f64, f64)),
	degenerate: bool,
}

impl VisualEdge {
	fn new(from: &VisualNode, to: &VisualNode, visible: bool) -> Self {
		let mut edge = Self {
			from: from.id,
			to: to.id,
			visible,
			line: ((0.0, 0.0), (0.0, 0.0)),
			degenerate: false,
		};
		edge.update_position(from, to);
		edge
	}

	pub fn update_position(&mut self, from: &VisualNode, to: &VisualNode) {
		self.line = (from.center(), to.center());
		self.degenerate = from.overlaps(to);
	}

	pub fn line(&self) -> ((f64, f64), (f64, f64)) {
		self.line
	}

	pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
		(self.from == a && self.to == b) || (self.from == b && self.to == a)
	}

	pub fn touches(&self, id: NodeId) -> bool {
		self.from == id || self.to == id
	}

	/// Visible and not swallowed by overlapping endpoints.
	pub fn should_draw(&self) -> bool {
		self.visible && !self.degenerate
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RubberBand {
	pub start: (f64, f64),
	pub end: (f64, f64),
	screen_start: (f64, f64),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

impl Default for ViewTransform {
	fn default() -> Self {
		Self {
			x: 0.0,
			y: 0.0,
			k: 1.0,
		}
	}
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

/// One interactive view over a [`GraphModel`].
pub struct GraphScene {
	pub axes: Axes,
	pub config: SceneConfig,
	pub transform: ViewTransform,
	pub pan: PanState,
	pub width: f64,
	pub height: f64,
	nodes: BTreeMap<NodeId, VisualNode>,
	edges: Vec<VisualEdge>,
	rubber_band: Option<RubberBand>,
	current_selection: Option<NodeId>,
	highlighted: BTreeSet<NodeId>,
	fit_k: f64,
	observer: Option<ObserverId>,
}

impl GraphScene {
	pub fn new(axes: Axes, config: SceneConfig) -> Self {
		Self {
			axes,
			config,
			transform: ViewTransform::default(),
			pan: PanState::default(),
			width: 0.0,
			height: 0.0,
			nodes: BTreeMap::new(),
			edges: Vec::new(),
			rubber_band: None,
			current_selection: None,
			highlighted: BTreeSet::new(),
			fit_k: 1.0,
			observer: None,
		}
	}

	/// Creates a scene mirroring the model's current content and subscribes it
	/// to further changes.
	pub fn attach(model: &mut GraphModel, axes: Axes, config: SceneConfig) -> Rc<RefCell<Self>> {
		let mut scene = Self::new(axes, config);
		scene.populate(model.nodes(), model.edges(), model.current_selection());
		let scene = Rc::new(RefCell::new(scene));
		let id = model.subscribe(scene.clone());
		scene.borrow_mut().observer = Some(id);
		scene
	}

	/// Subscription to hand back to [`GraphModel::unsubscribe`] when the view goes away.
	pub fn observer_id(&self) -> Option<ObserverId> {
		self.observer
	}

	fn populate(&mut self, nodes: &NodeStore, edges: &[Edge], selection: Option<NodeId>) {
		for node in nodes.iter() {
			self.create_visual_node(node);
		}
		for edge in edges {
			self.create_visual_edge(edge.from, edge.to, edge.order);
		}
		if let Some(id) = selection {
			self.on_selected(id, nodes);
		}
	}

	pub fn visual_nodes(&self) -> impl Iterator<Item = &VisualNode> + '_ {
		self.nodes.values()
	}

	pub fn visual_node(&self, id: NodeId) -> Option<&VisualNode> {
		self.nodes.get(&id)
	}

	pub fn visual_edges(&self) -> &[VisualEdge] {
		&self.edges
	}

	pub fn rubber_band(&self) -> Option<&RubberBand> {
		self.rubber_band.as_ref()
	}

	pub fn current_selection(&self) -> Option<NodeId> {
		self.current_selection
	}

	pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
		self.edges.iter().any(|e| e.connects(a, b))
	}

	fn create_visual_node(&mut self, node: &Node) {
		let visual = VisualNode::new(node, self.axes, self.config.default_fill);
		self.nodes.insert(node.id(), visual);
	}

	fn remove_visual_node(&mut self, id: NodeId, nodes: &NodeStore) {
		if self.current_selection == Some(id) {
			self.hide_neighbours(id, nodes);
			self.current_selection = None;
		}
		self.edges.retain(|e| !e.touches(id));
		self.highlighted.remove(&id);
		self.nodes.remove(&id);
	}

	fn create_visual_edge(&mut self, from: NodeId, to: NodeId, order: u32) {
		if order != 1 || self.has_edge(from, to) {
			return;
		}
		let (Some(a), Some(b)) = (self.nodes.get(&from), self.nodes.get(&to)) else {
			return;
		};
		self.edges
			.push(VisualEdge::new(a, b, self.config.show_all_edges));
	}

	fn remove_visual_edge(&mut self, from: NodeId, to: NodeId) {
		if let Some(i) = self.edges.iter().position(|e| e.connects(from, to)) {
			self.edges.remove(i);
		}
	}

	fn on_selected(&mut self, id: NodeId, nodes: &NodeStore) {
		if let Some(prev) = self.current_selection.filter(|&prev| prev != id) {
			self.on_deselected(prev, nodes);
		}
		let fill = self.config.selected_fill;
		if let Some(v) = self.nodes.get_mut(&id) {
			v.selected = true;
			v.fill = fill;
			self.current_selection = Some(id);
			self.show_neighbours(id, nodes);
		}
	}

	fn on_deselected(&mut self, id: NodeId, nodes: &NodeStore) {
		if self.current_selection != Some(id) {
			return;
		}
		let fill = self.config.default_fill;
		if let Some(v) = self.nodes.get_mut(&id) {
			v.selected = false;
			v.fill = fill;
		}
		self.hide_neighbours(id, nodes);
		self.current_selection = None;
	}

	/// Re-derives the highlight after the selected node's neighbourhood changed.
	fn refresh_selection(&mut self, from: NodeId, to: NodeId, nodes: &NodeStore) {
		let Some(sel) = self.current_selection else {
			return;
		};
		if sel != from && sel != to {
			return;
		}
		self.hide_neighbours(sel, nodes);
		self.show_neighbours(sel, nodes);
	}

	fn show_neighbours(&mut self, id: NodeId, nodes: &NodeStore) {
		let Some(node) = nodes.get(id) else {
			return;
		};

		for n in node.neighbours(1) {
			for edge in self.edges.iter_mut().filter(|e| e.connects(id, n)) {
				edge.visible = true;
			}
			if let Some(v) = self.nodes.get_mut(&n) {
				v.fill = self.config.direct_fill;
				self.highlighted.insert(n);
			}
		}

		for order in 2..=node.max_order() {
			let style = order_style(
				self.config.highlight_base,
				order,
				self.config.highlight_scale,
				self.config.shadow_factor,
			);
			for n in node.neighbours(order) {
				if let Some(v) = self.nodes.get_mut(&n) {
					v.fill = style.fill;
					v.outlined = false;
					v.shadow = Some(Shadow {
						color: style.shadow,
						blur: self.config.shadow_blur,
						offset: self.config.shadow_offset,
					});
					v.scale = style.scale;
					self.highlighted.insert(n);
				}
			}
		}
		self.refresh_edges();
	}

	fn hide_neighbours(&mut self, id: NodeId, nodes: &NodeStore) {
		let fill = self.config.default_fill;
		let mut touched = std::mem::take(&mut self.highlighted);
		if let Some(node) = nodes.get(id) {
			for order in 1..=node.max_order() {
				touched.extend(node.neighbours(order));
			}
		}
		for n in touched {
			if let Some(v) = self.nodes.get_mut(&n) {
				v.restore(fill);
			}
		}
		let visible = self.config.show_all_edges;
		for edge in self.edges.iter_mut().filter(|e| e.touches(id)) {
			edge.visible = visible;
		}
		self.refresh_edges();
	}

	fn refresh_edges(&mut self) {
		let nodes = &self.nodes;
		for edge in &mut self.edges {
			if let (Some(a), Some(b)) = (nodes.get(&edge.from), nodes.get(&edge.to)) {
				edge.update_position(a, b);
			}
		}
	}

	pub fn show_detection(&mut self, event: &DetectionEvent) {
		let scale = self.config.trajectory_scale;
		for trajectory in &event.trajectories {
			self.draw_trajectory(&trajectory.hits, trajectory.color, scale);
		}
	}

	pub fn hide_detection(&mut self, event: &DetectionEvent) {
		let fill = self.config.default_fill;
		for trajectory in &event.trajectories {
			self.draw_trajectory(&trajectory.hits, fill, 1.0);
		}
	}

	pub fn draw_trajectory(&mut self, hits: &[NodeId], color: Color, scale: f64) {
		for id in hits {
			if let Some(v) = self.nodes.get_mut(id) {
				v.fill = color;
				v.scale = scale;
			}
		}
		self.refresh_edges();
	}

	pub fn screen_to_scene(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	/// Topmost node under a scene-space point.
	pub fn node_at(&self, x: f64, y: f64) -> Option<NodeId> {
		self.nodes
			.values()
			.rev()
			.find(|v| v.contains(x, y))
			.map(|v| v.id)
	}

	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<NodeId> {
		let (x, y) = self.screen_to_scene(sx, sy);
		self.node_at(x, y)
	}

	/// Bounding box of all unscaled nodes: `(min_x, min_y, max_x, max_y)`.
	pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
		self.nodes.values().fold(None, |acc, v| {
			let (x0, y0, x1, y1) = (v.x, v.y, v.x + v.width, v.y + v.height);
			Some(match acc {
				None => (x0, y0, x1, y1),
				Some((a, b, c, d)) => (a.min(x0), b.min(y0), c.max(x1), d.max(y1)),
			})
		})
	}

	/// Resets the transform so every node fits the viewport, keeping aspect ratio.
	pub fn fit_in_view(&mut self, width: f64, height: f64) {
		self.resize(width, height);
		let Some((x0, y0, x1, y1)) = self.bounds() else {
			self.transform = ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			};
			self.fit_k = 1.0;
			return;
		};
		let (bw, bh) = ((x1 - x0).max(f64::EPSILON), (y1 - y0).max(f64::EPSILON));
		let k = (width / bw).min(height / bh) * 0.9;
		// zero-sized viewport
		let k = if k.is_finite() && k > 0.0 { k } else { 1.0 };
		self.fit_k = k;
		self.transform = ViewTransform {
			x: width / 2.0 - (x0 + bw / 2.0) * k,
			y: height / 2.0 - (y0 + bh / 2.0) * k,
			k,
		};
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.width = width;
		self.height = height;
	}

	/// Zooms around the cursor, limited relative to the fitted scale.
	pub fn zoom(&mut self, sx: f64, sy: f64, delta_y: f64) {
		let factor = if delta_y > 0.0 { 0.85 } else { 1.15 };
		let (lo, hi) = (
			self.config.min_zoom.min(self.config.max_zoom),
			self.config.min_zoom.max(self.config.max_zoom),
		);
		let new_k = (self.transform.k * factor)
			.min(self.fit_k * hi)
			.max(self.fit_k * lo);
		if !new_k.is_finite() || new_k <= 0.0 {
			return;
		}
		let ratio = new_k / self.transform.k;
		self.transform.x = sx - (sx - self.transform.x) * ratio;
		self.transform.y = sy - (sy - self.transform.y) * ratio;
		self.transform.k = new_k;
	}

	pub fn start_pan(&mut self, sx: f64, sy: f64) {
		self.pan = PanState {
			active: true,
			start_x: sx,
			start_y: sy,
			transform_start_x: self.transform.x,
			transform_start_y: self.transform.y,
		};
	}

	pub fn pan_to(&mut self, sx: f64, sy: f64) {
		if self.pan.active {
			self.transform.x = self.pan.transform_start_x + (sx - self.pan.start_x);
			self.transform.y = self.pan.transform_start_y + (sy - self.pan.start_y);
		}
	}

	pub fn end_pan(&mut self) {
		self.pan.active = false;
	}

	/// Starts a rubber-band line at the cursor.
	pub fn press(&mut self, sx: f64, sy: f64) {
		let p = self.screen_to_scene(sx, sy);
		self.rubber_band = Some(RubberBand {
			start: p,
			end: p,
			screen_start: (sx, sy),
		});
	}

	pub fn drag(&mut self, sx: f64, sy: f64) {
		let p = self.screen_to_scene(sx, sy);
		if let Some(band) = &mut self.rubber_band {
			band.end = p;
		}
	}

	pub fn cancel_gesture(&mut self) {
		self.rubber_band = None;
	}

	/// Ends the gesture and returns what the model should do about it.
	///
	/// Dragging between two distinct nodes requests an order-1 edge unless this
	/// view already shows one between them. Releasing on the node the gesture
	/// started on selects it; a click on empty space clears the selection.
	pub fn release(&mut self, sx: f64, sy: f64) -> Vec<ModelRequest> {
		let Some(mut band) = self.rubber_band.take() else {
			return Vec::new();
		};
		band.end = self.screen_to_scene(sx, sy);

		let start = self.node_at(band.start.0, band.start.1);
		let end = self.node_at(band.end.0, band.end.1);
		match (start, end) {
			(Some(from), Some(to)) if from != to => {
				if self.has_edge(from, to) {
					debug!("edge {} - {} already exists", from, to);
					Vec::new()
				} else {
					vec![ModelRequest::AddEdge { from, to, order: 1 }]
				}
			}
			(Some(id), Some(_)) => self
				.nodes
				.get_mut(&id)
				.and_then(|v| v.set_selected(true))
				.into_iter()
				.collect(),
			(None, None) => {
				let (dx, dy) = (sx - band.screen_start.0, sy - band.screen_start.1);
				if (dx * dx + dy * dy).sqrt() > CLICK_SLOP {
					return Vec::new();
				}
				self.current_selection
					.and_then(|id| self.nodes.get_mut(&id))
					.and_then(|v| v.set_selected(false))
					.into_iter()
					.collect()
			}
			_ => Vec::new(),
		}
	}
}

impl GraphObserver for GraphScene {
	fn on_event(&mut self, event: &GraphEvent, nodes: &NodeStore) {
		match *event {
			GraphEvent::NodeAdded(id) => {
				if let Some(node) = nodes.get(id) {
					self.create_visual_node(node);
				}
			}
			GraphEvent::NodeRemoved(id) => self.remove_visual_node(id, nodes),
			GraphEvent::EdgeAdded { from, to, order } => {
				self.create_visual_edge(from, to, order);
				self.refresh_selection(from, to, nodes);
			}
			GraphEvent::EdgeRemoved { from, to, order } => {
				if order == 1 {
					self.remove_visual_edge(from, to);
				}
				self.refresh_selection(from, to, nodes);
			}
			GraphEvent::SelectionChanged { id, selected: true } => self.on_selected(id, nodes),
			GraphEvent::SelectionChanged {
				id,
				selected: false,
			} => self.on_deselected(id, nodes),
		}
	}
}
