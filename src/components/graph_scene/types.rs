use std::cell::RefCell;
use std::rc::Rc;

use crate::graph::{GraphModel, ModelRequest};

/// The one model every canvas on a page observes and edits.
#[derive(Clone, Default)]
pub struct SharedModel(Rc<RefCell<GraphModel>>);

impl SharedModel {
	pub fn new(model: GraphModel) -> Self {
		Self(Rc::new(RefCell::new(model)))
	}

	pub fn with<T>(&self, f: impl FnOnce(&GraphModel) -> T) -> T {
		f(&self.0.borrow())
	}

	pub fn with_mut<T>(&self, f: impl FnOnce(&mut GraphModel) -> T) -> T {
		f(&mut self.0.borrow_mut())
	}

	/// Forwards view requests. Must not be called while a scene is borrowed,
	/// since the resulting events are delivered to every scene.
	pub fn apply(&self, requests: Vec<ModelRequest>) {
		if requests.is_empty() {
			return;
		}
		self.0.borrow_mut().apply_all(requests);
	}
}
