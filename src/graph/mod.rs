//! Neighbourhood graph core: nodes, the authoritative model, bulk building,
//! export and detection overlays. Nothing in here touches the browser.

pub mod builder;
pub mod color;
pub mod detection;
pub mod model;
pub mod node;
pub mod writer;

pub use builder::{BuildParams, BuildReport, GraphBuilder, RelationBuilder};
pub use color::{Color, OrderStyle, order_style};
pub use detection::{DetectionError, DetectionEvent, Trajectory};
pub use model::{Edge, GraphEvent, GraphModel, GraphObserver, ModelRequest, NodeStore, ObserverId};
pub use node::{Node, NodeGeometry, NodeId, NodeSize, Order, Position};
pub use writer::ExportError;
