mod component;
mod render;
pub mod scene;
mod types;

pub use component::GraphSceneCanvas;
pub use scene::Axes;
pub use types::SharedModel;
