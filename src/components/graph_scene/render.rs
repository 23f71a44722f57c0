use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::scene::{GraphScene, VisualNode};

pub fn render(scene: &GraphScene, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str(&scene.config.background.to_css());
	ctx.fill_rect(0.0, 0.0, scene.width, scene.height);
	ctx.save();
	let _ = ctx.translate(scene.transform.x, scene.transform.y);
	let _ = ctx.scale(scene.transform.k, scene.transform.k);
	draw_edges(scene, ctx);
	draw_nodes(scene, ctx);
	draw_rubber_band(scene, ctx);
	ctx.restore();
}

fn draw_edges(scene: &GraphScene, ctx: &CanvasRenderingContext2d) {
	let k = scene.transform.k;
	ctx.set_stroke_style_str(&scene.config.edge_color.to_css());
	ctx.set_line_width(scene.config.edge_width / k);
	ctx.set_line_cap("round");

	for edge in scene.visual_edges().iter().filter(|e| e.should_draw()) {
		let ((x1, y1), (x2, y2)) = edge.line();
		ctx.begin_path();
		ctx.move_to(x1, y1);
		ctx.line_to(x2, y2);
		ctx.stroke();
	}
}

fn draw_node(node: &VisualNode, outline: &str, k: f64, ctx: &CanvasRenderingContext2d) {
	let (cx, cy) = node.center();
	let (rx, ry) = node.radii();

	ctx.save();
	if let Some(shadow) = &node.shadow {
		// shadow geometry is not affected by the current transform
		ctx.set_shadow_color(&shadow.color.to_css());
		ctx.set_shadow_blur(shadow.blur);
		ctx.set_shadow_offset_x(shadow.offset * k);
		ctx.set_shadow_offset_y(shadow.offset * k);
	}
	ctx.begin_path();
	let _ = ctx.ellipse(cx, cy, rx, ry, 0.0, 0.0, 2.0 * PI);
	ctx.set_fill_style_str(&node.fill.to_css());
	ctx.fill();
	ctx.restore();

	if node.outlined {
		ctx.set_stroke_style_str(outline);
		ctx.set_line_width(1.0 / k);
		ctx.stroke();
	}
}

fn draw_nodes(scene: &GraphScene, ctx: &CanvasRenderingContext2d) {
	let k = scene.transform.k;
	let outline = scene.config.outline.to_css();

	for node in scene.visual_nodes().filter(|n| !n.is_selected()) {
		draw_node(node, &outline, k, ctx);
	}

	// selected node on top of its neighbours
	if let Some(node) = scene.visual_nodes().find(|n| n.is_selected()) {
		draw_node(node, &outline, k, ctx);
	}
}

fn draw_rubber_band(scene: &GraphScene, ctx: &CanvasRenderingContext2d) {
	let Some(band) = scene.rubber_band() else {
		return;
	};
	let k = scene.transform.k;
	let (dash, gap) = (6.0 / k, 4.0 / k);

	ctx.set_stroke_style_str("rgba(255, 255, 255, 0.8)");
	ctx.set_line_width(1.5 / k);
	let _ = ctx.set_line_dash(&js_sys::Array::of2(
		&JsValue::from_f64(dash),
		&JsValue::from_f64(gap),
	));
	ctx.begin_path();
	ctx.move_to(band.start.0, band.start.1);
	ctx.line_to(band.end.0, band.end.1);
	ctx.stroke();
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}
