use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use log::debug;
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::scene::{Axes, GraphScene, SceneConfig};
use super::types::SharedModel;
use crate::graph::DetectionEvent;

const LEFT_BUTTON: i16 = 0;
const MIDDLE_BUTTON: i16 = 1;

fn parent_size(canvas: &HtmlCanvasElement, width: Option<f64>, height: Option<f64>) -> (f64, f64) {
	(
		width.unwrap_or_else(|| {
			canvas
				.parent_element()
				.map(|p| p.client_width() as f64)
				.unwrap_or(600.0)
		}),
		height.unwrap_or_else(|| {
			canvas
				.parent_element()
				.map(|p| p.client_height() as f64)
				.unwrap_or(600.0)
		}),
	)
}

fn canvas_point(canvas: &HtmlCanvasElement, ev: &MouseEvent) -> (f64, f64) {
	let rect = canvas.get_bounding_client_rect();
	(
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	)
}

/// One interactive view of the shared model, drawn on a 2D canvas.
///
/// Left drag from node to node adds a direct relation, left click selects,
/// middle drag pans, the wheel zooms and a double click refits the view.
#[component]
pub fn GraphSceneCanvas(
	model: SharedModel,
	#[prop(default = Axes::XY)] axes: Axes,
	#[prop(default = SceneConfig::default())] config: SceneConfig,
	#[prop(into, default = Signal::derive(|| None))] detection: Signal<Option<DetectionEvent>>,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let scene = model.with_mut(|m| GraphScene::attach(m, axes, config));
	debug!("{} view attached", axes.label());

	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let frame = Rc::new(Cell::new(0));
	let (scene_init, animate_init, resize_cb_init, frame_init) =
		(scene.clone(), animate.clone(), resize_cb.clone(), frame.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let window: Window = web_sys::window().unwrap();

		let (w, h) = parent_size(&canvas, width, height);
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let ctx: CanvasRenderingContext2d = canvas
			.get_context("2d")
			.unwrap()
			.unwrap()
			.dyn_into()
			.unwrap();
		scene_init.borrow_mut().fit_in_view(w, h);

		let (scene_resize, canvas_resize) = (scene_init.clone(), canvas.clone());
		*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
			let (nw, nh) = parent_size(&canvas_resize, width, height);
			canvas_resize.set_width(nw as u32);
			canvas_resize.set_height(nh as u32);
			scene_resize.borrow_mut().resize(nw, nh);
		}));
		if let Some(ref cb) = *resize_cb_init.borrow() {
			let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
		}

		let (scene_anim, animate_inner, frame_anim) =
			(scene_init.clone(), animate_init.clone(), frame_init.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			if let Ok(s) = scene_anim.try_borrow() {
				render::render(&s, &ctx);
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				if let Ok(id) = web_sys::window()
					.unwrap()
					.request_animation_frame(cb.as_ref().unchecked_ref())
				{
					frame_anim.set(id);
				}
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			if let Ok(id) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
				frame_init.set(id);
			}
		}
	});

	// detach from the shared model and stop the frame loop on unmount
	let observer = scene.borrow().observer_id();
	let handles = StoredValue::new_local((model.clone(), animate.clone(), resize_cb.clone(), frame));
	on_cleanup(move || {
		handles.try_with_value(|(model, animate, resize_cb, frame)| {
			if let Some(id) = observer {
				model.with_mut(|m| m.unsubscribe(id));
			}
			if let Some(window) = web_sys::window() {
				let _ = window.cancel_animation_frame(frame.get());
				if let Some(cb) = resize_cb.borrow_mut().take() {
					let _ = window
						.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
				}
			}
			animate.borrow_mut().take();
			debug!("{} view detached", axes.label());
		});
	});

	let scene_overlay = scene.clone();
	Effect::new(move |prev: Option<Option<DetectionEvent>>| {
		let current = detection.get();
		let mut s = scene_overlay.borrow_mut();
		if let Some(prev) = prev.flatten() {
			s.hide_detection(&prev);
		}
		if let Some(event) = &current {
			s.show_detection(event);
		}
		current
	});

	let scene_md = scene.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let (x, y) = canvas_point(&canvas, &ev);
		let mut s = scene_md.borrow_mut();
		match ev.button() {
			LEFT_BUTTON => s.press(x, y),
			MIDDLE_BUTTON => {
				ev.prevent_default();
				s.start_pan(x, y);
			}
			_ => {}
		}
	};

	let scene_mm = scene.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let (x, y) = canvas_point(&canvas, &ev);
		let mut s = scene_mm.borrow_mut();
		if s.pan.active {
			s.pan_to(x, y);
		} else if s.rubber_band().is_some() {
			s.drag(x, y);
		} else {
			let cursor = match s.node_at_position(x, y) {
				Some(_) => "pointer",
				None => "crosshair",
			};
			let _ = web_sys::HtmlElement::style(&canvas).set_property("cursor", cursor);
		}
	};

	let (scene_mu, model_mu) = (scene.clone(), model.clone());
	let on_mouseup = move |ev: MouseEvent| {
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let (x, y) = canvas_point(&canvas, &ev);
		match ev.button() {
			LEFT_BUTTON => {
				// scene borrow must end before the model notifies it
				let requests = scene_mu.borrow_mut().release(x, y);
				model_mu.apply(requests);
			}
			MIDDLE_BUTTON => scene_mu.borrow_mut().end_pan(),
			_ => {}
		}
	};

	let scene_ml = scene.clone();
	let on_mouseleave = move |_: MouseEvent| {
		let mut s = scene_ml.borrow_mut();
		s.cancel_gesture();
		s.end_pan();
	};

	let scene_wh = scene.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let canvas: HtmlCanvasElement = canvas_ref.get().unwrap().into();
		let (x, y) = canvas_point(&canvas, &ev);
		scene_wh.borrow_mut().zoom(x, y, ev.delta_y());
	};

	let scene_dc = scene.clone();
	let on_dblclick = move |_: MouseEvent| {
		let mut s = scene_dc.borrow_mut();
		let (w, h) = (s.width, s.height);
		s.fit_in_view(w, h);
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="graph-scene-canvas"
			title=axes.label()
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			on:dblclick=on_dblclick
			style="display: block; cursor: crosshair;"
		/>
	}
}
