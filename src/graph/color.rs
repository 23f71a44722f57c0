//! Colors and the concentric neighbour-order palette.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::node::Order;

/// Golden-ratio conjugate; stepping a hue by it spreads successive colors evenly.
pub const GOLDEN_RATIO_CONJUGATE: f64 = 0.618033988749895;

/// 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

#[allow(missing_docs)]
impl Color {
	pub const WHITE: Color = Color::rgb(255, 255, 255);
	pub const GREEN: Color = Color::rgb(0, 255, 0);
	pub const YELLOW: Color = Color::rgb(255, 255, 0);

	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b }
	}

	/// Builds a color from hue, saturation and lightness, all in `0.0..=1.0`.
	pub fn from_hsl(h: f64, s: f64, l: f64) -> Self {
		let (h, s, l) = (h.rem_euclid(1.0), s.clamp(0.0, 1.0), l.clamp(0.0, 1.0));
		if s == 0.0 {
			let v = to_channel(l);
			return Self::rgb(v, v, v);
		}
		let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
		let p = 2.0 * l - q;
		Self::rgb(
			to_channel(hue_to_rgb(p, q, h + 1.0 / 3.0)),
			to_channel(hue_to_rgb(p, q, h)),
			to_channel(hue_to_rgb(p, q, h - 1.0 / 3.0)),
		)
	}

	/// Hue, saturation and lightness, all in `0.0..=1.0`.
	pub fn to_hsl(self) -> (f64, f64, f64) {
		let (r, g, b) = (
			self.r as f64 / 255.0,
			self.g as f64 / 255.0,
			self.b as f64 / 255.0,
		);
		let max = r.max(g).max(b);
		let min = r.min(g).min(b);
		let l = (max + min) / 2.0;
		let d = max - min;
		if d == 0.0 {
			return (0.0, 0.0, l);
		}
		let s = if l > 0.5 {
			d / (2.0 - max - min)
		} else {
			d / (max + min)
		};
		let h = if max == r {
			((g - b) / d).rem_euclid(6.0)
		} else if max == g {
			(b - r) / d + 2.0
		} else {
			(r - g) / d + 4.0
		};
		(h / 6.0, s, l)
	}

	/// Darker variant with the HSV value divided by `factor / 100`.
	/// `darker(150)` yields two thirds of the brightness.
	pub fn darker(self, factor: u32) -> Self {
		if factor <= 100 {
			return self;
		}
		let k = 100.0 / factor as f64;
		let scale = |c: u8| (c as f64 * k).round() as u8;
		Self::rgb(scale(self.r), scale(self.g), scale(self.b))
	}

	pub fn to_css(self) -> String {
		self.to_string()
	}
}

impl fmt::Display for Color {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
	}
}

fn to_channel(v: f64) -> u8 {
	(v * 255.0).round().clamp(0.0, 255.0) as u8
}

fn hue_to_rgb(p: f64, q: f64, t: f64) -> f64 {
	let t = t.rem_euclid(1.0);
	if t < 1.0 / 6.0 {
		p + (q - p) * 6.0 * t
	} else if t < 0.5 {
		q
	} else if t < 2.0 / 3.0 {
		p + (q - p) * (2.0 / 3.0 - t) * 6.0
	} else {
		p
	}
}

/// Advances `hue` by the golden-ratio conjugate `steps` times, wrapping at 1.0.
pub fn rotate_hue(mut hue: f64, steps: u32) -> f64 {
	for _ in 0..steps {
		hue = (hue + GOLDEN_RATIO_CONJUGATE) % 1.0;
	}
	hue
}

/// How a neighbour at a given order is drawn while its source node is selected.
#[derive(Clone, Copy, Debug, PartialEq)]
#[allow(missing_docs)]
pub struct OrderStyle {
	pub hue: f64,
	pub fill: Color,
	pub shadow: Color,
	pub scale: f64,
}

/// Style for neighbours at `order >= 2`: the base hue rotated `order` times,
/// with the base saturation and lightness kept.
pub fn order_style(base: Color, order: Order, scale: f64, shadow_factor: u32) -> OrderStyle {
	let (h, s, l) = base.to_hsl();
	let hue = rotate_hue(h, order);
	let fill = Color::from_hsl(hue, s, l);
	OrderStyle {
		hue,
		fill,
		shadow: fill.darker(shadow_factor),
		scale,
	}
}
