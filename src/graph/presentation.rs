//! Visual scales for rendering a compared graph: font sizes, node hues and
//! edge greys.

pub const MIN_FONT_SIZE: u32 = 15;
pub const MAX_FONT_SIZE: u32 = 200;

/// Fractions at or below this get the minimum font
pub const SCALE_STARTS_AT: f64 = 0.01;

// Blue through red. This range stays distinguishable under the common
// forms of dichromacy; recheck with a simulator before changing it.
const MIN_HUE: f64 = 200.0 / 360.0;
const MAX_HUE: f64 = 1.0;
const SATURATION: f64 = 0.7;
const VALUE: f64 = 0.95;

/// Edges at or above this fraction are drawn black, unless the minimum is higher
const SOLID_EDGE_FRACTION: f64 = 0.5;
const FAINTEST_GREY: f64 = 180.0;

/// Font size for a node whose usage is `fraction` of the total
pub fn font_size(fraction: f64) -> u32 {
    let ramp = (fraction - SCALE_STARTS_AT).max(0.0) * f64::from(MAX_FONT_SIZE - MIN_FONT_SIZE)
        / (1.0 - SCALE_STARTS_AT);
    (f64::from(MIN_FONT_SIZE) + ramp).min(f64::from(MAX_FONT_SIZE)) as u32
}

/// Fill colour for a node holding `fraction` of the total, as `#rrggbb`
pub fn node_color(fraction: f64) -> String {
    let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
    let hue = MIN_HUE + (MAX_HUE - MIN_HUE) * fraction;
    let (r, g, b) = hsv_to_rgb(hue, SATURATION, VALUE);
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

/// Grey for an edge carrying `fraction` of its source's cumulative usage.
///
/// Light grey at `min_edge_fraction`, black from `max(min_edge_fraction, 0.5)` up.
pub fn edge_color(fraction: f64, min_edge_fraction: f64) -> String {
    let solid = min_edge_fraction.max(SOLID_EDGE_FRACTION);
    let level = if fraction >= solid {
        0
    } else if solid > min_edge_fraction {
        let scale = FAINTEST_GREY / (solid - min_edge_fraction);
        ((solid - fraction) * scale).clamp(0.0, 255.0) as u8
    } else {
        0
    };
    format!("#{:02x}{:02x}{:02x}", level, level, level)
}

fn channel(value: f64) -> u8 {
    (255.0 * value).clamp(0.0, 255.0) as u8
}

/// HSV to RGB, all components in `[0, 1]`
pub fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> (f64, f64, f64) {
    if saturation == 0.0 {
        return (value, value, value);
    }
    let sector = (hue * 6.0).floor();
    let f = hue * 6.0 - sector;
    let p = value * (1.0 - saturation);
    let q = value * (1.0 - saturation * f);
    let t = value * (1.0 - saturation * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (value, t, p),
        1 => (q, value, p),
        2 => (p, value, t),
        3 => (p, q, value),
        4 => (t, p, value),
        _ => (value, p, q),
    }
}
