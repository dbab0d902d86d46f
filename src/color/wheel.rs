//! Hue based color generators
//!
//! Two independent wheels are provided:
//! - [`hsv_to_rgb`]: 16-bit hue circle with saturation and value
//! - [`color_wheel`]: the classic 8-bit three band `Wheel()` from the
//!   NeoPixel examples, without any saturation math

use super::pack;

/// Width of one of the six hue regions on the 16-bit hue circle
pub const HUE_REGION: u32 = 10_923;

/// Convert a 16-bit hue with 8-bit saturation and value into a packed RGB color
///
/// The hue wraps modulo 65536. The white channel is always zero.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]
pub fn hsv_to_rgb(hue: u32, sat: u8, val: u8) -> u32 {
    let hue = hue % 65_536;
    let region = hue / HUE_REGION;
    let f = f64::from(hue % HUE_REGION) / f64::from(HUE_REGION);

    let v = f64::from(val);
    let s = f64::from(sat) / 255.0;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match region {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    // Channels truncate toward zero, like the integer conversion of the packer
    pack(r as u8, g as u8, b as u8, 0)
}

/// Map a position on the 0-255 wheel to a packed RGB color
///
/// Red at both ends, green around 85, blue around 170 (after inversion).
#[allow(clippy::cast_possible_truncation)]
pub const fn color_wheel(pos: u8) -> u32 {
    let mut pos = 255 - pos;
    if pos < 85 {
        return pack(255 - pos * 3, 0, pos * 3, 0);
    }
    if pos < 170 {
        pos -= 85;
        return pack(0, pos * 3, 255 - pos * 3, 0);
    }
    pos -= 170;
    pack(pos * 3, 255 - pos * 3, 0, 0)
}
