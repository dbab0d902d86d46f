/// Scale a channel by a brightness level (0-255 = 0.0-1.0)
///
/// Exact `value * brightness / 255`, floored. Full brightness is lossless.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub const fn scale_by_brightness(value: u8, brightness: u8) -> u8 {
    ((value as u16 * brightness as u16) / 255) as u8
}

/// Clamp an integer into a byte
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub const fn clamp8(value: i64) -> u8 {
    if value < 0 {
        0
    } else if value > 255 {
        255
    } else {
        value as u8
    }
}

/// Clamp a float into a byte, truncating toward zero
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp8_f64(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 255.0) as u8
}
