//! Gamma correction lookup table
//!
//! Built once per process with exponent 2.6, matching the table the
//! NeoPixel library ships for WS2812 strips.

use std::sync::LazyLock;

use thiserror::Error;

use crate::color::{pack, unpack};

/// Gamma exponent used to build the table
pub const GAMMA: f64 = 2.6;

static GAMMA_TABLE: LazyLock<[u8; 256]> = LazyLock::new(build_gamma_table);

/// Error returned for values that can't be looked up in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("gamma input {0} is outside 0..=255")]
    OutOfRange(i64),
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_lossless
)]
fn build_gamma_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let x = i as f64 / 255.0;
        *entry = libm::floor(libm::pow(x, GAMMA) * 255.0 + 0.5) as u8;
    }
    table
}

/// The precomputed table
pub fn gamma_table() -> &'static [u8; 256] {
    &GAMMA_TABLE
}

/// Gamma-correct a single channel
#[inline]
pub fn gamma8(value: u8) -> u8 {
    GAMMA_TABLE[usize::from(value)]
}

/// Gamma-correct an untyped script value, rejecting anything outside a byte
pub fn try_gamma8(value: i64) -> Result<u8, ColorError> {
    u8::try_from(value)
        .map(gamma8)
        .map_err(|_| ColorError::OutOfRange(value))
}

/// Gamma-correct every channel of a packed color, including white
pub fn gamma32(color: u32) -> u32 {
    let px = unpack(color);
    pack(gamma8(px.r), gamma8(px.g), gamma8(px.b), gamma8(px.w))
}
