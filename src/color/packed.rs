//! Packed 32-bit RGBW colors
//!
//! The canonical packed layout is `w << 24 | r << 16 | g << 8 | b`,
//! the same layout `Adafruit_NeoPixel::Color` produces.

/// Packed black
pub const BLACK: u32 = 0;

/// A single pixel with four 8-bit channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, w: 0 }
    }

    /// Pack the channels into a single `u32`
    pub const fn packed(self) -> u32 {
        pack(self.r, self.g, self.b, self.w)
    }
}

impl From<u32> for Color {
    fn from(value: u32) -> Self {
        unpack(value)
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        color.packed()
    }
}

/// Pack four channels into `w << 24 | r << 16 | g << 8 | b`
#[inline]
pub const fn pack(r: u8, g: u8, b: u8, w: u8) -> u32 {
    ((w as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
}

/// Split a packed color back into its channels
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub const fn unpack(color: u32) -> Color {
    Color {
        w: (color >> 24) as u8,
        r: (color >> 16) as u8,
        g: (color >> 8) as u8,
        b: color as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        assert_eq!(pack(0x12, 0x34, 0x56, 0x78), 0x7812_3456);
        assert_eq!(pack(255, 255, 255, 0), 0x00FF_FFFF);
    }

    #[test]
    fn test_unpack_takes_low_32_bits() {
        assert_eq!(unpack(0x7812_3456), Color::new(0x12, 0x34, 0x56, 0x78));
        assert_eq!(unpack(u32::MAX), Color::new(255, 255, 255, 255));
    }
}
