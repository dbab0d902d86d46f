//! Simulated addressable LED strip
//!
//! Owns the pixel buffer of one strip. Brightness is a display-time
//! multiplier only: the stored pixels are never scaled, [`Strip::frame`]
//! projects them for the rendering sink.

use core::fmt;
use core::str::FromStr;

use thiserror::Error;

use crate::color::{Color, Rgb, unpack};
use crate::math8::scale_by_brightness;

/// Index of a strip in the per-run registry
pub type StripId = usize;

/// Strip contract violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StripError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("pixel index {index} out of range for strip of {len} pixels")]
    IndexOutOfRange { index: i64, len: usize },
}

/// Channel order the physical strip expects
///
/// Kept as metadata only, the simulator always renders RGB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorOrder {
    Rgb,
    #[default]
    Grb,
    Rgbw,
    Brg,
    Gbr,
    Bgr,
}

impl ColorOrder {
    pub const ALL: [Self; 6] = [
        Self::Rgb,
        Self::Grb,
        Self::Rgbw,
        Self::Brg,
        Self::Gbr,
        Self::Bgr,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rgb => "RGB",
            Self::Grb => "GRB",
            Self::Rgbw => "RGBW",
            Self::Brg => "BRG",
            Self::Gbr => "GBR",
            Self::Bgr => "BGR",
        }
    }

    pub fn parse_from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|order| order.as_str() == s)
    }
}

impl FromStr for ColorOrder {
    type Err = StripError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_from_str(s)
            .ok_or_else(|| StripError::InvalidArgument(format!("unknown color order {s:?}")))
    }
}

impl fmt::Display for ColorOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One simulated strip
#[derive(Debug, Clone)]
pub struct Strip {
    pin: i64,
    color_order: ColorOrder,
    brightness: u8,
    pixels: Vec<Color>,
}

impl Strip {
    /// Create a strip with every pixel black and full brightness
    pub fn new(pixel_count: usize, pin: i64, color_order: ColorOrder) -> Result<Self, StripError> {
        if pixel_count == 0 {
            return Err(StripError::InvalidArgument(
                "pixel count must be positive".into(),
            ));
        }
        Ok(Self {
            pin,
            color_order,
            brightness: 255,
            pixels: vec![Color::default(); pixel_count],
        })
    }

    pub const fn pin(&self) -> i64 {
        self.pin
    }

    pub const fn color_order(&self) -> ColorOrder {
        self.color_order
    }

    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    /// Stored (unscaled) pixels
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    fn slot(&self, index: i64) -> Result<usize, StripError> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.pixels.len())
            .ok_or(StripError::IndexOutOfRange {
                index,
                len: self.pixels.len(),
            })
    }

    pub fn set_pixel_color(&mut self, index: i64, color: Color) -> Result<(), StripError> {
        let slot = self.slot(index)?;
        self.pixels[slot] = color;
        Ok(())
    }

    pub fn pixel_color(&self, index: i64) -> Result<u32, StripError> {
        let slot = self.slot(index)?;
        Ok(self.pixels[slot].packed())
    }

    /// Fill `count` pixels starting at `first` with a packed color
    ///
    /// A zero `count` fills to the end of the strip. The range is checked
    /// before anything is written.
    pub fn fill(&mut self, color: u32, first: i64, count: i64) -> Result<(), StripError> {
        let len = self.pixels.len();
        let start = usize::try_from(first).map_err(|_| StripError::IndexOutOfRange {
            index: first,
            len,
        })?;
        if count < 0 {
            return Err(StripError::InvalidArgument(format!(
                "fill count must not be negative, got {count}"
            )));
        }
        let count = if count == 0 {
            len.saturating_sub(start)
        } else {
            usize::try_from(count).unwrap_or(usize::MAX)
        };
        if count == 0 {
            return Ok(());
        }
        let end = start.saturating_add(count);
        if end > len {
            return Err(StripError::IndexOutOfRange {
                index: i64::try_from(end - 1).unwrap_or(i64::MAX),
                len,
            });
        }

        let color = unpack(color);
        self.pixels[start..end].fill(color);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.pixels.fill(Color::default());
    }

    /// Project the buffer through the brightness multiplier
    pub fn frame(&self) -> Vec<Rgb> {
        let brightness = self.brightness;
        self.pixels
            .iter()
            .map(|px| Rgb {
                r: scale_by_brightness(px.r, brightness),
                g: scale_by_brightness(px.g, brightness),
                b: scale_by_brightness(px.b, brightness),
            })
            .collect()
    }
}
