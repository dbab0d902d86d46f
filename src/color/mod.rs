mod packed;
mod wheel;

use smart_leds::RGB8;

pub use packed::{BLACK, Color, pack, unpack};
pub use wheel::{HUE_REGION, color_wheel, hsv_to_rgb};

/// Display color handed to the rendering sink
pub type Rgb = RGB8;
