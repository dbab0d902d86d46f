pub mod capabilities;
pub mod channel;
pub mod clock;
pub mod color;
pub mod config;
pub mod context;
pub mod error;
pub mod gamma;
pub mod harness;
pub mod math8;
pub mod rewriter;
pub mod script;
pub mod strip;

pub use channel::{ButtonId, ClickSender, TrySendError};
pub use clock::ClockMode;
pub use color::{Color, Rgb};
pub use config::SimulatorConfig;
pub use error::{ParseError, SimError};
pub use gamma::ColorError;
pub use harness::{RunOutcome, Simulator};
pub use rewriter::{Rewrite, RewriteAmbiguity, rewrite};
pub use strip::{ColorOrder, Strip, StripError, StripId};
pub use embassy_time::{Duration, Instant};

/// Where a simulated sketch renders to
///
/// Implement this trait to display strips somewhere: a terminal, a window,
/// a test recorder. The simulator is generic over it.
pub trait RenderSink {
    /// Forget everything rendered by the previous run
    fn reset(&mut self);

    /// A strip was constructed by the sketch
    fn strip_created(&mut self, strip: StripId, pin: i64, pixel_count: usize);

    /// Display colors of a strip after `show()`, brightness applied
    fn write(&mut self, strip: StripId, colors: &[Rgb]);

    /// A button was constructed by the sketch
    fn button_created(&mut self, button: ButtonId, label: &str);

    /// A complete line printed on `Serial`
    fn serial(&mut self, _line: &str) {}
}
