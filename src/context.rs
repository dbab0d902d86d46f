//! Per-run state
//!
//! Everything a sketch can touch lives here: strips, buttons, the clock, the
//! random generator and the sink. A new [`RunContext`] is built for every
//! run and dropped with it, so nothing leaks from one run into the next.

use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use embassy_time::Duration;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::RenderSink;
use crate::channel::{ButtonId, ClickChannel};
use crate::clock::SimClock;
use crate::config::SimulatorConfig;
use crate::error::CallError;
use crate::script::Value;
use crate::strip::{ColorOrder, Strip, StripError, StripId};

/// Generation captured by a run
///
/// Starting a new run bumps the shared generation, which makes every token
/// of older runs stale.
#[derive(Debug, Clone)]
pub struct RunToken {
    current: Rc<Cell<u64>>,
    generation: u64,
}

impl RunToken {
    pub(crate) const fn new(current: Rc<Cell<u64>>, generation: u64) -> Self {
        Self {
            current,
            generation,
        }
    }

    pub fn is_current(&self) -> bool {
        self.current.get() == self.generation
    }

    pub fn check(&self) -> Result<(), CallError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(CallError::Superseded)
        }
    }
}

#[derive(Debug)]
struct Button {
    label: String,
    on_click: Option<Value>,
}

pub struct RunContext {
    token: RunToken,
    sink: Rc<RefCell<dyn RenderSink>>,
    clicks: Arc<ClickChannel>,
    clock: SimClock,
    rng: RefCell<StdRng>,
    default_color_order: ColorOrder,
    strips: RefCell<Vec<Strip>>,
    buttons: RefCell<Vec<Button>>,
    serial_line: RefCell<String>,
}

impl RunContext {
    pub(crate) fn new(
        config: &SimulatorConfig,
        token: RunToken,
        sink: Rc<RefCell<dyn RenderSink>>,
        clicks: Arc<ClickChannel>,
    ) -> Self {
        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            token,
            sink,
            clicks,
            clock: SimClock::new(config.clock),
            rng: RefCell::new(rng),
            default_color_order: config.default_color_order,
            strips: RefCell::default(),
            buttons: RefCell::default(),
            serial_line: RefCell::default(),
        }
    }

    pub const fn token(&self) -> &RunToken {
        &self.token
    }

    pub const fn default_color_order(&self) -> ColorOrder {
        self.default_color_order
    }

    /// Register a strip and announce it to the sink
    pub fn create_strip(
        &self,
        pixel_count: i64,
        pin: i64,
        color_order: ColorOrder,
    ) -> Result<StripId, CallError> {
        self.token.check()?;
        let count = usize::try_from(pixel_count).map_err(|_| {
            StripError::InvalidArgument(format!("pixel count must be positive, got {pixel_count}"))
        })?;
        let strip = Strip::new(count, pin, color_order)?;

        let mut strips = self.strips.borrow_mut();
        let id = strips.len();
        strips.push(strip);
        info!("[SIM] Strip {id} created: {count} pixels on pin {pin} ({color_order})");
        self.sink.borrow_mut().strip_created(id, pin, count);
        Ok(id)
    }

    /// Run `f` against a registered strip
    pub fn with_strip<R>(
        &self,
        id: StripId,
        f: impl FnOnce(&mut Strip) -> Result<R, StripError>,
    ) -> Result<R, CallError> {
        self.token.check()?;
        let mut strips = self.strips.borrow_mut();
        let strip = strips
            .get_mut(id)
            .ok_or_else(|| CallError::type_error(format!("unknown strip {id}")))?;
        Ok(f(strip)?)
    }

    /// Push the strip's current frame to the sink
    pub fn show(&self, id: StripId) -> Result<(), CallError> {
        let frame = self.with_strip(id, |strip| Ok(strip.frame()))?;
        self.sink.borrow_mut().write(id, &frame);
        Ok(())
    }

    pub fn create_button(&self, label: &str) -> Result<ButtonId, CallError> {
        self.token.check()?;
        let mut buttons = self.buttons.borrow_mut();
        let id = buttons.len();
        buttons.push(Button {
            label: label.to_owned(),
            on_click: None,
        });
        info!("[SIM] Button {id} created: {label}");
        self.sink.borrow_mut().button_created(id, label);
        Ok(id)
    }

    pub fn set_on_click(&self, id: ButtonId, callback: Value) -> Result<(), CallError> {
        let mut buttons = self.buttons.borrow_mut();
        let button = buttons
            .get_mut(id)
            .ok_or_else(|| CallError::type_error(format!("unknown button {id}")))?;
        button.on_click = Some(callback);
        Ok(())
    }

    /// Next pending click that has a handler, with that handler
    ///
    /// Clicks on unknown buttons or buttons without a handler are dropped.
    pub fn next_click(&self) -> Option<(ButtonId, Value)> {
        while let Some(id) = self.clicks.try_receive() {
            let buttons = self.buttons.borrow();
            match buttons.get(id) {
                Some(Button {
                    on_click: Some(callback),
                    label,
                }) => {
                    info!("[SIM] Button {id} clicked: {label}");
                    return Some((id, callback.clone()));
                }
                _ => info!("[SIM] Click on button {id} ignored"),
            }
        }
        None
    }

    /// Append to the current serial line
    pub fn serial_print(&self, text: &str) -> Result<(), CallError> {
        self.token.check()?;
        self.serial_line.borrow_mut().push_str(text);
        Ok(())
    }

    /// Terminate the current serial line and emit it
    pub fn serial_println(&self, text: &str) -> Result<(), CallError> {
        self.token.check()?;
        let line = {
            let mut pending = self.serial_line.borrow_mut();
            pending.push_str(text);
            core::mem::take(&mut *pending)
        };
        info!("[Serial] {line}");
        self.sink.borrow_mut().serial(&line);
        Ok(())
    }

    pub fn millis(&self) -> u64 {
        self.clock.millis()
    }

    pub fn micros(&self) -> u64 {
        self.clock.micros()
    }

    /// Suspend for `duration`, failing if the run was superseded meanwhile
    pub async fn delay(&self, duration: Duration) -> Result<(), CallError> {
        self.clock.delay(duration).await;
        self.token.check()
    }

    /// Uniform integer in `[min, max)`; `min` when the range is empty
    pub fn random(&self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        self.rng.borrow_mut().gen_range(min..max)
    }

    pub fn random_seed(&self, seed: u64) {
        *self.rng.borrow_mut() = StdRng::seed_from_u64(seed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rgb;

    struct NullSink;

    impl RenderSink for NullSink {
        fn reset(&mut self) {}
        fn strip_created(&mut self, _: StripId, _: i64, _: usize) {}
        fn write(&mut self, _: StripId, _: &[Rgb]) {}
        fn button_created(&mut self, _: ButtonId, _: &str) {}
    }

    fn context(generation: &Rc<Cell<u64>>) -> RunContext {
        RunContext::new(
            &SimulatorConfig::deterministic(1),
            RunToken::new(generation.clone(), generation.get()),
            Rc::new(RefCell::new(NullSink)),
            Arc::new(ClickChannel::new()),
        )
    }

    #[test]
    fn test_stale_token_rejects_strip_access() {
        let generation = Rc::new(Cell::new(1));
        let ctx = context(&generation);
        let id = ctx.create_strip(4, 6, ColorOrder::Grb).unwrap();
        generation.set(2);
        assert_eq!(ctx.show(id), Err(CallError::Superseded));
    }

    #[test]
    fn test_negative_pixel_count() {
        let generation = Rc::new(Cell::new(0));
        let ctx = context(&generation);
        assert!(matches!(
            ctx.create_strip(-3, 6, ColorOrder::Grb),
            Err(CallError::Strip(StripError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn test_random_is_seeded() {
        let generation = Rc::new(Cell::new(0));
        let first: Vec<i64> = (0..8).map(|_| context(&generation).random(0, 100)).collect();
        let second: Vec<i64> = (0..8).map(|_| context(&generation).random(0, 100)).collect();
        assert_eq!(first, second);
        assert_eq!(context(&generation).random(5, 5), 5);
    }
}
