//! Simulated clock behind `delay()`, `millis()` and `micros()`.
//!
//! Two modes:
//! - `Virtual`: `delay` advances a simulated clock and yields once to the
//!   executor. Deterministic and instant, used by tests and fast previews.
//! - `Realtime`: `delay` sleeps on an `embassy_time::Timer`, time is measured
//!   from the start of the run.
//!
//! Either way every `delay` is a suspension point, so the host executor
//! gets control back even though `loop()` never returns for good.

use core::cell::Cell;

use embassy_futures::yield_now;
use embassy_time::{Duration, Instant, Timer};

/// How the clock advances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ClockMode {
    /// Simulated time, advanced only by delays
    Virtual,
    /// Wall-clock time
    #[default]
    Realtime,
}

#[derive(Debug)]
pub struct SimClock {
    mode: ClockMode,
    origin: Instant,
    elapsed: Cell<Duration>,
}

impl SimClock {
    pub fn new(mode: ClockMode) -> Self {
        let origin = match mode {
            ClockMode::Virtual => Instant::from_ticks(0),
            ClockMode::Realtime => Instant::now(),
        };
        Self {
            mode,
            origin,
            elapsed: Cell::new(Duration::from_ticks(0)),
        }
    }

    pub const fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        match self.mode {
            ClockMode::Virtual => self.elapsed.get(),
            ClockMode::Realtime => Instant::now().saturating_duration_since(self.origin),
        }
    }

    pub fn millis(&self) -> u64 {
        self.elapsed().as_millis()
    }

    pub fn micros(&self) -> u64 {
        self.elapsed().as_micros()
    }

    /// Suspend the caller for `duration`
    pub async fn delay(&self, duration: Duration) {
        match self.mode {
            ClockMode::Virtual => {
                self.elapsed.set(self.elapsed.get() + duration);
                yield_now().await;
            }
            ClockMode::Realtime => Timer::after(duration).await,
        }
    }
}
