use crate::clock::ClockMode;
use crate::strip::ColorOrder;

/// Configuration for the simulator
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    /// How `delay()` advances time
    pub clock: ClockMode,
    /// Stop after this many `loop()` iterations (unbounded when `None`)
    ///
    /// Intended for tests and batch previews.
    pub max_loop_iterations: Option<u64>,
    /// Seed for `random()`; a fresh entropy seed per run when `None`
    pub random_seed: Option<u64>,
    /// Color order used when `createStrip` gets no third argument
    pub default_color_order: ColorOrder,
}

impl SimulatorConfig {
    /// Deterministic configuration: virtual clock, fixed seed, bounded loop
    pub fn deterministic(max_loop_iterations: u64) -> Self {
        Self {
            clock: ClockMode::Virtual,
            max_loop_iterations: Some(max_loop_iterations),
            random_seed: Some(0),
            default_color_order: ColorOrder::default(),
        }
    }
}
