//! Execution harness
//!
//! Drives a sketch the way the Arduino core does: top-level code, then
//! `setup()` once, then `loop()` forever. The run is a single future the
//! host polls on its own executor; every `delay()` and every loop iteration
//! gives control back to it.

use core::cell::{Cell, RefCell};
use core::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use embassy_futures::yield_now;
use log::{error, info, warn};

use crate::RenderSink;
use crate::channel::{ClickChannel, ClickSender};
use crate::config::SimulatorConfig;
use crate::context::{RunContext, RunToken};
use crate::error::SimError;
use crate::rewriter::rewrite;
use crate::script::{Interpreter, Interrupt, parse};

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The program ran to its end, or the iteration limit was reached
    Finished { iterations: u64 },
    /// A newer run was started
    Superseded,
    Failed(SimError),
}

/// Runs sketches against a render sink
///
/// At most one run is current: [`Simulator::start`] invalidates every run
/// started before it.
pub struct Simulator<S: RenderSink + 'static> {
    config: SimulatorConfig,
    sink: Rc<RefCell<S>>,
    generation: Rc<Cell<u64>>,
    clicks: Arc<ClickChannel>,
}

impl<S: RenderSink + 'static> Simulator<S> {
    pub fn new(config: SimulatorConfig, sink: S) -> Self {
        Self {
            config,
            sink: Rc::new(RefCell::new(sink)),
            generation: Rc::new(Cell::new(0)),
            clicks: Arc::new(ClickChannel::new()),
        }
    }

    pub const fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Shared handle to the sink, for inspecting what was rendered
    pub fn sink(&self) -> Rc<RefCell<S>> {
        self.sink.clone()
    }

    /// Sender for button presses, usable from other threads
    pub fn clicks(&self) -> ClickSender {
        ClickSender::new(self.clicks.clone())
    }

    /// Start running `source`, superseding any previous run
    ///
    /// The previous run is invalidated and the sink reset before this
    /// returns, even if the returned future is never polled.
    pub fn start(&self, source: &str) -> impl Future<Output = RunOutcome> + 'static {
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        self.sink.borrow_mut().reset();
        self.clicks.clear();

        let token = RunToken::new(self.generation.clone(), generation);
        let sink: Rc<RefCell<dyn RenderSink>> = self.sink.clone();
        let ctx = RunContext::new(&self.config, token, sink, self.clicks.clone());
        let max_loop_iterations = self.config.max_loop_iterations;
        let source = source.to_owned();

        async move {
            let outcome = drive(&source, ctx, max_loop_iterations).await;
            match &outcome {
                RunOutcome::Finished { iterations } => {
                    info!("[SIM] Run {generation} finished after {iterations} loop iteration(s)");
                }
                RunOutcome::Superseded => info!("[SIM] Run {generation} superseded"),
                RunOutcome::Failed(err) => error!("[SIM] Run {generation} failed: {err}"),
            }
            outcome
        }
    }
}

async fn drive(source: &str, ctx: RunContext, max_loop_iterations: Option<u64>) -> RunOutcome {
    let rewritten = rewrite(source);
    for note in &rewritten.ambiguities {
        warn!("[REWRITE] {note}");
    }
    let program = match parse(&rewritten.text) {
        Ok(program) => program,
        Err(err) => return RunOutcome::Failed(err.into()),
    };

    let interpreter = Interpreter::new(ctx);
    let mut iterations = 0;
    let result = async {
        interpreter.run_program(&program).await?;
        if let Some(setup) = interpreter.entry_point("setup") {
            interpreter.call(setup, Vec::new(), 0).await?;
        }
        let Some(main_loop) = interpreter.entry_point("loop") else {
            return Ok::<(), Interrupt>(());
        };
        loop {
            if !interpreter.context().token().is_current() {
                return Err(Interrupt::Superseded);
            }
            if max_loop_iterations.is_some_and(|limit| iterations >= limit) {
                return Ok(());
            }
            interpreter.dispatch_clicks().await?;
            interpreter.call(main_loop.clone(), Vec::new(), 0).await?;
            iterations += 1;
            yield_now().await;
        }
    }
    .await;

    match result {
        Ok(()) => RunOutcome::Finished { iterations },
        Err(Interrupt::Superseded) => RunOutcome::Superseded,
        Err(Interrupt::Fault(err)) => RunOutcome::Failed(err),
    }
}
