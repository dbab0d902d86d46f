//! Desktop preview app for Arduino NeoPixel sketches
//!
//! Edit a sketch, run it and watch the simulated strips in a window. The
//! egui frame loop is the executor: the current run is polled once per
//! frame.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use clap::Parser;
use eframe::egui::{self};
use log::error;
use myrtio_sketch_sim::{
    ButtonId, ClickSender, ClockMode, RenderSink, Rgb, RunOutcome, Simulator,
    SimulatorConfig, StripId, rewrite,
};

/// Size of each LED rectangle in pixels
const LED_SIZE: f32 = 12.0;

/// Gap between LEDs
const LED_GAP: f32 = 2.0;

/// Serial lines kept in the monitor
const SERIAL_HISTORY: usize = 200;

const DEMO_SKETCH: &str = r#"#include <Adafruit_NeoPixel.h>

#define LED_PIN    6
#define LED_COUNT 60

Adafruit_NeoPixel strip(LED_COUNT, LED_PIN, NEO_GRB + NEO_KHZ800);

void setup() {
  strip.begin();
  strip.setBrightness(50);
  strip.show();
}

void loop() {
  rainbow(10);
}

void rainbow(int wait) {
  for (long firstPixelHue = 0; firstPixelHue < 65536; firstPixelHue += 256) {
    for (int i = 0; i < strip.numPixels(); i++) {
      int pixelHue = firstPixelHue + (i * 65536L / strip.numPixels());
      strip.setPixelColor(i, strip.gamma32(strip.ColorHSV(pixelHue)));
    }
    strip.show();
    delay(wait);
  }
}
"#;

#[derive(Parser)]
#[command(name = "myrtio-sketch-preview")]
#[command(about = "Run an Arduino NeoPixel sketch against simulated strips", long_about = None)]
struct Cli {
    /// Sketch file (.ino); a built-in demo when omitted
    sketch: Option<PathBuf>,

    /// Advance time only through delay() instead of the wall clock
    #[arg(long)]
    virtual_clock: bool,

    /// Stop after this many loop() iterations
    #[arg(long)]
    iterations: Option<u64>,

    /// Seed for random()
    #[arg(long)]
    seed: Option<u64>,

    /// Print the rewritten sketch and exit
    #[arg(long)]
    print_rewritten: bool,
}

/// A strip as the window shows it
struct StripView {
    pin: i64,
    pixels: Vec<Rgb>,
}

/// Sink collecting everything the window draws
#[derive(Default)]
struct PanelSink {
    strips: Vec<StripView>,
    buttons: Vec<String>,
    serial: Vec<String>,
}

impl RenderSink for PanelSink {
    fn reset(&mut self) {
        self.strips.clear();
        self.buttons.clear();
        self.serial.clear();
    }

    fn strip_created(&mut self, strip: StripId, pin: i64, pixel_count: usize) {
        debug_assert_eq!(strip, self.strips.len());
        self.strips.push(StripView {
            pin,
            pixels: vec![Rgb::default(); pixel_count],
        });
    }

    fn write(&mut self, strip: StripId, colors: &[Rgb]) {
        if let Some(view) = self.strips.get_mut(strip) {
            view.pixels.clear();
            view.pixels.extend_from_slice(colors);
        }
    }

    fn button_created(&mut self, _button: ButtonId, label: &str) {
        self.buttons.push(label.to_owned());
    }

    fn serial(&mut self, line: &str) {
        if self.serial.len() == SERIAL_HISTORY {
            self.serial.remove(0);
        }
        self.serial.push(line.to_owned());
    }
}

type Run = Pin<Box<dyn Future<Output = RunOutcome>>>;

struct PreviewApp {
    simulator: Simulator<PanelSink>,
    clicks: ClickSender,
    /// Sketch being edited
    source: String,
    /// The current run, polled every frame
    run: Option<Run>,
    /// Outcome of the last run
    status: String,
    /// LED pixel size for display
    led_size: f32,
}

impl PreviewApp {
    fn new(config: SimulatorConfig, source: String) -> Self {
        let simulator = Simulator::new(config, PanelSink::default());
        let clicks = simulator.clicks();
        let mut app = Self {
            simulator,
            clicks,
            source,
            run: None,
            status: String::new(),
            led_size: LED_SIZE,
        };
        app.start();
        app
    }

    fn start(&mut self) {
        self.run = Some(Box::pin(self.simulator.start(&self.source)));
        self.status = "running".to_owned();
    }

    fn stop(&mut self) {
        self.run = None;
        self.status = "stopped".to_owned();
    }

    fn poll_run(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        let mut cx = Context::from_waker(Waker::noop());
        if let Poll::Ready(outcome) = run.as_mut().poll(&mut cx) {
            self.status = match outcome {
                RunOutcome::Finished { iterations } => {
                    format!("finished after {iterations} loop iteration(s)")
                }
                RunOutcome::Superseded => "superseded".to_owned(),
                RunOutcome::Failed(err) => err.to_string(),
            };
            self.run = None;
        }
    }

    fn draw_strips(&self, ui: &mut egui::Ui) {
        let sink = self.simulator.sink();
        let sink = sink.borrow();
        let led_pitch = self.led_size + LED_GAP;

        for (id, strip) in sink.strips.iter().enumerate() {
            ui.label(format!("Strip {id} (pin {})", strip.pin));

            let available_width = ui.available_width();
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let leds_per_row = (available_width / led_pitch).floor().max(1.0) as usize;
            let rows = strip.pixels.len().div_ceil(leds_per_row);
            #[allow(clippy::cast_precision_loss)]
            let height = rows as f32 * led_pitch;

            let (response, painter) = ui.allocate_painter(
                egui::vec2(available_width, height),
                egui::Sense::hover(),
            );
            let origin = response.rect.min;

            #[allow(clippy::cast_precision_loss)]
            for (i, pixel) in strip.pixels.iter().enumerate() {
                let row = i / leds_per_row;
                let col = i % leds_per_row;
                let x = origin.x + col as f32 * led_pitch;
                let y = origin.y + row as f32 * led_pitch;

                let rect = egui::Rect::from_min_size(
                    egui::pos2(x, y),
                    egui::vec2(self.led_size, self.led_size),
                );
                let color = egui::Color32::from_rgb(pixel.r, pixel.g, pixel.b);
                painter.rect_filled(rect, 3.0, color);
            }

            ui.add_space(8.0);
        }
    }

    fn draw_buttons(&self, ui: &mut egui::Ui) {
        let sink = self.simulator.sink();
        let labels = sink.borrow().buttons.clone();
        if labels.is_empty() {
            return;
        }
        ui.horizontal_wrapped(|ui| {
            for (id, label) in labels.iter().enumerate() {
                if ui.button(label).clicked() && self.clicks.press(id).is_err() {
                    error!("[PREVIEW] Click queue full, press of {label} dropped");
                }
            }
        });
    }

    fn draw_serial(&self, ui: &mut egui::Ui) {
        let sink = self.simulator.sink();
        let sink = sink.borrow();
        egui::ScrollArea::vertical()
            .id_salt("serial_monitor")
            .max_height(160.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &sink.serial {
                    ui.monospace(line);
                }
            });
    }
}

impl eframe::App for PreviewApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_run();

        // Request continuous repaint for animation
        ctx.request_repaint();

        egui::SidePanel::left("sketch_editor")
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("▶ Run").clicked() {
                        self.start();
                    }
                    if ui.button("⏹ Stop").clicked() {
                        self.stop();
                    }
                });
                ui.add_space(4.0);
                egui::ScrollArea::vertical().show(ui, |ui| {
                    ui.add(
                        egui::TextEdit::multiline(&mut self.source)
                            .code_editor()
                            .desired_width(f32::INFINITY),
                    );
                });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("Status: {}", self.status));
                ui.add_space(16.0);
                ui.label("Size: ");
                ui.add(egui::Slider::new(&mut self.led_size, 4.0..=32.0));
            });

            ui.add_space(16.0);
            self.draw_strips(ui);
            self.draw_buttons(ui);

            ui.add_space(16.0);
            ui.label("Serial monitor");
            self.draw_serial(ui);
        });
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let source = match &cli.sketch {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                error!("[PREVIEW] Cannot read {}: {err}", path.display());
                std::process::exit(1);
            }
        },
        None => DEMO_SKETCH.to_owned(),
    };

    if cli.print_rewritten {
        let rewritten = rewrite(&source);
        #[allow(clippy::print_stdout)]
        {
            println!("{}", rewritten.text);
        }
        for note in &rewritten.ambiguities {
            log::warn!("[REWRITE] {note}");
        }
        return Ok(());
    }

    let config = SimulatorConfig {
        clock: if cli.virtual_clock {
            ClockMode::Virtual
        } else {
            ClockMode::Realtime
        },
        max_loop_iterations: cli.iterations,
        random_seed: cli.seed,
        ..SimulatorConfig::default()
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 700.0])
            .with_title("Sketch Preview"),
        ..Default::default()
    };

    eframe::run_native(
        "myrtio-sketch-preview",
        options,
        Box::new(|_cc| Ok(Box::new(PreviewApp::new(config, source)))),
    )
}
