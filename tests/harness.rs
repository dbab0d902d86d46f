mod tests {
    use std::future::Future;
    use std::pin::pin;
    use std::task::{Context, Poll, Waker};

    use embassy_futures::block_on;
    use myrtio_sketch_sim::{
        ButtonId, RenderSink, Rgb, RunOutcome, SimError, Simulator, SimulatorConfig, StripError,
        StripId,
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Reset,
        StripCreated { strip: StripId, pin: i64, pixel_count: usize },
        Write { strip: StripId, colors: Vec<Rgb> },
        ButtonCreated { button: ButtonId, label: String },
        Serial(String),
    }

    /// Records every sink call
    #[derive(Default)]
    struct RecordingSink {
        events: Vec<Event>,
    }

    impl RecordingSink {
        fn writes(&self) -> Vec<&[Rgb]> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    Event::Write { colors, .. } => Some(colors.as_slice()),
                    _ => None,
                })
                .collect()
        }

        fn serial(&self) -> Vec<&str> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    Event::Serial(line) => Some(line.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl RenderSink for RecordingSink {
        fn reset(&mut self) {
            self.events.clear();
            self.events.push(Event::Reset);
        }

        fn strip_created(&mut self, strip: StripId, pin: i64, pixel_count: usize) {
            self.events.push(Event::StripCreated {
                strip,
                pin,
                pixel_count,
            });
        }

        fn write(&mut self, strip: StripId, colors: &[Rgb]) {
            self.events.push(Event::Write {
                strip,
                colors: colors.to_vec(),
            });
        }

        fn button_created(&mut self, button: ButtonId, label: &str) {
            self.events.push(Event::ButtonCreated {
                button,
                label: label.to_owned(),
            });
        }

        fn serial(&mut self, line: &str) {
            self.events.push(Event::Serial(line.to_owned()));
        }
    }

    fn simulator(iterations: u64) -> Simulator<RecordingSink> {
        Simulator::new(
            SimulatorConfig::deterministic(iterations),
            RecordingSink::default(),
        )
    }

    const GREY: Rgb = Rgb {
        r: 127,
        g: 127,
        b: 127,
    };

    #[test]
    fn test_fill_and_show_scaled_by_brightness() {
        let sim = simulator(1);
        let outcome = block_on(sim.start(
            r"
Adafruit_NeoPixel strip(10, 6, NEO_GRB + NEO_KHZ800);

void setup() {
  strip.begin();
  strip.setBrightness(127);
  strip.fill(strip.Color(255, 255, 255));
  strip.show();
}

void loop() {
}
",
        ));
        assert_eq!(outcome, RunOutcome::Finished { iterations: 1 });

        let sink = sim.sink();
        let sink = sink.borrow();
        assert_eq!(sink.events[0], Event::Reset);
        assert_eq!(
            sink.events[1],
            Event::StripCreated {
                strip: 0,
                pin: 6,
                pixel_count: 10
            }
        );
        assert_eq!(sink.writes(), vec![[GREY; 10].as_slice()]);
    }

    #[test]
    fn test_setup_runs_once_and_loop_repeats() {
        let sim = simulator(3);
        let outcome = block_on(sim.start(
            r#"
int counter = 0;

void setup() {
  Serial.begin(9600);
  Serial.println("setup");
}

void loop() {
  counter++;
  Serial.print("loop ");
  Serial.println(counter);
  delay(100);
}
"#,
        ));
        assert_eq!(outcome, RunOutcome::Finished { iterations: 3 });
        assert_eq!(
            sim.sink().borrow().serial(),
            vec!["setup", "loop 1", "loop 2", "loop 3"]
        );
    }

    #[test]
    fn test_millis_follows_virtual_delays() {
        let sim = simulator(2);
        let outcome = block_on(sim.start(
            r"
void loop() {
  delay(250);
  Serial.println(millis());
}
",
        ));
        assert_eq!(outcome, RunOutcome::Finished { iterations: 2 });
        assert_eq!(sim.sink().borrow().serial(), vec!["250", "500"]);
    }

    #[test]
    fn test_helper_functions_and_defines() {
        let sim = simulator(1);
        let outcome = block_on(sim.start(
            r"
#define LED_PIN   3
#define LED_COUNT 4

Adafruit_NeoPixel strip(LED_COUNT, LED_PIN, NEO_GRB + NEO_KHZ800);

uint32_t Wheel(byte WheelPos) {
  WheelPos = 255 - WheelPos;
  if (WheelPos < 85) {
    return strip.Color(255 - WheelPos * 3, 0, WheelPos * 3);
  }
  if (WheelPos < 170) {
    WheelPos -= 85;
    return strip.Color(0, WheelPos * 3, 255 - WheelPos * 3);
  }
  WheelPos -= 170;
  return strip.Color(WheelPos * 3, 255 - WheelPos * 3, 0);
}

void setup() {
  for (int i = 0; i < strip.numPixels(); i++) {
    strip.setPixelColor(i, Wheel(i * 85));
  }
  strip.show();
}

void loop() {}
",
        ));
        assert_eq!(outcome, RunOutcome::Finished { iterations: 1 });

        let sink = sim.sink();
        let sink = sink.borrow();
        assert_eq!(
            sink.events[1],
            Event::StripCreated {
                strip: 0,
                pin: 3,
                pixel_count: 4
            }
        );
        let red = Rgb { r: 255, g: 0, b: 0 };
        let green = Rgb { r: 0, g: 255, b: 0 };
        let blue = Rgb { r: 0, g: 0, b: 255 };
        assert_eq!(sink.writes(), vec![[red, green, blue, red].as_slice()]);
    }

    #[test]
    fn test_out_of_range_pixel_fails_the_run() {
        let sim = simulator(10);
        let outcome = block_on(sim.start(
            r"
Adafruit_NeoPixel strip(3, 6);

void loop() {
  strip.setPixelColor(3, 255, 0, 0);
  strip.show();
}
",
        ));
        assert_eq!(
            outcome,
            RunOutcome::Failed(SimError::Strip {
                line: 5,
                source: StripError::IndexOutOfRange { index: 3, len: 3 }
            })
        );
        assert!(sim.sink().borrow().writes().is_empty());
    }

    #[test]
    fn test_syntax_error_is_an_evaluation_error() {
        let sim = simulator(1);
        let outcome = block_on(sim.start("void setup() {\n  int x = ;\n}\n"));
        assert!(matches!(
            outcome,
            RunOutcome::Failed(SimError::Evaluation { line: 2, .. })
        ));
    }

    #[test]
    fn test_setup_error_stops_before_loop() {
        let sim = simulator(5);
        let outcome = block_on(sim.start(
            r#"
void setup() {
  Serial.println("before");
  undefinedFunction();
}

void loop() {
  Serial.println("loop");
}
"#,
        ));
        assert!(matches!(
            outcome,
            RunOutcome::Failed(SimError::Runtime { line: 4, .. })
        ));
        assert_eq!(sim.sink().borrow().serial(), vec!["before"]);
    }

    #[test]
    fn test_sketch_without_entry_points_finishes() {
        let sim = simulator(5);
        let outcome = block_on(sim.start("int x = 1;\n"));
        assert_eq!(outcome, RunOutcome::Finished { iterations: 0 });
    }

    #[test]
    fn test_new_run_supersedes_old_one() {
        let sim = simulator(1_000);
        let source = r#"
void loop() {
  Serial.println("tick");
  delay(10);
}
"#;
        let mut cx = Context::from_waker(Waker::noop());

        let mut first = pin!(sim.start(source));
        assert!(first.as_mut().poll(&mut cx).is_pending());
        assert_eq!(sim.sink().borrow().serial(), vec!["tick"]);

        let second = sim.start(source);
        assert_eq!(sim.sink().borrow().events, vec![Event::Reset]);

        assert_eq!(first.as_mut().poll(&mut cx), Poll::Ready(RunOutcome::Superseded));
        assert_eq!(sim.sink().borrow().events, vec![Event::Reset]);

        drop(second);
    }

    #[test]
    fn test_superseded_run_leaves_new_strips_alone() {
        let sim = simulator(1_000);
        let mut cx = Context::from_waker(Waker::noop());

        let mut first = pin!(sim.start(
            r"
Adafruit_NeoPixel strip(4, 6);

void loop() {
  strip.show();
  delay(10);
  strip.setPixelColor(0, 255, 0, 0);
  strip.show();
}
",
        ));
        assert!(first.as_mut().poll(&mut cx).is_pending());
        assert_eq!(sim.sink().borrow().writes().len(), 1);

        let second = block_on(sim.start(
            r"
Adafruit_NeoPixel other(2, 3);

void setup() {
  other.show();
}
",
        ));
        assert_eq!(second, RunOutcome::Finished { iterations: 0 });

        assert_eq!(first.as_mut().poll(&mut cx), Poll::Ready(RunOutcome::Superseded));

        let sink = sim.sink();
        let sink = sink.borrow();
        assert_eq!(
            sink.events,
            vec![
                Event::Reset,
                Event::StripCreated {
                    strip: 0,
                    pin: 3,
                    pixel_count: 2
                },
                Event::Write {
                    strip: 0,
                    colors: vec![Rgb::default(); 2]
                },
            ]
        );
    }

    #[test]
    fn test_unbounded_recursion_fails_the_run() {
        let sim = simulator(1);
        let outcome = block_on(sim.start(
            r"
int descend(int n) {
  return descend(n + 1);
}

void setup() {
  descend(0);
}
",
        ));
        assert!(matches!(
            outcome,
            RunOutcome::Failed(SimError::Runtime { line: 3, ref message })
                if message.contains("call stack")
        ));
    }

    #[test]
    fn test_print_formats_and_literals() {
        let sim = simulator(1);
        let outcome = block_on(sim.start(
            r#"
void setup() {
  Serial.println(255, HEX);
  Serial.println(5, BIN);
  Serial.println(2.0 / 3, 3);
  Serial.println("int value and delay(5)");
  Serial.println(map(2, 0, 1, -1, 9223372036854775807));
}
"#,
        ));
        assert_eq!(outcome, RunOutcome::Finished { iterations: 0 });
        assert_eq!(
            sim.sink().borrow().serial(),
            vec!["FF", "101", "0.667", "int value and delay(5)", "-1"]
        );
    }

    #[test]
    fn test_button_clicks_are_dispatched() {
        let sim = simulator(3);
        let clicks = sim.clicks();
        let mut cx = Context::from_waker(Waker::noop());

        let mut run = pin!(sim.start(
            r#"
SketchButton next = new SketchButton("Next");
int mode = 0;

void onNext() {
  mode++;
}

void setup() {
  next.onClick(onNext);
}

void loop() {
  Serial.println(mode);
  delay(10);
}
"#,
        ));

        // First iteration suspends in delay(10)
        assert!(run.as_mut().poll(&mut cx).is_pending());
        clicks.press(0).unwrap();
        clicks.press(0).unwrap();

        let outcome = loop {
            if let Poll::Ready(outcome) = run.as_mut().poll(&mut cx) {
                break outcome;
            }
        };
        assert_eq!(outcome, RunOutcome::Finished { iterations: 3 });

        let sink = sim.sink();
        let sink = sink.borrow();
        assert!(sink.events.contains(&Event::ButtonCreated {
            button: 0,
            label: "Next".to_owned()
        }));
        assert_eq!(sink.serial(), vec!["0", "2", "2"]);
    }

    #[test]
    fn test_random_is_reproducible_with_a_seed() {
        let source = r"
void loop() {
  Serial.println(random(1000));
}
";
        let first = simulator(5);
        block_on(first.start(source));
        let second = simulator(5);
        block_on(second.start(source));

        let first = first.sink().borrow().serial().join(",");
        let second = second.sink().borrow().serial().join(",");
        assert_eq!(first, second);
    }
}
