mod tests {
    use myrtio_sketch_sim::rewrite;
    use myrtio_sketch_sim::script::parse;

    const STRANDTEST: &str = r#"// A basic everyday NeoPixel strip test program.
#include <Adafruit_NeoPixel.h>
#ifdef __AVR__
 #include <avr/power.h>
#endif

#define LED_PIN    6
#define LED_COUNT 60

Adafruit_NeoPixel strip(LED_COUNT, LED_PIN, NEO_GRB + NEO_KHZ800);

void colorWipe(uint32_t color, int wait);

void setup() {
  strip.begin();           /* INITIALIZE NeoPixel strip object */
  strip.show();
  strip.setBrightness(50);
}

void loop() {
  colorWipe(strip.Color(255,   0,   0), 50); // Red
  theaterChase(strip.Color(127, 127, 127), 50);
}

void colorWipe(uint32_t color, int wait) {
  for(int i=0; i<strip.numPixels(); i++) {
    strip.setPixelColor(i, color);
    strip.show();
    delay(wait);
  }
}

void theaterChase(uint32_t color, int wait) {
  for(int a=0; a<10; a++) {
    for(int b=0; b<3; b++) {
      strip.clear();
      for(int c=b; c<strip.numPixels(); c += 3) {
        strip.setPixelColor(c, color);
      }
      strip.show();
      delay(wait);
    }
  }
}
"#;

    #[test]
    fn test_strandtest_rewrites_to_valid_script() {
        let rewritten = rewrite(STRANDTEST);
        let text = &rewritten.text;

        assert!(text.contains("let LED_PIN = 6;"));
        assert!(text.contains(r#"let strip = createStrip(LED_COUNT, LED_PIN, "GRB");"#));
        assert!(text.contains("async function setup()"));
        assert!(text.contains("async function loop()"));
        assert!(text.contains("async function colorWipe(color, wait) {"));
        assert!(text.contains("async function theaterChase(color, wait) {"));
        assert!(text.contains("for(let i=0;"));
        assert!(text.contains("await delay(wait);"));
        assert!(!text.contains("#include"));
        assert!(!text.contains("NEO_KHZ800"));
        assert!(!text.contains("void colorWipe(uint32_t color, int wait);"));

        assert!(rewritten.ambiguities.is_empty(), "{:?}", rewritten.ambiguities);
        assert!(parse(text).is_ok(), "{text}");
    }

    #[test]
    fn test_line_structure_is_preserved() {
        let rewritten = rewrite(STRANDTEST);
        assert_eq!(
            rewritten.text.lines().count(),
            STRANDTEST.lines().count()
        );
        let setup_line = STRANDTEST
            .lines()
            .position(|line| line.starts_with("void setup"));
        let rewritten_setup_line = rewritten
            .text
            .lines()
            .position(|line| line.starts_with("async function setup"));
        assert_eq!(setup_line, rewritten_setup_line);
    }

    #[test]
    fn test_rewrite_is_idempotent_for_awaited_delays() {
        let once = rewrite("void loop() {\n  delay(10);\n  delayMicroseconds(5);\n}\n");
        let twice = rewrite(&once.text);
        assert_eq!(once.text, twice.text);
        assert!(once.text.contains("await delay(10);"));
        assert!(once.text.contains("await delayMicroseconds(5);"));
        assert!(!once.text.contains("await await"));
    }

    #[test]
    fn test_pointer_strip_and_extra_constructor_arguments() {
        let rewritten = rewrite(
            "Adafruit_NeoPixel *pixels = new Adafruit_NeoPixel(16, 5, NEO_RGBW + NEO_KHZ400, extra);",
        );
        assert_eq!(
            rewritten.text,
            r#"let pixels = createStrip(16, 5, "RGBW");"#
        );
    }

    #[test]
    fn test_buttons() {
        let rewritten = rewrite(
            "SketchButton next = new SketchButton(\"Next\");\nSketchButton prev(\"Prev\");\n",
        );
        assert_eq!(
            rewritten.text,
            "let next = createButton(\"Next\");\nlet prev = createButton(\"Prev\");\n"
        );
    }

    #[test]
    fn test_mismatched_button_types_are_left_alone() {
        let source = "FooButton b = new BarButton(\"x\");";
        assert_eq!(rewrite(source).text, source);
    }

    #[test]
    fn test_literals_and_arrays() {
        let rewritten = rewrite(
            "const uint8_t levels[] = {0, 64, 255};\nunsigned long last = 1000UL;\nint buf[8];\n",
        );
        assert_eq!(
            rewritten.text,
            "let levels = [0, 64, 255];\nlet last = 1000;\nlet buf = array(8);\n"
        );
    }

    #[test]
    fn test_comments_inside_strings_survive() {
        let rewritten = rewrite("void setup() {\n  Serial.println(\"a // b\");\n}\n");
        assert!(rewritten.text.contains("\"a // b\""));
    }

    #[test]
    fn test_string_and_char_literals_pass_through() {
        let rewritten = rewrite(
            "void setup() {\n  Serial.println(\"int value and delay(5)\");\n  char c = 'x';\n}\n",
        );
        let text = &rewritten.text;
        assert!(text.contains(r#"Serial.println("int value and delay(5)");"#));
        assert!(!text.contains("await delay(5)"));
        assert!(text.contains("let c = 'x';"));
        assert!(parse(text).is_ok());
    }

    #[test]
    fn test_static_helpers_and_arrows() {
        let rewritten = rewrite("uint32_t c = Adafruit_NeoPixel::Color(1, 2, 3);\nstrip->show();\n");
        assert_eq!(
            rewritten.text,
            "let c = NeoPixel.Color(1, 2, 3);\nstrip.show();\n"
        );
    }

    #[test]
    fn test_nested_braces_are_not_wrapped() {
        let rewritten = rewrite("void loop() {\n  if (x) {\n  }\n  while (y) {\n  }\n}\n");
        assert!(!rewritten.text.contains("async function if"));
        assert!(!rewritten.text.contains("async function while"));
    }

    #[test]
    fn test_ambiguities_are_reported() {
        let rewritten = rewrite(
            "#define SQUARE(x) ((x) * (x))\nvoid loop() {\n  static int n = 0;\n}\nstruct Foo { int a; };\n",
        );
        let lines: Vec<usize> = rewritten.ambiguities.iter().map(|note| note.line).collect();
        assert!(lines.contains(&1), "{:?}", rewritten.ambiguities);
        assert!(lines.contains(&3), "{:?}", rewritten.ambiguities);
        assert!(lines.contains(&5), "{:?}", rewritten.ambiguities);
    }
}
