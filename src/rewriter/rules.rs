//! The ordered rewrite rule set
//!
//! Order matters: constants are normalised before constructors are
//! recognised, constructors before timing calls are wrapped, and generic
//! function wrapping runs last so it only sees what nothing else claimed.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Pipeline stage a rule belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Comments,
    Directives,
    Constants,
    TypeErasure,
    StripConstructor,
    ButtonConstructor,
    Timing,
    EntryPoints,
    FunctionWrapping,
}

pub(super) enum Replace {
    /// `regex` expansion template
    Template(&'static str),
    /// Computed replacement
    With(fn(&Captures<'_>) -> String),
    /// Computed replacement, only for matches at brace depth zero.
    /// `None` leaves the match untouched.
    TopLevel(fn(&Captures<'_>) -> Option<String>),
}

/// One (pattern, replacement) step of the pipeline
pub struct RewriteRule {
    pub name: &'static str,
    pub stage: Stage,
    pattern: &'static LazyLock<Regex>,
    replace: Replace,
}

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("rewrite patterns are valid")
}

const NUMERIC_TYPES: &str = r"u?int(?:8|16|32|64)_t|size_t|long\s+long|long\s+int|short\s+int|int|long|short|byte|char|float|double|boolean|bool|word|String";

static COMMENTS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r#"//[^\n]*|/\*(?s:.*?)\*/|"(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#)
});
static DEFINES: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?m)^[ \t]*#[ \t]*define[ \t]+([A-Za-z_]\w*)[ \t]+([^ \t\n][^\n]*?)[ \t]*$")
});
static DIRECTIVES: LazyLock<Regex> = LazyLock::new(|| regex(r"(?m)^[ \t]*#[^\n]*"));
static COLOR_ORDERS: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\bNEO_(RGBW|RGB|GRB|BRG|GBR|BGR)\b"));
static FREQUENCY_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| regex(r"[ \t]*[+|][ \t]*NEO_KHZ(?:800|400)\b"));
static FREQUENCY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\bNEO_KHZ(?:800|400)[ \t]*[+|][ \t]*"));
static STATIC_HELPERS: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\bAdafruit_NeoPixel[ \t]*::[ \t]*"));
static ARROWS: LazyLock<Regex> = LazyLock::new(|| regex(r"->"));
static INTEGER_SUFFIXES: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"\b(0[xX][0-9a-fA-F]+|\d+)(?:[uU][lL]{0,2}|[lL]{1,2}[uU]?)\b")
});
static PROTOTYPES: LazyLock<Regex> = LazyLock::new(|| {
    regex(&format!(
        r"(?m)^[ \t]*(?:(?:static|inline)[ \t]+)*(?:void|(?:(?:unsigned|signed)[ \t]+)?(?:{NUMERIC_TYPES}))[ \t]*\*?[ \t]*[A-Za-z_]\w*[ \t]*\([^()]*\)[ \t]*;[ \t]*$"
    ))
});
static DECLARATORS: LazyLock<Regex> = LazyLock::new(|| {
    regex(&format!(
        r"\b(?:(?:const|static|volatile)\s+)*(?:(?:unsigned|signed)\s+)?(?:{NUMERIC_TYPES}|unsigned|signed)(?:\s*[*&]\s*|\s+)([A-Za-z_]\w*)"
    ))
});
static ARRAY_INITIALISERS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"\blet\s+([A-Za-z_]\w*)\s*\[[^\]\n]*\]\s*=\s*\{([^{}]*)\}")
});
static ARRAY_DECLARATIONS: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\blet\s+([A-Za-z_]\w*)\s*\[([^\]\n]+)\]\s*;"));
static STRIP_ASSIGNMENTS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"\bAdafruit_NeoPixel\s*\*?\s*([A-Za-z_]\w*)\s*=\s*(?:new\s+)?Adafruit_NeoPixel\s*\(([^;]*)\)\s*;")
});
static STRIP_DECLARATIONS: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\bAdafruit_NeoPixel\s+([A-Za-z_]\w*)\s*\(([^;]*)\)\s*;"));
static BUTTON_ALLOCATIONS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r#"\b([A-Za-z_]\w*)\s*\*?\s*([A-Za-z_]\w*)\s*=\s*new\s+([A-Za-z_]\w*)\s*\(\s*("(?:[^"\\]|\\.)*")\s*\)\s*;"#)
});
static BUTTON_DECLARATIONS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r#"\b((?:[A-Za-z_]\w*)?Button)\s+([A-Za-z_]\w*)\s*\(\s*("(?:[^"\\]|\\.)*")\s*\)\s*;"#)
});
static DELAYS: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(\bawait\s+)?\b(delayMicroseconds|delay)\s*\("));
static ENTRY_POINTS: LazyLock<Regex> =
    LazyLock::new(|| regex(r"\bvoid\s+(setup|loop)\s*\(\s*(?:void\s*)?\)"));
static FUNCTIONS: LazyLock<Regex> = LazyLock::new(|| {
    regex(r"(?m)^([ \t]*)(?:(?:void|let)[ \t]+)?\*?[ \t]*([A-Za-z_]\w*)[ \t]*\(([^()]*)\)(\s*\{)")
});

/// Names that look like `name(...) {` but are control constructs
const RESERVED: [&str; 12] = [
    "if", "for", "while", "switch", "return", "else", "do", "catch", "function", "async",
    "await", "sizeof",
];

/// The pipeline, in application order
pub static RULES: [RewriteRule; 21] = [
    RewriteRule {
        name: "comments",
        stage: Stage::Comments,
        pattern: &COMMENTS,
        replace: Replace::With(strip_comment),
    },
    RewriteRule {
        name: "define-constants",
        stage: Stage::Directives,
        pattern: &DEFINES,
        replace: Replace::Template("let ${1} = ${2};"),
    },
    RewriteRule {
        name: "directives",
        stage: Stage::Directives,
        pattern: &DIRECTIVES,
        replace: Replace::Template(""),
    },
    RewriteRule {
        name: "color-orders",
        stage: Stage::Constants,
        pattern: &COLOR_ORDERS,
        replace: Replace::Template("\"${1}\""),
    },
    RewriteRule {
        name: "frequency-suffix",
        stage: Stage::Constants,
        pattern: &FREQUENCY_SUFFIX,
        replace: Replace::Template(""),
    },
    RewriteRule {
        name: "frequency-prefix",
        stage: Stage::Constants,
        pattern: &FREQUENCY_PREFIX,
        replace: Replace::Template(""),
    },
    RewriteRule {
        name: "static-helpers",
        stage: Stage::Constants,
        pattern: &STATIC_HELPERS,
        replace: Replace::Template("NeoPixel."),
    },
    RewriteRule {
        name: "arrows",
        stage: Stage::Constants,
        pattern: &ARROWS,
        replace: Replace::Template("."),
    },
    RewriteRule {
        name: "integer-suffixes",
        stage: Stage::Constants,
        pattern: &INTEGER_SUFFIXES,
        replace: Replace::Template("${1}"),
    },
    RewriteRule {
        name: "prototypes",
        stage: Stage::TypeErasure,
        pattern: &PROTOTYPES,
        replace: Replace::Template(""),
    },
    RewriteRule {
        name: "declarators",
        stage: Stage::TypeErasure,
        pattern: &DECLARATORS,
        replace: Replace::With(declarator),
    },
    RewriteRule {
        name: "array-initialisers",
        stage: Stage::TypeErasure,
        pattern: &ARRAY_INITIALISERS,
        replace: Replace::Template("let ${1} = [${2}]"),
    },
    RewriteRule {
        name: "array-declarations",
        stage: Stage::TypeErasure,
        pattern: &ARRAY_DECLARATIONS,
        replace: Replace::Template("let ${1} = array(${2});"),
    },
    RewriteRule {
        name: "strip-assignments",
        stage: Stage::StripConstructor,
        pattern: &STRIP_ASSIGNMENTS,
        replace: Replace::With(strip_constructor),
    },
    RewriteRule {
        name: "strip-declarations",
        stage: Stage::StripConstructor,
        pattern: &STRIP_DECLARATIONS,
        replace: Replace::With(strip_constructor),
    },
    RewriteRule {
        name: "button-allocations",
        stage: Stage::ButtonConstructor,
        pattern: &BUTTON_ALLOCATIONS,
        replace: Replace::With(button_allocation),
    },
    RewriteRule {
        name: "button-declarations",
        stage: Stage::ButtonConstructor,
        pattern: &BUTTON_DECLARATIONS,
        replace: Replace::Template("let ${2} = createButton(${3});"),
    },
    RewriteRule {
        name: "await-delays",
        stage: Stage::Timing,
        pattern: &DELAYS,
        replace: Replace::With(await_delay),
    },
    RewriteRule {
        name: "entry-points",
        stage: Stage::EntryPoints,
        pattern: &ENTRY_POINTS,
        replace: Replace::Template("async function ${1}()"),
    },
    RewriteRule {
        name: "functions",
        stage: Stage::FunctionWrapping,
        pattern: &FUNCTIONS,
        replace: Replace::TopLevel(wrap_function),
    },
    RewriteRule {
        name: "trailing-whitespace",
        stage: Stage::FunctionWrapping,
        pattern: &TRAILING_WHITESPACE,
        replace: Replace::Template(""),
    },
];

static TRAILING_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| regex(r"(?m)[ \t]+$"));

impl RewriteRule {
    /// Apply the rule to the whole text
    ///
    /// Returns the new text and the number of substitutions made. Every
    /// replacement keeps at least as many newlines as the text it replaced,
    /// so line numbers of the rewritten program match the original sketch.
    pub fn apply(&self, text: &str) -> (String, usize) {
        let mut out = String::with_capacity(text.len());
        let mut scanner = DepthScanner::new(text);
        let mut last = 0;
        let mut count = 0;

        for caps in self.pattern.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            // Literals pass through untouched
            if scanner.in_literal_at(whole.start()) {
                continue;
            }
            let replacement = match &self.replace {
                Replace::Template(template) => {
                    let mut expanded = String::new();
                    caps.expand(template, &mut expanded);
                    Some(expanded)
                }
                Replace::With(replace) => Some(replace(&caps)),
                Replace::TopLevel(replace) => {
                    if scanner.depth_at(whole.start()) == 0 {
                        replace(&caps)
                    } else {
                        None
                    }
                }
            };
            let Some(mut replacement) = replacement else {
                continue;
            };
            if replacement == whole.as_str() {
                continue;
            }
            keep_line_count(whole.as_str(), &mut replacement);

            out.push_str(&text[last..whole.start()]);
            out.push_str(&replacement);
            last = whole.end();
            count += 1;
        }

        if count == 0 {
            return (text.to_owned(), 0);
        }
        out.push_str(&text[last..]);
        (out, count)
    }
}

fn keep_line_count(original: &str, replacement: &mut String) {
    let lost = original
        .matches('\n')
        .count()
        .saturating_sub(replacement.matches('\n').count());
    for _ in 0..lost {
        replacement.push('\n');
    }
}

/// Lexical state of the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    /// Inside a string or character literal opened by this quote
    Quote(u8),
    LineComment,
    BlockComment,
}

/// Tracks `{`/`}` nesting outside comments, string and character literals
struct DepthScanner<'t> {
    bytes: &'t [u8],
    pos: usize,
    depth: i32,
    state: Lexical,
    escaped: bool,
}

impl<'t> DepthScanner<'t> {
    fn new(text: &'t str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
            state: Lexical::Code,
            escaped: false,
        }
    }

    /// Scan up to `offset`; offsets must be non-decreasing
    fn advance(&mut self, offset: usize) {
        let end = offset.min(self.bytes.len());
        while self.pos < end {
            let byte = self.bytes[self.pos];
            let next = self.bytes.get(self.pos + 1).copied();
            self.pos += 1;
            match self.state {
                Lexical::Quote(quote) => {
                    if self.escaped {
                        self.escaped = false;
                    } else if byte == b'\\' {
                        self.escaped = true;
                    } else if byte == quote || byte == b'\n' {
                        self.state = Lexical::Code;
                    }
                }
                Lexical::LineComment => {
                    if byte == b'\n' {
                        self.state = Lexical::Code;
                    }
                }
                Lexical::BlockComment => {
                    if byte == b'*' && next == Some(b'/') {
                        self.pos += 1;
                        self.state = Lexical::Code;
                    }
                }
                Lexical::Code => match (byte, next) {
                    (b'/', Some(b'/')) => {
                        self.pos += 1;
                        self.state = Lexical::LineComment;
                    }
                    (b'/', Some(b'*')) => {
                        self.pos += 1;
                        self.state = Lexical::BlockComment;
                    }
                    (b'"' | b'\'', _) => self.state = Lexical::Quote(byte),
                    (b'{', _) => self.depth += 1,
                    (b'}', _) => self.depth -= 1,
                    _ => {}
                },
            }
        }
    }

    /// Brace depth at `offset`
    fn depth_at(&mut self, offset: usize) -> i32 {
        self.advance(offset);
        self.depth
    }

    /// Whether `offset` lies inside a string or character literal
    fn in_literal_at(&mut self, offset: usize) -> bool {
        self.advance(offset);
        matches!(self.state, Lexical::Quote(_))
    }
}

fn strip_comment(caps: &Captures<'_>) -> String {
    let text = &caps[0];
    if text.starts_with('"') || text.starts_with('\'') {
        return text.to_owned();
    }
    // Block comments collapse to their newlines
    text.chars().filter(|&c| c == '\n').collect()
}

/// Split an argument list on commas that are not nested in brackets or strings
pub(super) fn split_arguments(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut nesting = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in args.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => nesting += 1,
            ')' | ']' | '}' => nesting -= 1,
            ',' if nesting == 0 => {
                parts.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = args[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts
}

fn strip_constructor(caps: &Captures<'_>) -> String {
    let args = split_arguments(&caps[2]);
    if args.len() < 2 || args.iter().take(3).any(|arg| arg.is_empty()) {
        return caps[0].to_owned();
    }
    let kept = args.iter().take(3).copied().collect::<Vec<_>>().join(", ");
    format!("let {} = createStrip({kept});", &caps[1])
}

/// Type words that can follow `unsigned`/`signed` inside a cast
const TYPE_WORDS: [&str; 5] = ["long", "int", "short", "char", "byte"];

fn declarator(caps: &Captures<'_>) -> String {
    if TYPE_WORDS.contains(&&caps[1]) {
        return caps[0].to_owned();
    }
    format!("let {}", &caps[1])
}

fn button_allocation(caps: &Captures<'_>) -> String {
    let ty = &caps[1];
    if ty != &caps[3] || !ty.ends_with("Button") {
        return caps[0].to_owned();
    }
    format!("let {} = createButton({});", &caps[2], &caps[4])
}

fn await_delay(caps: &Captures<'_>) -> String {
    if caps.get(1).is_some() {
        return caps[0].to_owned();
    }
    format!("await {}(", &caps[2])
}

fn wrap_function(caps: &Captures<'_>) -> Option<String> {
    let name = &caps[2];
    if RESERVED.contains(&name) {
        return None;
    }
    let params = caps[3]
        .split(',')
        .filter_map(parameter_name)
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "{}async function {name}({params}){}",
        &caps[1], &caps[4]
    ))
}

/// Reduce a C parameter declarator to `name` or `name = default`
fn parameter_name(param: &str) -> Option<String> {
    let (declarator, default) = match param.split_once('=') {
        Some((declarator, default)) => (declarator, Some(default.trim())),
        None => (param, None),
    };
    let declarator = declarator.trim().trim_end_matches("[]").trim_end();
    if declarator.is_empty() || declarator == "void" {
        return None;
    }
    let name = declarator
        .rsplit(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .find(|part| !part.is_empty())?;
    Some(match default {
        Some(default) if !default.is_empty() => format!("{name} = {default}"),
        _ => name.to_owned(),
    })
}
