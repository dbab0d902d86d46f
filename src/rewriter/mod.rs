//! Arduino sketch to sketch-script rewriter
//!
//! Not a parser: an ordered pipeline of regular expression substitutions
//! (see [`RULES`]) that maps the NeoPixel flavoured subset of Arduino C++
//! onto the script dialect understood by [`crate::script`]. Anything no rule
//! recognises passes through untouched; if it isn't valid script it fails
//! later, at parse or run time, where the harness reports it.
//!
//! The rewriter never fails. Shapes it noticed but could not translate are
//! reported as [`RewriteAmbiguity`] notes.

mod rules;

use core::fmt;
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

pub use rules::{RULES, RewriteRule, Stage};

/// Result of rewriting a sketch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    /// Executable sketch script, line-aligned with the input
    pub text: String,
    /// Untranslated shapes worth telling the user about
    pub ambiguities: Vec<RewriteAmbiguity>,
}

/// A construct that matched an unexpected shape and was passed through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteAmbiguity {
    /// 1-based line in the sketch
    pub line: usize,
    pub message: &'static str,
    /// The offending text
    pub excerpt: String,
}

impl fmt::Display for RewriteAmbiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} (`{}`)", self.line, self.message, self.excerpt)
    }
}

/// Rewrite a sketch into sketch script
pub fn rewrite(source: &str) -> Rewrite {
    let source = source.replace("\r\n", "\n");
    let mut text = source.clone();

    for rule in &RULES {
        let (next, count) = rule.apply(&text);
        if count > 0 {
            debug!("[REWRITE] {}: {} substitution(s)", rule.name, count);
            text = next;
        }
    }

    let ambiguities = diagnose(&source, &text);
    Rewrite { text, ambiguities }
}

struct Check {
    pattern: &'static LazyLock<Regex>,
    /// Scan the original sketch instead of the rewritten text
    in_source: bool,
    message: &'static str,
}

static LEFTOVER_STRIPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bAdafruit_NeoPixel\b[^;\n]*").expect("valid pattern"));
static FUNCTION_MACROS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*#[ \t]*define[ \t]+\w+\([^\n]*").expect("valid pattern")
});
static STATIC_LOCALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]+static\b[^\n]*").expect("valid pattern"));
static SCOPE_OPERATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+[ \t]*::[ \t]*\w+").expect("valid pattern"));
static UNKNOWN_CONSTANTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bNEO_\w+").expect("valid pattern"));
static TYPE_DECLARATIONS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:struct|class|template|typedef|enum)\b[^\n{]*").expect("valid pattern")
});

static CHECKS: [Check; 6] = [
    Check {
        pattern: &LEFTOVER_STRIPS,
        in_source: false,
        message: "NeoPixel declaration not recognised",
    },
    Check {
        pattern: &FUNCTION_MACROS,
        in_source: true,
        message: "function-like macro dropped",
    },
    Check {
        pattern: &STATIC_LOCALS,
        in_source: true,
        message: "static local is re-initialised on every call",
    },
    Check {
        pattern: &SCOPE_OPERATORS,
        in_source: false,
        message: "scope operator left untranslated",
    },
    Check {
        pattern: &UNKNOWN_CONSTANTS,
        in_source: false,
        message: "unknown NeoPixel constant",
    },
    Check {
        pattern: &TYPE_DECLARATIONS,
        in_source: false,
        message: "type declarations are not supported",
    },
];

fn diagnose(source: &str, rewritten: &str) -> Vec<RewriteAmbiguity> {
    let mut found = Vec::new();
    for check in &CHECKS {
        let text = if check.in_source { source } else { rewritten };
        for m in check.pattern.find_iter(text) {
            found.push(RewriteAmbiguity {
                line: line_of(text, m.start()),
                message: check.message,
                excerpt: m.as_str().trim().to_owned(),
            });
        }
    }
    found.sort_by_key(|note| note.line);
    found
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}
