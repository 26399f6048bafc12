// src/template.rs

//! Minimal `{name}` template engine for command strings.
//!
//! `{}` is shorthand for `{Line}`. Placeholders resolve against a
//! [`Bindings`] value: `{N}` (0-based integer) is a positional token and
//! `{Line}` the whole record (or joined group). Unknown placeholders render
//! as the empty string. A `{` without a matching `}` is literal text.

/// One parsed template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A command template, parsed once and rendered per record.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
}

/// Values available to one expansion: positional tokens plus the full line.
#[derive(Debug, Default)]
pub struct Bindings {
    positional: Vec<String>,
    line: String,
}

impl Bindings {
    pub fn new(positional: Vec<String>, line: String) -> Self {
        Self { positional, line }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        if name == "Line" {
            return Some(&self.line);
        }
        name.parse::<usize>()
            .ok()
            .and_then(|i| self.positional.get(i))
            .map(String::as_str)
    }
}

impl Template {
    /// Parse a template string. Never fails: malformed delimiters degrade to
    /// literal text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.replace("{}", "{Line}");
        let mut segments = Vec::new();
        let mut rest = raw.as_str();

        while let Some(open) = rest.find('{') {
            let (lit, tail) = rest.split_at(open);
            match tail[1..].find('}') {
                Some(close) => {
                    if !lit.is_empty() {
                        segments.push(Segment::Literal(lit.to_string()));
                    }
                    segments.push(Segment::Placeholder(tail[1..1 + close].to_string()));
                    rest = &tail[close + 2..];
                }
                None => break,
            }
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Self { segments }
    }

    /// Render the template against one set of bindings. Placeholders with no
    /// matching binding produce nothing.
    pub fn render(&self, bindings: &Bindings) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Placeholder(name) => {
                    if let Some(value) = bindings.lookup(name) {
                        out.push_str(value);
                    }
                }
            }
        }
        out
    }
}
