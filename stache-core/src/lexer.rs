//! Tag scanner: splits template text into literal runs, newlines, and tags.
//!
//! A lone occurrence of the open marker's first character is ordinary text;
//! only the full marker starts a tag. Every `\n` becomes its own
//! [`Token::Newline`] so later passes can reason about whole lines.

use crate::error::{CompileError, StructuralError};

/// Open/close marker pair, `{{`/`}}` unless configured otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    open: String,
    close: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            open: "{{".to_string(),
            close: "}}".to_string(),
        }
    }
}

impl Delimiters {
    /// Build a custom marker pair. Markers must be non-empty and contain no
    /// whitespace.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self, CompileError> {
        let open = open.into();
        let close = close.into();
        for marker in [&open, &close] {
            if marker.is_empty() || marker.chars().any(char::is_whitespace) {
                return Err(CompileError::Compile(format!(
                    "invalid delimiter {marker:?}: markers must be non-empty and contain no whitespace"
                )));
            }
        }
        Ok(Delimiters { open, close })
    }

    pub fn open(&self) -> &str {
        &self.open
    }

    pub fn close(&self) -> &str {
        &self.close
    }
}

/// One unit of scanner output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text containing no newline.
    Text(String),
    /// A single `\n`.
    Newline,
    /// Raw tag body between the markers, untrimmed. `line` is where the tag opened.
    Tag { body: String, line: usize },
}

/// Scan `source` into tokens. Lines are numbered from 1.
pub fn scan(source: &str, delimiters: &Delimiters) -> Result<Vec<Token>, StructuralError> {
    Scanner {
        src: source,
        pos: 0,
        line: 1,
        delimiters,
        tokens: Vec::new(),
    }
    .run()
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    delimiters: &'a Delimiters,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn run(mut self) -> Result<Vec<Token>, StructuralError> {
        let src = self.src;
        while self.pos < src.len() {
            let rest = &src[self.pos..];
            let newline = rest.find('\n');
            let tag = rest.find(self.delimiters.open());
            match (newline, tag) {
                (Some(nl), Some(at)) if at < nl => self.tag(rest, at)?,
                (Some(nl), _) => {
                    self.text(&rest[..nl]);
                    self.tokens.push(Token::Newline);
                    self.line += 1;
                    self.pos += nl + 1;
                }
                (None, Some(at)) => self.tag(rest, at)?,
                (None, None) => {
                    self.text(rest);
                    self.pos = src.len();
                }
            }
        }
        Ok(self.tokens)
    }

    fn text(&mut self, text: &str) {
        if !text.is_empty() {
            self.tokens.push(Token::Text(text.to_string()));
        }
    }

    /// Consume the text before `at` and the tag starting at `at` (both
    /// offsets relative to `rest`, which starts at `self.pos`).
    fn tag(&mut self, rest: &'a str, at: usize) -> Result<(), StructuralError> {
        self.text(&rest[..at]);

        let src = self.src;
        let opened_on = self.line;
        let body_start = self.pos + at + self.delimiters.open().len();
        let close = self.delimiters.close();
        let Some(len) = src[body_start..].find(close) else {
            return Err(StructuralError::Unterminated { line: opened_on });
        };
        let body = &src[body_start..body_start + len];
        self.line += body.matches('\n').count();
        self.pos = body_start + len + close.len();

        // `{{{name}}}`: the body scan stops at the first `}}`, one brace remains.
        if body.trim_start().starts_with('{') && close.ends_with('}') {
            if src[self.pos..].starts_with('}') {
                self.pos += 1;
            } else {
                return Err(StructuralError::UnterminatedUnescaped { line: opened_on });
            }
        }

        self.tokens.push(Token::Tag {
            body: body.to_string(),
            line: opened_on,
        });
        Ok(())
    }
}
