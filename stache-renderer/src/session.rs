//! Render session: executes a [`Program`] against a [`Scope`] into a sink.
//!
//! Blocks are executed in place: a `Begin*` instruction looks up its
//! matching `End` and runs the instructions between them zero or more
//! times. Nothing written to the sink is rolled back when a later
//! instruction fails.

use std::io::Write;

use stache_core::{CompileError, Instruction, Program};

use crate::error::RenderError;
use crate::escape::EscapingWriter;
use crate::loader::TemplateLoader;
use crate::scope::{Resolved, Scope};
use crate::value::Value;

/// Deepest allowed chain of nested partial invocations.
pub const MAX_PARTIAL_DEPTH: usize = 64;

/// How many times, and with which host value, a section body runs.
#[derive(Debug, PartialEq)]
enum Frames {
    Skip,
    /// Once, in a child scope wrapping the value (or nothing, for `true`).
    Once(Option<Value>),
    Each(Vec<Value>),
}

impl Frames {
    fn of(resolved: Resolved) -> Frames {
        let value = match resolved {
            Resolved::Value(value) => value,
            Resolved::Empty | Resolved::Absent => return Frames::Skip,
        };
        match value {
            Value::Bool(false) => Frames::Skip,
            Value::Bool(true) => Frames::Once(None),
            Value::List(items) if items.is_empty() => Frames::Skip,
            Value::List(items) => Frames::Each(items),
            Value::Node(node) => match node {
                serde_json::Value::Null | serde_json::Value::Bool(false) => Frames::Skip,
                serde_json::Value::Bool(true) => Frames::Once(None),
                serde_json::Value::Array(items) if items.is_empty() => Frames::Skip,
                serde_json::Value::Array(items) => {
                    Frames::Each(items.into_iter().map(Value::from_node).collect())
                }
                other => Frames::Once(Some(Value::Node(other))),
            },
            other => Frames::Once(Some(other)),
        }
    }

    fn count(&self) -> usize {
        match self {
            Frames::Skip => 0,
            Frames::Once(_) => 1,
            Frames::Each(items) => items.len(),
        }
    }
}

/// One render invocation: output sink, partial loader, and debug switch.
pub struct RenderSession<'l, W: Write> {
    out: W,
    loader: &'l dyn TemplateLoader,
    debug: bool,
    depth: usize,
}

impl<'l, W: Write> RenderSession<'l, W> {
    pub fn new(out: W, loader: &'l dyn TemplateLoader) -> Self {
        RenderSession {
            out,
            loader,
            debug: false,
            depth: 0,
        }
    }

    /// Log section entry with iteration counts.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn run(&mut self, program: &Program, scope: &Scope<'_>) -> Result<(), RenderError> {
        self.execute(program, 0, program.instructions().len(), scope)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Execute `program.instructions()[start..end]`.
    fn execute(
        &mut self,
        program: &Program,
        start: usize,
        end: usize,
        scope: &Scope<'_>,
    ) -> Result<(), RenderError> {
        let instructions = program.instructions();
        let mut pc = start;
        while pc < end {
            match &instructions[pc] {
                Instruction::EmitLiteral(text) => self.write(text)?,
                Instruction::EmitVariable { path, escape } => {
                    if let Resolved::Value(value) = scope.resolve(path) {
                        self.emit(&value, *escape)?;
                    }
                }
                Instruction::BeginIterable(path) => {
                    let close = block_end(program, pc)?;
                    let frames = Frames::of(scope.resolve(path));
                    if self.debug {
                        tracing::debug!(section = %path, iterations = frames.count(), "section");
                    }
                    match frames {
                        Frames::Skip => {}
                        Frames::Once(host) => {
                            let child = scope.child(host);
                            self.execute(program, pc + 1, close, &child)?;
                        }
                        Frames::Each(items) => {
                            for item in items {
                                let child = scope.child(Some(item));
                                self.execute(program, pc + 1, close, &child)?;
                            }
                        }
                    }
                    pc = close;
                }
                Instruction::BeginInverted(path) => {
                    let close = block_end(program, pc)?;
                    let frames = Frames::of(scope.resolve(path));
                    if self.debug {
                        tracing::debug!(section = %path, iterations = frames.count(), "inverted section");
                    }
                    if frames == Frames::Skip {
                        self.execute(program, pc + 1, close, scope)?;
                    }
                    pc = close;
                }
                Instruction::End => {}
                Instruction::InvokePartial(name) => self.partial(name, scope)?,
            }
            pc += 1;
        }
        Ok(())
    }

    fn partial(&mut self, name: &str, scope: &Scope<'_>) -> Result<(), RenderError> {
        if self.depth >= MAX_PARTIAL_DEPTH {
            return Err(RenderError::PartialDepth {
                name: name.to_string(),
                depth: self.depth,
            });
        }
        let program = self.loader.load(name)?;
        self.depth += 1;
        let result = self.run(&program, scope);
        self.depth -= 1;
        result
    }

    fn emit(&mut self, value: &Value, escape: bool) -> Result<(), RenderError> {
        let text = value.to_text();
        if escape {
            EscapingWriter::new(&mut self.out)
                .write_all(text.as_bytes())
                .map_err(RenderError::Write)
        } else {
            self.write(&text)
        }
    }

    fn write(&mut self, text: &str) -> Result<(), RenderError> {
        self.out
            .write_all(text.as_bytes())
            .map_err(RenderError::Write)
    }
}

fn block_end(program: &Program, begin: usize) -> Result<usize, RenderError> {
    program.end_of(begin).ok_or_else(|| {
        CompileError::Compile(format!("instruction {begin} opens a block with no end")).into()
    })
}
