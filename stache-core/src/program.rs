//! Program generation: lowering a [`Node`] tree into a flat instruction
//! sequence, and the immutable [`Program`] that wraps it.
//!
//! A program's identity is the SHA-256 of its lowered form (see
//! [`Program::lowered`]), so two templates that lower identically share one
//! [`ContentHash`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CompileError;
use crate::parser::Node;

/// One step of a render program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum Instruction {
    EmitLiteral(String),
    EmitVariable { path: String, escape: bool },
    BeginIterable(String),
    BeginInverted(String),
    End,
    InvokePartial(String),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::EmitLiteral(text) => write!(f, "literal {text:?}"),
            Instruction::EmitVariable { path, escape: true } => write!(f, "variable {path:?}"),
            Instruction::EmitVariable {
                path,
                escape: false,
            } => write!(f, "raw {path:?}"),
            Instruction::BeginIterable(path) => write!(f, "section {path:?}"),
            Instruction::BeginInverted(path) => write!(f, "inverted {path:?}"),
            Instruction::End => f.write_str("end"),
            Instruction::InvokePartial(name) => write!(f, "partial {name:?}"),
        }
    }
}

/// Lower a node tree into an instruction sequence.
///
/// Adjacent literal text is merged into one instruction; comments lower to
/// nothing.
pub fn lower(nodes: &[Node]) -> Vec<Instruction> {
    let mut out = Vec::new();
    lower_into(nodes, &mut out);
    out
}

fn lower_into(nodes: &[Node], out: &mut Vec<Instruction>) {
    for node in nodes {
        match node {
            Node::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                if let Some(Instruction::EmitLiteral(last)) = out.last_mut() {
                    last.push_str(text);
                } else {
                    out.push(Instruction::EmitLiteral(text.clone()));
                }
            }
            Node::Variable { path, escaped, .. } => out.push(Instruction::EmitVariable {
                path: path.clone(),
                escape: *escaped,
            }),
            Node::Section { name, children, .. } => {
                out.push(Instruction::BeginIterable(name.clone()));
                lower_into(children, out);
                out.push(Instruction::End);
            }
            Node::Inversion { name, children, .. } => {
                out.push(Instruction::BeginInverted(name.clone()));
                lower_into(children, out);
                out.push(Instruction::End);
            }
            Node::Partial { name, .. } => out.push(Instruction::InvokePartial(name.clone())),
            Node::Comment { .. } => {}
        }
    }
}

// ---------------------------------------------------------------------------
// ContentHash
// ---------------------------------------------------------------------------

/// SHA-256 digest of a program's lowered form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn of(lowered: &str) -> Self {
        let mut h = Sha256::new();
        h.update(lowered.as_bytes());
        ContentHash(h.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for ContentHash {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| CompileError::Compile(format!("invalid content hash {s:?}: {e}")))?;
        Ok(ContentHash(bytes))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// An immutable, shareable render program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    hash: ContentHash,
    instructions: Vec<Instruction>,
    /// For each `Begin*` instruction, the index of its matching `End`.
    ends: Vec<Option<usize>>,
}

impl Program {
    /// Build a program, computing its content hash.
    ///
    /// Fails if `Begin*`/`End` instructions are unbalanced.
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, CompileError> {
        let hash = ContentHash::of(&render_lowered(&instructions));
        Self::with_hash(hash, instructions)
    }

    pub(crate) fn with_hash(
        hash: ContentHash,
        instructions: Vec<Instruction>,
    ) -> Result<Self, CompileError> {
        let ends = match_blocks(&instructions)?;
        Ok(Program {
            hash,
            instructions,
            ends,
        })
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Index of the `End` matching the `Begin*` at `begin`.
    pub fn end_of(&self, begin: usize) -> Option<usize> {
        self.ends.get(begin).copied().flatten()
    }

    /// Human-readable lowered form; its bytes are what [`ContentHash`] digests.
    pub fn lowered(&self) -> String {
        render_lowered(&self.instructions)
    }
}

/// One instruction per line, indented two spaces per open block.
pub(crate) fn render_lowered(instructions: &[Instruction]) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for instruction in instructions {
        if matches!(instruction, Instruction::End) {
            depth = depth.saturating_sub(1);
        }
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&instruction.to_string());
        out.push('\n');
        if matches!(
            instruction,
            Instruction::BeginIterable(_) | Instruction::BeginInverted(_)
        ) {
            depth += 1;
        }
    }
    out
}

fn match_blocks(instructions: &[Instruction]) -> Result<Vec<Option<usize>>, CompileError> {
    let mut ends = vec![None; instructions.len()];
    let mut open = Vec::new();
    for (idx, instruction) in instructions.iter().enumerate() {
        match instruction {
            Instruction::BeginIterable(_) | Instruction::BeginInverted(_) => open.push(idx),
            Instruction::End => {
                let begin = open.pop().ok_or_else(|| {
                    CompileError::Compile(format!("instruction {idx}: end without begin"))
                })?;
                ends[begin] = Some(idx);
            }
            _ => {}
        }
    }
    if let Some(begin) = open.pop() {
        return Err(CompileError::Compile(format!(
            "instruction {begin}: begin without end"
        )));
    }
    Ok(ends)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{scan, Delimiters};
    use crate::parser::parse;

    fn lower_str(source: &str) -> Vec<Instruction> {
        let tokens = scan(source, &Delimiters::default()).unwrap();
        lower(&parse(tokens).unwrap().nodes)
    }

    #[test]
    fn lowers_sections_with_matching_ends() {
        let instructions = lower_str("Hello {{name}}!\n{{#items}}{{.}}\n{{/items}}");
        assert_eq!(
            instructions,
            vec![
                Instruction::EmitLiteral("Hello ".into()),
                Instruction::EmitVariable {
                    path: "name".into(),
                    escape: true
                },
                Instruction::EmitLiteral("!\n".into()),
                Instruction::BeginIterable("items".into()),
                Instruction::EmitVariable {
                    path: ".".into(),
                    escape: true
                },
                Instruction::EmitLiteral("\n".into()),
                Instruction::End,
            ]
        );
        let program = Program::new(instructions).unwrap();
        assert_eq!(program.end_of(3), Some(6));
        assert_eq!(program.end_of(0), None);
    }

    #[test]
    fn comments_vanish_and_text_merges() {
        assert_eq!(
            lower_str("a{{! note }}b{{>p}}{{^x}}{{&y}}{{/x}}"),
            vec![
                Instruction::EmitLiteral("ab".into()),
                Instruction::InvokePartial("p".into()),
                Instruction::BeginInverted("x".into()),
                Instruction::EmitVariable {
                    path: "y".into(),
                    escape: false
                },
                Instruction::End,
            ]
        );
    }

    #[test]
    fn lowered_form_is_indented() {
        let program = Program::new(lower_str("{{#a}}x{{/a}}")).unwrap();
        assert_eq!(program.lowered(), "section \"a\"\n  literal \"x\"\nend\n");
    }

    #[test]
    fn identical_lowering_hashes_identically() {
        let a = Program::new(lower_str("x{{! one }}{{y}}")).unwrap();
        let b = Program::new(lower_str("x{{y}}{{! two }}")).unwrap();
        let c = Program::new(lower_str("x{{{y}}}")).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn literal_quoting_keeps_hash_unambiguous() {
        let a = Program::new(vec![Instruction::EmitLiteral("a\"\nliteral \"b".into())]).unwrap();
        let b = Program::new(vec![
            Instruction::EmitLiteral("a".into()),
            Instruction::EmitLiteral("b".into()),
        ])
        .unwrap();
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn unbalanced_instructions_are_rejected() {
        assert!(Program::new(vec![Instruction::End]).is_err());
        assert!(Program::new(vec![Instruction::BeginIterable("a".into())]).is_err());
    }

    #[test]
    fn content_hash_parses_its_display() {
        let hash = ContentHash::of("literal \"x\"\n");
        let parsed: ContentHash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);
        assert!("zz".parse::<ContentHash>().is_err());
    }
}
