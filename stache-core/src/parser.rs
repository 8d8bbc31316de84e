//! Parser: turns scanner tokens into a [`Node`] tree.
//!
//! Tag bodies are dispatched on their first non-whitespace character:
//!
//! | Marker        | Result                          |
//! |---------------|---------------------------------|
//! | `#name`       | [`Node::Section`]               |
//! | `^name`       | [`Node::Inversion`]             |
//! | `/name`       | closes the innermost section    |
//! | `>name`       | [`Node::Partial`]               |
//! | `{name` `&name` | unescaped [`Node::Variable`]  |
//! | `!text`       | [`Node::Comment`]               |
//! | `%text`       | pragma, reported as a [`Warning`] |
//! | anything else | escaped [`Node::Variable`]      |
//!
//! ## Standalone lines
//!
//! A line holding nothing but blanks and section/inversion open or close
//! tags is *standalone* when at least one of those tags pairs with a tag on
//! another line. Standalone lines contribute neither their blanks nor their
//! newline to the output, so a multi-line section does not leave empty
//! lines where its bracketing tags were. A section opened and closed on the
//! same line never makes its line standalone.

use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

use crate::error::StructuralError;
use crate::lexer::Token;

/// A parsed template element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    Variable {
        path: String,
        escaped: bool,
        line: usize,
    },
    Section {
        name: String,
        children: Vec<Node>,
        lines: RangeInclusive<usize>,
    },
    Inversion {
        name: String,
        children: Vec<Node>,
        lines: RangeInclusive<usize>,
    },
    Partial {
        name: String,
        line: usize,
    },
    Comment {
        text: String,
        line: usize,
    },
}

/// Classification of a raw tag body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
    Section(String),
    Inversion(String),
    Close(String),
    Partial(String),
    Unescaped(String),
    Escaped(String),
    Comment(String),
    Pragma(String),
    Empty,
}

impl TagKind {
    pub fn classify(body: &str) -> TagKind {
        let command = body.trim();
        let mut chars = command.chars();
        let Some(marker) = chars.next() else {
            return TagKind::Empty;
        };
        let rest = chars.as_str().trim();
        match marker {
            '#' => TagKind::Section(rest.to_string()),
            '^' => TagKind::Inversion(rest.to_string()),
            '/' => TagKind::Close(rest.to_string()),
            '>' => TagKind::Partial(rest.to_string()),
            '{' => {
                let name = rest.strip_suffix('}').unwrap_or(rest);
                TagKind::Unescaped(name.trim().to_string())
            }
            '&' => TagKind::Unescaped(rest.to_string()),
            '!' => TagKind::Comment(rest.to_string()),
            '%' => TagKind::Pragma(rest.to_string()),
            _ => TagKind::Escaped(command.to_string()),
        }
    }

    fn is_control(&self) -> bool {
        matches!(
            self,
            TagKind::Section(_) | TagKind::Inversion(_) | TagKind::Close(_)
        )
    }
}

/// Non-fatal findings collected while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnsupportedPragma { pragma: String, line: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnsupportedPragma { pragma, line } => {
                write!(f, "pragma '{pragma}' at line {line} is unsupported")
            }
        }
    }
}

/// Parser result: the node tree plus any warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutput {
    pub nodes: Vec<Node>,
    pub warnings: Vec<Warning>,
}

/// Parse a token stream into a node tree.
pub fn parse(tokens: Vec<Token>) -> Result<ParseOutput, StructuralError> {
    let items: Vec<Item> = tokens.into_iter().map(Item::from).collect();
    let items = elide_standalone_lines(items);
    let mut parser = Parser {
        items: items.into_iter(),
        stack: Vec::new(),
        line: 1,
        warnings: Vec::new(),
    };
    let nodes = parser.block()?;
    Ok(ParseOutput {
        nodes,
        warnings: parser.warnings,
    })
}

// ---------------------------------------------------------------------------
// Classified tokens
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Item {
    Text(String),
    Newline,
    Tag { kind: TagKind, line: usize },
}

impl From<Token> for Item {
    fn from(token: Token) -> Self {
        match token {
            Token::Text(text) => Item::Text(text),
            Token::Newline => Item::Newline,
            Token::Tag { body, line } => Item::Tag {
                kind: TagKind::classify(&body),
                line,
            },
        }
    }
}

/// Indices of control tags whose partner sits on a different line.
fn multiline_control_tags(items: &[Item]) -> HashSet<usize> {
    let mut spanning = HashSet::new();
    let mut open: Vec<(usize, usize)> = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let Item::Tag { kind, line } = item else {
            continue;
        };
        match kind {
            TagKind::Section(_) | TagKind::Inversion(_) => open.push((idx, *line)),
            TagKind::Close(_) => {
                if let Some((start, start_line)) = open.pop() {
                    if start_line != *line {
                        spanning.insert(start);
                        spanning.insert(idx);
                    }
                }
            }
            _ => {}
        }
    }
    spanning
}

fn elide_standalone_lines(items: Vec<Item>) -> Vec<Item> {
    let spanning = multiline_control_tags(&items);
    let mut out = Vec::with_capacity(items.len());
    let mut line: Vec<(usize, Item)> = Vec::new();
    for (idx, item) in items.into_iter().enumerate() {
        let ends_line = matches!(item, Item::Newline);
        line.push((idx, item));
        if ends_line {
            flush_line(&mut line, &spanning, &mut out);
        }
    }
    flush_line(&mut line, &spanning, &mut out);
    out
}

fn flush_line(line: &mut Vec<(usize, Item)>, spanning: &HashSet<usize>, out: &mut Vec<Item>) {
    let standalone = is_standalone(line, spanning);
    for (_, item) in line.drain(..) {
        let blank = matches!(item, Item::Text(_) | Item::Newline);
        if !(standalone && blank) {
            out.push(item);
        }
    }
}

fn is_standalone(line: &[(usize, Item)], spanning: &HashSet<usize>) -> bool {
    let mut anchored = false;
    for (idx, item) in line {
        match item {
            Item::Newline => {}
            Item::Text(text) => {
                if !text.chars().all(|c| c == ' ' || c == '\t') {
                    return false;
                }
            }
            Item::Tag { kind, .. } if kind.is_control() => {
                anchored |= spanning.contains(idx);
            }
            Item::Tag { .. } => return false,
        }
    }
    anchored
}

// ---------------------------------------------------------------------------
// Tree building
// ---------------------------------------------------------------------------

struct Parser {
    items: std::vec::IntoIter<Item>,
    /// Open sections, innermost last, with the line each opened on.
    stack: Vec<(String, usize)>,
    line: usize,
    warnings: Vec<Warning>,
}

impl Parser {
    /// Parse until the innermost open section closes, or input ends.
    fn block(&mut self) -> Result<Vec<Node>, StructuralError> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.next() {
            let (kind, line) = match item {
                Item::Text(text) => {
                    push_text(&mut nodes, &text);
                    continue;
                }
                Item::Newline => {
                    push_text(&mut nodes, "\n");
                    continue;
                }
                Item::Tag { kind, line } => (kind, line),
            };
            self.line = line;

            match kind {
                TagKind::Section(name) => {
                    let (children, lines) = self.nested(&name, line)?;
                    nodes.push(Node::Section {
                        name,
                        children,
                        lines,
                    });
                }
                TagKind::Inversion(name) => {
                    let (children, lines) = self.nested(&name, line)?;
                    nodes.push(Node::Inversion {
                        name,
                        children,
                        lines,
                    });
                }
                TagKind::Close(found) => {
                    let Some((expected, _)) = self.stack.pop() else {
                        return Err(StructuralError::UnexpectedClose { found, line });
                    };
                    if expected != found {
                        return Err(StructuralError::Mismatched {
                            expected,
                            found,
                            line,
                        });
                    }
                    return Ok(nodes);
                }
                TagKind::Partial(name) => nodes.push(Node::Partial { name, line }),
                TagKind::Unescaped(path) => nodes.push(Node::Variable {
                    path,
                    escaped: false,
                    line,
                }),
                TagKind::Escaped(path) => nodes.push(Node::Variable {
                    path,
                    escaped: true,
                    line,
                }),
                TagKind::Comment(text) => nodes.push(Node::Comment { text, line }),
                TagKind::Pragma(pragma) => {
                    tracing::warn!(line, pragma = %pragma, "pragmas are unsupported");
                    self.warnings
                        .push(Warning::UnsupportedPragma { pragma, line });
                }
                TagKind::Empty => return Err(StructuralError::EmptyTag { line }),
            }
        }

        if let Some((name, line)) = self.stack.last() {
            return Err(StructuralError::Unclosed {
                name: name.clone(),
                line: *line,
            });
        }
        Ok(nodes)
    }

    fn nested(
        &mut self,
        name: &str,
        line: usize,
    ) -> Result<(Vec<Node>, RangeInclusive<usize>), StructuralError> {
        self.stack.push((name.to_string(), line));
        let children = self.block()?;
        Ok((children, line..=self.line))
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(last)) = nodes.last_mut() {
        last.push_str(text);
    } else {
        nodes.push(Node::Text(text.to_string()));
    }
}
