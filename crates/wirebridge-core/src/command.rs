//! # Command Grammar
//!
//! Turns one raw command line into a typed [`Command`].
//!
//! ```text
//! line    := verb (sep arg)*
//! sep     := (' ' | '\t' | ',')+
//! arg     := bare | quoted
//! quoted  := '"' (char | '\"' | '\\')* '"'
//! ```
//!
//! Verbs are case-insensitive. Parsing never touches the document: a line
//! that fails here is answered with a `ParseError` and goes no further.

use crate::primitives::COMMENT_PREFIX;
use crate::{BridgeError, NodeId, ParamValue, Position};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// TOKENS
// =============================================================================

/// One argument as written on the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    /// Whether any part of the token was inside double quotes.
    pub quoted: bool,
}

/// Split a line into tokens on whitespace and commas, honoring quotes.
pub fn tokenize(line: &str) -> Result<Vec<Token>, BridgeError> {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                let token = current.get_or_insert_with(|| Token {
                    text: String::new(),
                    quoted: true,
                });
                token.quoted = true;
                let mut closed = false;
                while let Some(inner) = chars.next() {
                    match inner {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => token.text.push(escaped),
                            Some(other) => {
                                token.text.push('\\');
                                token.text.push(other);
                            }
                            None => token.text.push('\\'),
                        },
                        other => token.text.push(other),
                    }
                }
                if !closed {
                    return Err(BridgeError::Parse("unterminated quoted string".to_string()));
                }
            }
            c if c.is_whitespace() || c == ',' => {
                if let Some(token) = current.take() {
                    tokens.push(token);
                }
            }
            c => current
                .get_or_insert_with(|| Token {
                    text: String::new(),
                    quoted: false,
                })
                .text
                .push(c),
        }
    }
    if let Some(token) = current {
        tokens.push(token);
    }
    Ok(tokens)
}

/// Whether the transport should skip the line without answering.
#[must_use]
pub fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX)
}

// =============================================================================
// VERBS
// =============================================================================

/// Every verb the grammar knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verb {
    Add,
    Remove,
    Move,
    Wire,
    Unwire,
    Set,
    List,
    Connections,
    Search,
    Params,
    Catalog,
    Export,
    Clear,
    Ping,
    AssertExists,
    AssertCount,
    AssertConnection,
    AssertParam,
}

impl Verb {
    pub const ALL: [Self; 18] = [
        Self::Add,
        Self::Remove,
        Self::Move,
        Self::Wire,
        Self::Unwire,
        Self::Set,
        Self::List,
        Self::Connections,
        Self::Search,
        Self::Params,
        Self::Catalog,
        Self::Export,
        Self::Clear,
        Self::Ping,
        Self::AssertExists,
        Self::AssertCount,
        Self::AssertConnection,
        Self::AssertParam,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Move => "move",
            Self::Wire => "wire",
            Self::Unwire => "unwire",
            Self::Set => "set",
            Self::List => "list",
            Self::Connections => "connections",
            Self::Search => "search",
            Self::Params => "params",
            Self::Catalog => "catalog",
            Self::Export => "export",
            Self::Clear => "clear",
            Self::Ping => "ping",
            Self::AssertExists => "assert_exists",
            Self::AssertCount => "assert_count",
            Self::AssertConnection => "assert_connection",
            Self::AssertParam => "assert_param",
        }
    }

    /// Usage line shown in arity errors.
    #[must_use]
    pub const fn usage(self) -> &'static str {
        match self {
            Self::Add => "add <type> <x> <y>",
            Self::Remove => "remove <node>",
            Self::Move => "move <node> <x> <y>",
            Self::Wire => "wire <source> <target> [<source_param> <target_param>]",
            Self::Unwire => "unwire <source> <target> [<source_param> <target_param>]",
            Self::Set => "set <node> <param> <value>",
            Self::List => "list",
            Self::Connections => "connections",
            Self::Search => "search <query>",
            Self::Params => "params <node>",
            Self::Catalog => "catalog",
            Self::Export => "export",
            Self::Clear => "clear",
            Self::Ping => "ping",
            Self::AssertExists => "assert_exists <node>",
            Self::AssertCount => "assert_count <n>",
            Self::AssertConnection => "assert_connection <source> <target>",
            Self::AssertParam => "assert_param <node> <param> <value>",
        }
    }

    /// Whether commands with this verb can change the document.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Remove | Self::Move | Self::Wire | Self::Unwire | Self::Set | Self::Clear
        )
    }
}

impl FromStr for Verb {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.name() == lower)
            .ok_or_else(|| BridgeError::Parse(format!("unknown command '{}'", s)))
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// COMMAND
// =============================================================================

/// Explicit source/target parameter names for `wire`/`unwire`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamPair {
    pub source: String,
    pub target: String,
}

/// A parsed request. One variant per verb.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add {
        type_name: String,
        position: Position,
    },
    Remove {
        node: NodeId,
    },
    Move {
        node: NodeId,
        position: Position,
    },
    Wire {
        source: NodeId,
        target: NodeId,
        params: Option<ParamPair>,
    },
    Unwire {
        source: NodeId,
        target: NodeId,
        params: Option<ParamPair>,
    },
    Set {
        node: NodeId,
        param: String,
        value: ParamValue,
    },
    List,
    Connections,
    Search {
        query: String,
    },
    Params {
        node: NodeId,
    },
    Catalog,
    Export,
    Clear,
    Ping,
    AssertExists {
        node: NodeId,
    },
    AssertCount {
        expected: usize,
    },
    AssertConnection {
        source: NodeId,
        target: NodeId,
    },
    AssertParam {
        node: NodeId,
        param: String,
        expected: ParamValue,
    },
}

impl Command {
    #[must_use]
    pub const fn verb(&self) -> Verb {
        match self {
            Self::Add { .. } => Verb::Add,
            Self::Remove { .. } => Verb::Remove,
            Self::Move { .. } => Verb::Move,
            Self::Wire { .. } => Verb::Wire,
            Self::Unwire { .. } => Verb::Unwire,
            Self::Set { .. } => Verb::Set,
            Self::List => Verb::List,
            Self::Connections => Verb::Connections,
            Self::Search { .. } => Verb::Search,
            Self::Params { .. } => Verb::Params,
            Self::Catalog => Verb::Catalog,
            Self::Export => Verb::Export,
            Self::Clear => Verb::Clear,
            Self::Ping => Verb::Ping,
            Self::AssertExists { .. } => Verb::AssertExists,
            Self::AssertCount { .. } => Verb::AssertCount,
            Self::AssertConnection { .. } => Verb::AssertConnection,
            Self::AssertParam { .. } => Verb::AssertParam,
        }
    }
}

impl FromStr for Command {
    type Err = BridgeError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        parse_line(line)
    }
}

/// Parse one command line.
pub fn parse_line(line: &str) -> Result<Command, BridgeError> {
    let tokens = tokenize(line)?;
    let Some((head, args)) = tokens.split_first() else {
        return Err(BridgeError::Parse("empty command".to_string()));
    };
    if head.quoted {
        return Err(BridgeError::Parse(format!(
            "command verb must not be quoted: \"{}\"",
            head.text
        )));
    }
    let verb: Verb = head.text.parse()?;
    let args = Args { verb, args };

    let command = match verb {
        Verb::Add => {
            args.at_least(3)?;
            let split = args.len() - 2;
            let type_name = args.args[..split]
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            if type_name.trim().is_empty() {
                return Err(BridgeError::Parse("node type must not be empty".to_string()));
            }
            Command::Add {
                type_name,
                position: args.position(split)?,
            }
        }
        Verb::Remove => {
            args.exactly(1)?;
            Command::Remove {
                node: args.node(0)?,
            }
        }
        Verb::Move => {
            args.exactly(3)?;
            Command::Move {
                node: args.node(0)?,
                position: args.position(1)?,
            }
        }
        Verb::Wire | Verb::Unwire => {
            let params = match args.len() {
                2 => None,
                4 => Some(ParamPair {
                    source: args.text(2).to_string(),
                    target: args.text(3).to_string(),
                }),
                _ => return Err(args.arity_error()),
            };
            let source = args.node(0)?;
            let target = args.node(1)?;
            if verb == Verb::Wire {
                Command::Wire {
                    source,
                    target,
                    params,
                }
            } else {
                Command::Unwire {
                    source,
                    target,
                    params,
                }
            }
        }
        Verb::Set => {
            args.exactly(3)?;
            Command::Set {
                node: args.node(0)?,
                param: args.text(1).to_string(),
                value: args.value(2),
            }
        }
        Verb::List => {
            args.exactly(0)?;
            Command::List
        }
        Verb::Connections => {
            args.exactly(0)?;
            Command::Connections
        }
        Verb::Search => {
            args.at_least(1)?;
            Command::Search {
                query: args
                    .args
                    .iter()
                    .map(|t| t.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
            }
        }
        Verb::Params => {
            args.exactly(1)?;
            Command::Params {
                node: args.node(0)?,
            }
        }
        Verb::Catalog => {
            args.exactly(0)?;
            Command::Catalog
        }
        Verb::Export => {
            args.exactly(0)?;
            Command::Export
        }
        Verb::Clear => {
            args.exactly(0)?;
            Command::Clear
        }
        Verb::Ping => {
            args.exactly(0)?;
            Command::Ping
        }
        Verb::AssertExists => {
            args.exactly(1)?;
            Command::AssertExists {
                node: args.node(0)?,
            }
        }
        Verb::AssertCount => {
            args.exactly(1)?;
            let raw = args.text(0);
            let expected = raw.parse::<usize>().map_err(|_| {
                BridgeError::Parse(format!("count '{}' is not a non-negative integer", raw))
            })?;
            Command::AssertCount { expected }
        }
        Verb::AssertConnection => {
            args.exactly(2)?;
            Command::AssertConnection {
                source: args.node(0)?,
                target: args.node(1)?,
            }
        }
        Verb::AssertParam => {
            args.exactly(3)?;
            Command::AssertParam {
                node: args.node(0)?,
                param: args.text(1).to_string(),
                expected: args.value(2),
            }
        }
    };
    Ok(command)
}

/// Argument accessor bound to the verb, for uniform error messages.
struct Args<'a> {
    verb: Verb,
    args: &'a [Token],
}

impl Args<'_> {
    fn len(&self) -> usize {
        self.args.len()
    }

    fn arity_error(&self) -> BridgeError {
        BridgeError::Parse(format!(
            "wrong number of arguments for '{}' (got {}); usage: {}",
            self.verb,
            self.args.len(),
            self.verb.usage()
        ))
    }

    fn exactly(&self, n: usize) -> Result<(), BridgeError> {
        if self.args.len() == n {
            Ok(())
        } else {
            Err(self.arity_error())
        }
    }

    fn at_least(&self, n: usize) -> Result<(), BridgeError> {
        if self.args.len() >= n {
            Ok(())
        } else {
            Err(self.arity_error())
        }
    }

    /// Caller has checked arity.
    fn text(&self, i: usize) -> &str {
        self.args.get(i).map(|t| t.text.as_str()).unwrap_or_default()
    }

    fn node(&self, i: usize) -> Result<NodeId, BridgeError> {
        self.text(i).parse()
    }

    fn number(&self, i: usize, what: &str) -> Result<f64, BridgeError> {
        let raw = self.text(i);
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| BridgeError::Parse(format!("{} '{}' is not a number", what, raw)))
    }

    fn position(&self, i: usize) -> Result<Position, BridgeError> {
        Ok(Position::new(
            self.number(i, "x coordinate")?,
            self.number(i + 1, "y coordinate")?,
        ))
    }

    fn value(&self, i: usize) -> ParamValue {
        match self.args.get(i) {
            Some(t) if t.quoted => ParamValue::Text(t.text.clone()),
            Some(t) => ParamValue::from_literal(&t.text),
            None => ParamValue::Null,
        }
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// Quote an argument if the tokenizer would otherwise split or alter it.
fn quote(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || c == ',' || c == '"' || c == '\\');
    if needs_quotes {
        format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

/// Render a value so that parsing it back yields the same value.
fn render_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Text(s) => {
            if ParamValue::from_literal(s) == *value {
                quote(s)
            } else {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
        }
        // Debug keeps the fraction ("3.0"), so it does not reparse as an integer
        ParamValue::Number(n) => format!("{:?}", n),
        other => other.to_string(),
    }
}

/// Renders the command back into a line that parses to the same command.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.verb();
        match self {
            Self::Add {
                type_name,
                position,
            } => write!(f, "{} {} {} {}", verb, quote(type_name), position.x, position.y),
            Self::Move { node, position } => {
                write!(f, "{} {} {} {}", verb, node, position.x, position.y)
            }
            Self::Remove { node } | Self::Params { node } | Self::AssertExists { node } => {
                write!(f, "{} {}", verb, node)
            }
            Self::Wire {
                source,
                target,
                params,
            }
            | Self::Unwire {
                source,
                target,
                params,
            } => {
                write!(f, "{} {} {}", verb, source, target)?;
                if let Some(p) = params {
                    write!(f, " {} {}", quote(&p.source), quote(&p.target))?;
                }
                Ok(())
            }
            Self::Set { node, param, value }
            | Self::AssertParam {
                node,
                param,
                expected: value,
            } => write!(f, "{} {} {} {}", verb, node, quote(param), render_value(value)),
            Self::Search { query } => write!(f, "{} {}", verb, quote(query)),
            Self::AssertCount { expected } => write!(f, "{} {}", verb, expected),
            Self::AssertConnection { source, target } => {
                write!(f, "{} {} {}", verb, source, target)
            }
            Self::List
            | Self::Connections
            | Self::Catalog
            | Self::Export
            | Self::Clear
            | Self::Ping => write!(f, "{}", verb),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
