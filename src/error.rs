use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;
use crate::parser::state::StateId;

/// A grammar that breaks the flat-form contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
  #[error("rule `{rule}` refers to undefined nonterminal `{name}`")]
  UndefinedNonterminal { rule: String, name: String },
  #[error("start symbol `{0}` has no productions")]
  UndefinedStart(String),
  #[error("rule `{0}` has an empty right-hand side")]
  EmptyProduction(String),
  #[error("byte range %x{lo:02X}-{hi:02X} is empty")]
  EmptyRange { lo: u8, hi: u8 },
  #[error("rule `{0}` has an empty byte set")]
  EmptyChoice(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  #[error(transparent)]
  Grammar(#[from] GrammarError),
  /// An item that still expects a symbol has no goto target.
  #[error("internal error: no goto target for item `{item}` in state {state}")]
  ConstructionDefect { state: StateId, item: String },
}

/// Where the engine was in the input when something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
  /// bytes consumed so far
  pub offset: usize,
  /// 1-based
  pub line: usize,
  /// 1-based
  pub column: usize,
}

/// Input symbol the engine was looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookahead {
  Byte(u8),
  End,
}

/// A speculative path died: the state on its stack had no action for the
/// lookahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
  pub position: Position,
  pub found: Lookahead,
  pub state: StateId,
  /// hint of `state`, shared with the table
  pub expected: Arc<str>,
}

/// Every path was pruned before any accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("input rejected with {} diagnostic(s)", .errors.len())]
pub struct ParseRejected {
  pub errors: Vec<SyntaxError>,
}

impl Display for Position {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "line {}, column {}", self.line, self.column)
  }
}

impl Display for Lookahead {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Lookahead::Byte(b) => write!(f, "{}", crate::bnf::Terminal::Byte(*b)),
      Lookahead::End => write!(f, "end of input"),
    }
  }
}

impl Display for SyntaxError {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}: expecting {}", self.position, self.expected)
  }
}

impl std::error::Error for SyntaxError {}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn messages() {
    let err = SyntaxError {
      position: Position { offset: 4, line: 2, column: 3 },
      found: Lookahead::Byte(b'c'),
      state: StateId(7),
      expected: Arc::from("'a' | 'b'"),
    };
    assert_eq!(err.to_string(), "line 2, column 3: expecting 'a' | 'b'");
    assert_eq!(Lookahead::End.to_string(), "end of input");
    assert_eq!(
      BuildError::from(GrammarError::EmptyRange { lo: 0x39, hi: 0x30 }).to_string(),
      "byte range %x39-30 is empty");
    assert_eq!(
      ParseRejected { errors: vec![err] }.to_string(),
      "input rejected with 1 diagnostic(s)");
  }
}
