//! LR(1) table generator for byte-level grammars, with a push parser that
//! forks on every conflict instead of resolving it.

pub mod config;
pub mod error;
pub mod grammar;
pub mod parser;
mod bnf;

pub use bnf::{NontermId, ProdId, Terminal, END_COLUMN};
pub use config::Config;
pub use error::{BuildError, GrammarError, Lookahead, ParseRejected, Position, SyntaxError};
pub use grammar::Grammar;
pub use parser::{Action, Engine, ParseTable, Parser, StateId, TermSet};

pub fn build(grammar: Grammar) -> Result<Parser, BuildError> {
  Parser::new(grammar, Config::default())
}

pub fn build_with(grammar: Grammar, config: Config) -> Result<Parser, BuildError> {
  Parser::new(grammar, config)
}
