use crate::bnf::{Bnf, Symbol};
use crate::config::Config;
use crate::error::{BuildError, ParseRejected};
use crate::grammar::Grammar;

pub(crate) mod bitset;
pub(crate) mod engine;
pub(crate) mod sets;
pub(crate) mod state;
pub(crate) mod table;
pub(crate) mod token_set;

pub use engine::{parse, Engine};
pub use state::StateId;
pub use table::{Action, ParseTable, ProductionInfo};
pub use token_set::TermSet;

use sets::{FirstSets, FollowSets};

/// A compiled grammar: the action table plus the sets it was derived from.
pub struct Parser {
  bnf: Bnf,
  first: FirstSets,
  follow: FollowSets,
  table: ParseTable,
  config: Config,
}

impl Parser {
  pub(crate) fn new(grammar: Grammar, config: Config) -> Result<Self, BuildError> {
    let bnf = Bnf::try_from(grammar)?;
    log::debug!(
      "grammar: {} productions, {} nonterminals",
      bnf.prods.len(),
      bnf.names.len());
    log::trace!("productions:\n{}", bnf);

    let first = sets::gen_first(&bnf);
    log::trace!("first:\n{}", sets::display_sets(&bnf, first.iter()));
    let follow = sets::gen_follow(&bnf, &first);
    log::trace!("follow:\n{}", sets::display_sets(&bnf, follow.iter()));

    let automaton = state::gen_states(&bnf, &first)?;
    let table = table::gen_table(&automaton)?;

    Ok(Parser {
      bnf,
      first,
      follow,
      table,
      config,
    })
  }

  pub fn table(&self) -> &ParseTable {
    &self.table
  }

  pub fn engine(&self) -> Engine<'_> {
    Engine::new(&self.table, self.config.clone())
  }

  pub fn parse(&self, input: &[u8]) -> Result<usize, ParseRejected> {
    parse(&self.table, input, &self.config)
  }

  /// FIRST set of a nonterminal.
  pub fn first(&self, nonterminal: &str) -> Option<&TermSet> {
    let &id = self.bnf.names.get(nonterminal)?;
    Some(self.first.get(&Symbol::Nonterm(id)))
  }

  /// FOLLOW set of a nonterminal.
  pub fn follow(&self, nonterminal: &str) -> Option<&TermSet> {
    let &id = self.bnf.names.get(nonterminal)?;
    Some(self.follow.get(&Symbol::Nonterm(id)))
  }
}
