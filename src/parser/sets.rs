use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use crate::bnf::*;
use super::token_set::TermSet;

/// FIRST sets keyed by symbol. Terminals map to themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FirstSets {
  sets: BTreeMap<Symbol, TermSet>,
  pub(crate) passes: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FollowSets {
  sets: BTreeMap<Symbol, TermSet>,
  pub(crate) passes: usize,
}

pub(crate) fn gen_first(
  bnf: &Bnf,
) -> FirstSets {
  let mut first = FirstSets::seeded(bnf);
  while first.pass(bnf) {}
  log::debug!("first sets: {} symbols in {} passes", first.sets.len(), first.passes);
  first
}

pub(crate) fn gen_follow(
  bnf: &Bnf,
  first: &FirstSets,
) -> FollowSets {
  let mut follow = FollowSets::seeded(bnf);
  while follow.pass(bnf, first) {}
  log::debug!("follow sets: {} symbols in {} passes", follow.sets.len(), follow.passes);
  follow
}

impl FirstSets {
  fn seeded(bnf: &Bnf) -> Self {
    let mut sets = BTreeMap::new();
    for &(nt, builtin) in &bnf.builtins {
      sets.insert(Symbol::Nonterm(nt), builtin.first().into_iter().collect());
    }
    for prod in &bnf.prods {
      for sym in &prod.rhs {
        if let Symbol::Term(t) = sym {
          sets.insert(sym.clone(), TermSet::from_terminal(t.clone()));
        }
      }
    }
    FirstSets {
      sets,
      passes: 0,
    }
  }

  /// One propagation round over every production. Returns whether any set
  /// grew.
  pub(crate) fn pass(&mut self, bnf: &Bnf) -> bool {
    self.passes += 1;
    let mut changed = false;
    let mut buf = TermSet::new();
    for prod in &bnf.prods {
      buf.clone_from(self.get(&prod.rhs[0]));
      changed |= self.sets.entry(Symbol::Nonterm(prod.lhs))
        .or_default()
        .union_with(&buf);
    }
    changed
  }

  pub(crate) fn get(&self, sym: &Symbol) -> &TermSet {
    self.sets.get(sym).unwrap_or(&EMPTY)
  }

  pub(crate) fn iter(&self) -> impl Iterator<Item = (&Symbol, &TermSet)> + Clone {
    self.sets.iter()
  }
}

impl FollowSets {
  fn seeded(bnf: &Bnf) -> Self {
    let mut sets = BTreeMap::new();
    sets.insert(Symbol::Nonterm(bnf.start), TermSet::from_terminal(Terminal::End));
    FollowSets {
      sets,
      passes: 0,
    }
  }

  /// Both propagation rules over every production. Returns whether any set
  /// grew.
  pub(crate) fn pass(&mut self, bnf: &Bnf, first: &FirstSets) -> bool {
    self.passes += 1;
    let mut changed = false;

    // FOLLOW(B) absorbs FIRST(C) for every adjacent B C
    for prod in &bnf.prods {
      for pair in prod.rhs.windows(2) {
        changed |= self.sets.entry(pair[0].clone())
          .or_default()
          .union_with(first.get(&pair[1]));
      }
    }

    // FOLLOW(last) absorbs FOLLOW(lhs)
    let mut buf = TermSet::new();
    for prod in &bnf.prods {
      buf.clone_from(self.get(&Symbol::Nonterm(prod.lhs)));
      if let Some(last) = prod.rhs.last() {
        changed |= self.sets.entry(last.clone())
          .or_default()
          .union_with(&buf);
      }
    }

    changed
  }

  pub(crate) fn get(&self, sym: &Symbol) -> &TermSet {
    self.sets.get(sym).unwrap_or(&EMPTY)
  }

  pub(crate) fn iter(&self) -> impl Iterator<Item = (&Symbol, &TermSet)> + Clone {
    self.sets.iter()
  }
}

static EMPTY: TermSet = TermSet::EMPTY;

pub(crate) struct DisplaySets<'a, I> {
  bnf: &'a Bnf,
  sets: I,
}

pub(crate) fn display_sets<'a, I>(bnf: &'a Bnf, sets: I) -> DisplaySets<'a, I>
  where I: Iterator<Item = (&'a Symbol, &'a TermSet)> + Clone
{
  DisplaySets {
    bnf,
    sets,
  }
}

impl<'a, I> Display for DisplaySets<'a, I>
  where I: Iterator<Item = (&'a Symbol, &'a TermSet)> + Clone
{
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    for (sym, set) in self.sets.clone() {
      if let Symbol::Nonterm(_) = sym {
        writeln!(f, "{}: {}", self.bnf.display_symbol(sym), set)?;
      }
    }
    Ok(())
  }
}
