use std::collections::BTreeSet;
use std::fmt::{self, Debug, Display, Formatter};
use indexmap::IndexSet;
use crate::bnf::Terminal;

/// Ordered set of terminal categories.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermSet {
  set: BTreeSet<Terminal>,
}

impl TermSet {
  pub const EMPTY: TermSet = TermSet {
    set: BTreeSet::new(),
  };

  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_terminal(t: Terminal) -> Self {
    let mut s = Self::new();
    s.insert(t);
    s
  }

  pub fn insert(&mut self, t: Terminal) -> bool {
    self.set.insert(t)
  }

  /// Returns whether the set has changed.
  pub fn union_with(&mut self, other: &TermSet) -> bool {
    let len = self.set.len();
    self.set.extend(other.set.iter().cloned());
    len != self.set.len()
  }

  pub fn contains(&self, t: &Terminal) -> bool {
    self.set.contains(t)
  }

  pub fn len(&self) -> usize {
    self.set.len()
  }

  pub fn is_empty(&self) -> bool {
    self.set.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Terminal> {
    self.set.iter()
  }
}

impl FromIterator<Terminal> for TermSet {
  fn from_iter<I: IntoIterator<Item = Terminal>>(iter: I) -> Self {
    TermSet {
      set: iter.into_iter().collect(),
    }
  }
}

impl Debug for TermSet {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    f.debug_set().entries(self.set.iter()).finish()
  }
}

/// Renders as `a | b | c`.
impl Display for TermSet {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    for (i, t) in self.set.iter().enumerate() {
      if i > 0 {
        write!(f, " | ")?;
      }
      write!(f, "{}", t)?;
    }
    Ok(())
  }
}

/// Handle to a lookahead set stored in `Lookaheads`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub(crate) struct LaId(pub(crate) u32);

/// Arena of lookahead sets shared by every item of an automaton.
///
/// Sets are interned, so two handles are equal exactly when the sets are
/// equal by value and items can compare lookaheads through their handles.
#[derive(Default)]
pub(crate) struct Lookaheads {
  sets: IndexSet<TermSet>,
}

impl Lookaheads {
  pub(crate) fn intern(&mut self, set: TermSet) -> LaId {
    LaId(self.sets.insert_full(set).0 as u32)
  }

  pub(crate) fn get(&self, id: LaId) -> &TermSet {
    &self.sets[id.0 as usize]
  }

  pub(crate) fn len(&self) -> usize {
    self.sets.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn union() {
    let mut set = TermSet::from_terminal(Terminal::Byte(b'b'));

    assert!(set.union_with(&[Terminal::End, Terminal::Byte(b'a')].into_iter().collect()));
    assert!(!set.union_with(&TermSet::from_terminal(Terminal::End)));

    let vec = set.iter().cloned().collect::<Vec<_>>();
    assert_eq!(vec, vec![Terminal::Byte(b'a'), Terminal::Byte(b'b'), Terminal::End]);
    assert_eq!(set.to_string(), "'a' | 'b' | end of input");
  }

  #[test]
  fn interning_shares_equal_sets() {
    let mut arena = Lookaheads::default();
    let a = arena.intern(TermSet::from_terminal(Terminal::End));
    let b = arena.intern(TermSet::from_terminal(Terminal::Byte(0)));
    let c = arena.intern(TermSet::from_terminal(Terminal::End));

    assert_eq!(a, c);
    assert_ne!(a, b);
    assert_eq!(arena.len(), 2);
    assert!(arena.get(b).contains(&Terminal::Byte(0)));
  }
}
