use std::fmt::{self, Debug, Formatter};
use crate::bnf::{Terminal, END_COLUMN};

type Block = u64;

const BLOCK_BITS: usize = Block::BITS as usize;

/// Number of terminal columns: every byte plus end-of-input.
pub const TERMINAL_COLUMNS: usize = END_COLUMN + 1;

const BLOCKS: usize = (TERMINAL_COLUMNS + BLOCK_BITS - 1) / BLOCK_BITS;

/// Set of terminal columns, used to spread a terminal category over the
/// action table.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ColumnSet {
  blocks: [Block; BLOCKS],
}

impl ColumnSet {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_terminal(t: &Terminal) -> Self {
    let mut s = Self::new();
    match t {
      Terminal::Byte(b) => s.insert(*b as usize),
      Terminal::Range(lo, hi) => (*lo..=*hi).for_each(|b| s.insert(b as usize)),
      Terminal::Choice(bytes) => bytes.iter().for_each(|&b| s.insert(b as usize)),
      Terminal::End => s.insert(END_COLUMN),
    }
    s
  }

  pub fn insert(&mut self, column: usize) {
    self.blocks[column / BLOCK_BITS] |= 1 << (column % BLOCK_BITS);
  }

  #[cfg(test)]
  pub fn contains(&self, column: usize) -> bool {
    column < TERMINAL_COLUMNS
      && self.blocks[column / BLOCK_BITS] >> (column % BLOCK_BITS) & 1 == 1
  }

  /// Returns whether the set has changed.
  pub fn union_with(&mut self, other: &ColumnSet) -> bool {
    let before = self.blocks;
    for (block, theirs) in self.blocks.iter_mut().zip(other.blocks) {
      *block |= theirs;
    }
    before != self.blocks
  }

  pub fn iter(&self) -> Columns {
    Columns {
      blocks: self.blocks,
      index: 0,
    }
  }
}

/// Ascending columns of a [`ColumnSet`].
pub struct Columns {
  blocks: [Block; BLOCKS],
  index: usize,
}

impl Iterator for Columns {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    while self.index < BLOCKS {
      let block = &mut self.blocks[self.index];
      if *block != 0 {
        let bit = block.trailing_zeros() as usize;
        *block &= *block - 1;
        return Some(self.index * BLOCK_BITS + bit);
      }
      self.index += 1;
    }
    None
  }
}

impl Debug for ColumnSet {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    f.debug_set().entries(self.iter()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn insert() {
    let mut set = ColumnSet::new();

    set.insert(7);
    set.insert(3);
    set.insert(7);
    set.insert(130);

    assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 7, 130]);
    assert!(set.contains(130));
    assert!(!set.contains(4));
    assert!(!set.contains(TERMINAL_COLUMNS));
  }

  #[test]
  fn terminal_columns() {
    let range = ColumnSet::from_terminal(&Terminal::Range(0x30, 0x32));
    assert_eq!(range.iter().collect::<Vec<_>>(), vec![0x30, 0x31, 0x32]);

    let mut set = ColumnSet::from_terminal(&Terminal::Byte(0xFF));
    assert!(set.union_with(&ColumnSet::from_terminal(&Terminal::End)));
    assert!(!set.union_with(&ColumnSet::from_terminal(&Terminal::End)));
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![0xFF, END_COLUMN]);
  }
}
