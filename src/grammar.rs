//! Builder for flat grammars: a start symbol plus an ordered list of
//! productions whose right-hand sides are already free of alternation,
//! repetition and epsilon.

use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone)]
pub struct Grammar {
  pub(crate) start: String,
  pub(crate) prods: Vec<(String, Vec<Rhs>)>,
  pub(crate) base: u32,
}

/// One entry of a right-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rhs(pub(crate) RhsVariant);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RhsVariant {
  Lit(u8),
  Range(u8, u8),
  Choice(Vec<u8>),
  Sym(String),
}

pub fn lit(
  byte: u8,
) -> Rhs {
  Rhs(RhsVariant::Lit(byte))
}

/// A run of literal bytes, one entry per byte.
pub fn text(
  s: &str,
) -> Vec<Rhs> {
  s.bytes().map(lit).collect()
}

/// Inclusive byte range.
pub fn range(
  lo: u8,
  hi: u8,
) -> Rhs {
  Rhs(RhsVariant::Range(lo, hi))
}

/// Any one of the given bytes. Duplicates are dropped and the set is sorted.
pub fn one_of(
  bytes: &[u8],
) -> Rhs {
  let mut bytes = bytes.to_vec();
  bytes.sort_unstable();
  bytes.dedup();
  Rhs(RhsVariant::Choice(bytes))
}

pub fn sym(
  name: impl Into<String>,
) -> Rhs {
  Rhs(RhsVariant::Sym(name.into()))
}

impl From<u8> for Rhs {
  fn from(byte: u8) -> Rhs {
    lit(byte)
  }
}

impl From<&str> for Rhs {
  fn from(name: &str) -> Rhs {
    sym(name)
  }
}

pub fn grammar<R>(
  start: &str,
  prods: impl IntoIterator<Item = (&'static str, R)>,
) -> Grammar
  where R: IntoIterator<Item = Rhs>
{
  prods.into_iter()
    .fold(Grammar::new(start), |g, (lhs, rhs)| g.prod(lhs, rhs))
}

impl Grammar {
  pub fn new(
    start: impl Into<String>,
  ) -> Self {
    Grammar {
      start: start.into(),
      prods: vec![],
      base: 0,
    }
  }

  /// Appends a production. Alternatives of one nonterminal keep the order
  /// in which they are added.
  pub fn prod(
    mut self,
    lhs: impl Into<String>,
    rhs: impl IntoIterator<Item = Rhs>,
  ) -> Self {
    self.prods.push((lhs.into(), rhs.into_iter().collect()));
    self
  }

  /// Id given to the first production; later ones count up from it.
  pub fn production_base(mut self, base: u32) -> Self {
    self.base = base;
    self
  }

  pub fn start(&self) -> &str {
    &self.start
  }

  pub fn len(&self) -> usize {
    self.prods.len()
  }

  pub fn is_empty(&self) -> bool {
    self.prods.is_empty()
  }
}

impl Display for Rhs {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match &self.0 {
      RhsVariant::Lit(b) => write_byte(f, *b),
      RhsVariant::Range(lo, hi) => write!(f, "%x{:02X}-{:02X}", lo, hi),
      RhsVariant::Choice(bytes) => {
        write!(f, "(")?;
        for (i, b) in bytes.iter().enumerate() {
          if i > 0 {
            write!(f, " | ")?;
          }
          write_byte(f, *b)?;
        }
        write!(f, ")")
      }
      RhsVariant::Sym(name) => write!(f, "{}", name),
    }
  }
}

impl Display for Grammar {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    for (lhs, rhs) in &self.prods {
      write!(f, "{} ->", lhs)?;
      for r in rhs {
        write!(f, " {}", r)?;
      }
      writeln!(f)?;
    }
    Ok(())
  }
}

pub(crate) fn write_byte(f: &mut Formatter, b: u8) -> fmt::Result {
  if b.is_ascii_graphic() || b == b' ' {
    write!(f, "'{}'", b as char)
  } else {
    write!(f, "%x{:02X}", b)
  }
}
