use std::fmt::{self, Display, Formatter};
use indexmap::IndexMap;
use crate::error::GrammarError;
use crate::grammar::{self, Grammar, Rhs, RhsVariant};

/// Column of the end-of-input pseudo terminal.
pub const END_COLUMN: usize = 256;
/// Column of the synthetic start nonterminal added by augmentation.
pub const START_COLUMN: usize = 257;
/// First column handed out to grammar nonterminals.
pub const FIRST_NONTERM_COLUMN: usize = 258;

pub(crate) const START_NAME: &str = "<start>";

/// Flat grammar with every name resolved to an id.
#[derive(Clone)]
pub(crate) struct Bnf {
  /// nonterminal name -> id, in order of first definition
  pub(crate) names: IndexMap<String, NontermId>,
  pub(crate) start: NontermId,
  pub(crate) prods: Vec<Production>,
  /// alternatives per nonterminal, indexed by `NontermId::index`
  pub(crate) alts: Vec<Vec<ProdIx>>,
  pub(crate) base: u32,
  /// character classes the grammar used without defining them
  pub(crate) builtins: Vec<(NontermId, Builtin)>,
  /// index of the synthetic start production, once augmented
  pub(crate) augmented: Option<ProdIx>,
}

/// A terminal category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Terminal {
  Byte(u8),
  /// inclusive
  Range(u8, u8),
  /// sorted, deduplicated
  Choice(Box<[u8]>),
  End,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Symbol {
  Term(Terminal),
  Nonterm(NontermId),
}

/// Nonterminal id; the value is also its table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NontermId(pub u32);

/// Public production id, `base + index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProdId(pub u32);

/// Position of a production inside `Bnf::prods`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ProdIx(pub(crate) u32);

#[derive(Clone, Debug)]
pub(crate) struct Production {
  pub(crate) lhs: NontermId,
  /// non-empty
  pub(crate) rhs: Vec<Symbol>,
  pub(crate) id: ProdId,
}

impl NontermId {
  pub const START: NontermId = NontermId(START_COLUMN as u32);

  pub fn column(self) -> usize {
    self.0 as usize
  }

  pub(crate) fn index(self) -> usize {
    self.0 as usize - START_COLUMN
  }
}

impl Terminal {
  /// Whether the category admits the given column.
  pub fn covers(&self, column: usize) -> bool {
    match self {
      Terminal::Byte(b) => column == *b as usize,
      Terminal::Range(lo, hi) => (*lo as usize..=*hi as usize).contains(&column),
      Terminal::Choice(bytes) => column < END_COLUMN
        && bytes.binary_search(&(column as u8)).is_ok(),
      Terminal::End => column == END_COLUMN,
    }
  }
}

impl Bnf {
  pub(crate) fn prod(&self, ix: ProdIx) -> &Production {
    &self.prods[ix.0 as usize]
  }

  pub(crate) fn alternatives(&self, nt: NontermId) -> &[ProdIx] {
    self.alts.get(nt.index()).map_or(&[], |alts| &alts[..])
  }

  pub(crate) fn nonterm_count(&self) -> usize {
    self.alts.len()
  }

  /// Names indexed by `NontermId::index`, the start symbol first.
  pub(crate) fn nonterm_names(&self) -> Vec<String> {
    let mut names = vec![String::new(); self.alts.len()];
    names[0] = START_NAME.to_owned();
    for (name, id) in &self.names {
      names[id.index()] = name.clone();
    }
    names
  }

  pub(crate) fn name(&self, nt: NontermId) -> &str {
    if nt == NontermId::START {
      return START_NAME;
    }
    self.names.get_index(nt.index() - 1).map_or("?", |(name, _)| name)
  }

  /// Copy of the grammar closed by `<start> -> S`.
  pub(crate) fn augment(&self) -> Bnf {
    let mut bnf = self.clone();
    let ix = ProdIx(bnf.prods.len() as u32);
    bnf.prods.push(Production {
      lhs: NontermId::START,
      rhs: vec![Symbol::Nonterm(self.start)],
      id: ProdId(self.base + ix.0),
    });
    bnf.alts[0].push(ix);
    bnf.augmented = Some(ix);
    bnf
  }

  pub(crate) fn is_augmented(&self, ix: ProdIx) -> bool {
    self.augmented == Some(ix)
  }

  pub(crate) fn display_symbol<'a>(&'a self, sym: &'a Symbol) -> DisplaySymbol<'a> {
    DisplaySymbol {
      bnf: self,
      sym,
    }
  }
}

pub(crate) struct DisplaySymbol<'a> {
  bnf: &'a Bnf,
  sym: &'a Symbol,
}

impl Display for DisplaySymbol<'_> {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self.sym {
      Symbol::Term(t) => write!(f, "{}", t),
      Symbol::Nonterm(nt) => write!(f, "{}", self.bnf.name(*nt)),
    }
  }
}

impl Display for Terminal {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Terminal::Byte(b) => grammar::write_byte(f, *b),
      Terminal::Range(lo, hi) => write!(f, "%x{:02X}-{:02X}", lo, hi),
      Terminal::Choice(bytes) => {
        write!(f, "(")?;
        for (i, b) in bytes.iter().enumerate() {
          if i > 0 {
            write!(f, " | ")?;
          }
          grammar::write_byte(f, *b)?;
        }
        write!(f, ")")
      }
      Terminal::End => write!(f, "end of input"),
    }
  }
}

impl Display for Bnf {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    for prod in &self.prods {
      write!(f, "{}: {} ->", prod.id.0, self.name(prod.lhs))?;
      for sym in &prod.rhs {
        write!(f, " {}", self.display_symbol(sym))?;
      }
      writeln!(f)?;
    }
    Ok(())
  }
}

/// Character classes a grammar may use without defining them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
  Alpha,
  Bit,
  Crlf,
  Ctl,
  Digit,
  Dquote,
  Hexdig,
  Vchar,
  Wsp,
}

impl Builtin {
  pub(crate) fn from_name(name: &str) -> Option<Builtin> {
    Some(match name {
      "ALPHA" => Builtin::Alpha,
      "BIT" => Builtin::Bit,
      "CRLF" => Builtin::Crlf,
      "CTL" => Builtin::Ctl,
      "DIGIT" => Builtin::Digit,
      "DQUOTE" => Builtin::Dquote,
      "HEXDIG" => Builtin::Hexdig,
      "VCHAR" => Builtin::Vchar,
      "WSP" => Builtin::Wsp,
      _ => return None,
    })
  }

  pub(crate) fn alternatives(self) -> Vec<Vec<Terminal>> {
    use Terminal::*;
    match self {
      Builtin::Alpha => vec![vec![Range(0x41, 0x5A)], vec![Range(0x61, 0x7A)]],
      Builtin::Bit => vec![vec![Choice(Box::new([b'0', b'1']))]],
      Builtin::Crlf => vec![vec![Byte(0x0D), Byte(0x0A)]],
      Builtin::Ctl => vec![vec![Range(0x00, 0x1F)], vec![Byte(0x7F)]],
      Builtin::Digit => vec![vec![Range(0x30, 0x39)]],
      Builtin::Dquote => vec![vec![Byte(0x22)]],
      Builtin::Hexdig => vec![
        vec![Range(0x30, 0x39)],
        vec![Range(0x41, 0x46)],
        vec![Range(0x61, 0x66)],
      ],
      Builtin::Vchar => vec![vec![Range(0x21, 0x7E)]],
      Builtin::Wsp => vec![vec![Choice(Box::new([0x09, 0x20]))]],
    }
  }

  /// Terminals that can begin the class.
  pub(crate) fn first(self) -> Vec<Terminal> {
    self.alternatives()
      .into_iter()
      .filter_map(|alt| alt.into_iter().next())
      .collect()
  }
}

impl TryFrom<Grammar> for Bnf {
  type Error = GrammarError;

  fn try_from(grammar: Grammar) -> Result<Bnf, GrammarError> {
    let mut names = IndexMap::new();
    for (lhs, _) in &grammar.prods {
      let next = NontermId((FIRST_NONTERM_COLUMN + names.len()) as u32);
      names.entry(lhs.clone()).or_insert(next);
    }

    // referenced but undefined names: built-ins get productions, others fail
    let mut builtins = vec![];
    for (lhs, rhs) in &grammar.prods {
      if rhs.is_empty() {
        return Err(GrammarError::EmptyProduction(lhs.clone()));
      }
      for Rhs(r) in rhs {
        let RhsVariant::Sym(name) = r else { continue };
        if names.contains_key(name) {
          continue;
        }
        let builtin = Builtin::from_name(name)
          .ok_or_else(|| GrammarError::UndefinedNonterminal {
            rule: lhs.clone(),
            name: name.clone(),
          })?;
        let next = NontermId((FIRST_NONTERM_COLUMN + names.len()) as u32);
        names.insert(name.clone(), next);
        builtins.push((next, builtin));
      }
    }

    let start = *names.get(&grammar.start)
      .ok_or_else(|| GrammarError::UndefinedStart(grammar.start.clone()))?;

    let mut prods = Vec::with_capacity(grammar.prods.len());
    for (lhs, rhs) in &grammar.prods {
      let rhs = rhs.iter()
        .map(|Rhs(r)| gen_sym(&names, lhs, r))
        .collect::<Result<Vec<_>, _>>()?;
      prods.push((names[lhs], rhs));
    }
    for &(nt, builtin) in &builtins {
      for alt in builtin.alternatives() {
        prods.push((nt, alt.into_iter().map(Symbol::Term).collect()));
      }
    }

    let mut alts = vec![vec![]; names.len() + 1];
    let prods = prods.into_iter()
      .enumerate()
      .map(|(i, (lhs, rhs))| {
        alts[lhs.index()].push(ProdIx(i as u32));
        Production {
          lhs,
          rhs,
          id: ProdId(grammar.base + i as u32),
        }
      })
      .collect();

    Ok(Bnf {
      names,
      start,
      prods,
      alts,
      base: grammar.base,
      builtins,
      augmented: None,
    })
  }
}

fn gen_sym(
  names: &IndexMap<String, NontermId>,
  rule: &str,
  rhs: &RhsVariant,
) -> Result<Symbol, GrammarError> {
  Ok(match rhs {
    RhsVariant::Lit(b) => Symbol::Term(Terminal::Byte(*b)),
    RhsVariant::Range(lo, hi) if lo > hi => {
      return Err(GrammarError::EmptyRange { lo: *lo, hi: *hi });
    }
    RhsVariant::Range(lo, hi) if lo == hi => Symbol::Term(Terminal::Byte(*lo)),
    RhsVariant::Range(lo, hi) => Symbol::Term(Terminal::Range(*lo, *hi)),
    RhsVariant::Choice(bytes) => match bytes[..] {
      [] => return Err(GrammarError::EmptyChoice(rule.to_owned())),
      [b] => Symbol::Term(Terminal::Byte(b)),
      _ => Symbol::Term(Terminal::Choice(bytes.clone().into_boxed_slice())),
    },
    RhsVariant::Sym(name) => Symbol::Nonterm(names[name]),
  })
}

#[cfg(test)]
impl Bnf {
  pub(crate) fn parse(grammar: Grammar) -> Bnf {
    Bnf::try_from(grammar).unwrap()
  }

  pub(crate) fn id(&self, name: &str) -> NontermId {
    self.names[name]
  }
}
