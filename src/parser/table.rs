use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use crate::bnf::*;
use crate::error::BuildError;
use crate::grammar::write_byte;
use super::bitset::ColumnSet;
use super::state::{Automaton, Item, State, StateId};
use super::token_set::TermSet;

/// One cell of the action table.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Action {
  #[default]
  Error,
  Shift(StateId),
  Reduce(ProdId),
  Goto(StateId),
  Accept,
  /// index into the conflict lists
  Conflict(u32),
}

/// What a reduce by one production needs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ProductionInfo {
  /// states to pop
  pub pop: usize,
  pub lhs: NontermId,
}

/// Compiled, immutable parse table.
#[derive(Clone, Debug)]
pub struct ParseTable {
  start: StateId,
  columns: usize,
  /// row-major, one row per state
  actions: Vec<Action>,
  conflicts: Vec<Vec<Action>>,
  prods: Vec<ProductionInfo>,
  base: u32,
  hints: Vec<Arc<str>>,
  /// nonterminal names by column - START_COLUMN
  names: Vec<String>,
}

pub(crate) fn gen_table(
  automaton: &Automaton,
) -> Result<ParseTable, BuildError> {
  let bnf = &automaton.bnf;
  let rows = automaton.states.len();
  let columns = START_COLUMN + bnf.nonterm_count();

  let mut table = ParseTable {
    start: automaton.start,
    columns,
    actions: vec![Action::Error; rows * columns],
    conflicts: vec![],
    prods: bnf.prods.iter()
      .map(|prod| ProductionInfo {
        pop: prod.rhs.len(),
        lhs: prod.lhs,
      })
      .collect(),
    base: bnf.base,
    hints: vec![Arc::from(""); rows],
    names: bnf.nonterm_names(),
  };

  for state in &automaton.states[1..] {
    let row = state.id.0 as usize;
    if let Some(kernel) = state.kernel() {
      table.hints[row] = gen_hint(automaton, state, kernel).into();
    }
    for item in &state.items {
      match automaton.next_symbol(item) {
        Some(sym) => {
          let target = item.goto.ok_or_else(|| BuildError::ConstructionDefect {
            state: state.id,
            item: automaton.display_item(item).to_string(),
          })?;
          match sym {
            Symbol::Term(t) => {
              for column in ColumnSet::from_terminal(t).iter() {
                table.set(row, column, Action::Shift(target));
              }
            }
            Symbol::Nonterm(nt) => table.set(row, nt.column(), Action::Goto(target)),
          }
        }
        None if bnf.is_augmented(item.prod) => {
          table.set(row, END_COLUMN, Action::Accept);
        }
        None => {
          let id = bnf.prod(item.prod).id;
          let mut columns = ColumnSet::new();
          for t in automaton.lookahead(item).iter() {
            columns.union_with(&ColumnSet::from_terminal(t));
          }
          for column in columns.iter() {
            table.set(row, column, Action::Reduce(id));
          }
        }
      }
    }
  }

  log::debug!(
    "action table: {} rows x {} columns, {} conflicts",
    rows, columns, table.conflicts.len());
  log::trace!("action table:\n{}", table);
  Ok(table)
}

/// What the state's kernel item wants next.
fn gen_hint(
  automaton: &Automaton,
  state: &State,
  kernel: &Item,
) -> String {
  match automaton.next_symbol(kernel) {
    Some(Symbol::Term(t)) => t.to_string(),
    Some(sym @ Symbol::Nonterm(_)) => {
      let name = automaton.bnf.display_symbol(sym);
      let shifts = state.items.iter()
        .filter_map(|item| match automaton.next_symbol(item) {
          Some(Symbol::Term(t)) => Some(t.clone()),
          _ => None,
        })
        .collect::<TermSet>();
      if shifts.is_empty() {
        name.to_string()
      } else {
        format!("{} ({})", name, shifts)
      }
    }
    None => automaton.lookahead(kernel).to_string(),
  }
}

impl ParseTable {
  /// Writes `action`, turning the cell into a conflict if it already holds
  /// a different one.
  fn set(&mut self, row: usize, column: usize, action: Action) {
    let cell = &mut self.actions[row * self.columns + column];
    match *cell {
      Action::Error => *cell = action,
      current if current == action => {}
      Action::Conflict(ix) => {
        let list = &mut self.conflicts[ix as usize];
        if !list.contains(&action) {
          list.push(action);
        }
      }
      current => {
        *cell = Action::Conflict(self.conflicts.len() as u32);
        self.conflicts.push(vec![current, action]);
      }
    }
  }

  /// State every parse begins in.
  pub fn start(&self) -> StateId {
    self.start
  }

  /// Out-of-range lookups are `Error`.
  pub fn action(&self, state: StateId, column: usize) -> Action {
    if column >= self.columns {
      return Action::Error;
    }
    self.actions.get(state.0 as usize * self.columns + column)
      .copied()
      .unwrap_or_default()
  }

  pub fn conflict(&self, ix: u32) -> &[Action] {
    self.conflicts.get(ix as usize).map_or(&[], |list| &list[..])
  }

  pub fn conflict_count(&self) -> usize {
    self.conflicts.len()
  }

  pub fn production(&self, id: ProdId) -> Option<ProductionInfo> {
    let ix = id.0.checked_sub(self.base)?;
    self.prods.get(ix as usize).copied()
  }

  /// Expected input in a state, for diagnostics.
  pub fn hint(&self, state: StateId) -> &str {
    self.hints.get(state.0 as usize).map_or("", |hint| &**hint)
  }

  pub(crate) fn shared_hint(&self, state: StateId) -> Arc<str> {
    self.hints.get(state.0 as usize).cloned().unwrap_or_else(|| Arc::from(""))
  }

  /// Rows, including the unused row 0.
  pub fn state_count(&self) -> usize {
    self.hints.len()
  }

  pub fn column_count(&self) -> usize {
    self.columns
  }

  pub fn nonterminal(&self, name: &str) -> Option<NontermId> {
    self.names.iter()
      .position(|n| n == name)
      .map(|ix| NontermId((START_COLUMN + ix) as u32))
  }

  fn write_column(&self, f: &mut Formatter, column: usize) -> fmt::Result {
    match column {
      0..=255 => write_byte(f, column as u8),
      END_COLUMN => write!(f, "$"),
      _ => write!(f, "{}", self.names[column - START_COLUMN]),
    }
  }
}

impl Display for Action {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    match self {
      Action::Error => write!(f, "err"),
      Action::Shift(s) => write!(f, "s{}", s),
      Action::Reduce(p) => write!(f, "r{}", p.0),
      Action::Goto(s) => write!(f, "g{}", s),
      Action::Accept => write!(f, "acc"),
      Action::Conflict(ix) => write!(f, "c{}", ix),
    }
  }
}

/// Non-error cells per row, then the conflict lists.
impl Display for ParseTable {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    for (row, cells) in self.actions.chunks(self.columns).enumerate().skip(1) {
      write!(f, "{}:", row)?;
      for (column, action) in cells.iter().enumerate() {
        if *action != Action::Error {
          write!(f, " ")?;
          self.write_column(f, column)?;
          write!(f, "={}", action)?;
        }
      }
      writeln!(f)?;
    }
    for (ix, list) in self.conflicts.iter().enumerate() {
      write!(f, "c{}:", ix)?;
      for action in list {
        write!(f, " {}", action)?;
      }
      writeln!(f)?;
    }
    Ok(())
  }
}
