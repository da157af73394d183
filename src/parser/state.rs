use std::collections::{HashMap, VecDeque};
use std::fmt::{self, Display, Formatter};
use crate::bnf::*;
use crate::error::BuildError;
use super::sets::FirstSets;
use super::token_set::{LaId, Lookaheads, TermSet};

/// Dense state id. 0 is reserved, 1 is always the initial state.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct StateId(pub u32);

impl StateId {
  pub const START: StateId = StateId(1);
}

/// LR(1) item.
///
/// Identity is `(prod, dot, la)`; `goto` and `root` are bookkeeping.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Item {
  pub(crate) prod: ProdIx,
  pub(crate) dot: u32,
  pub(crate) la: LaId,
  /// state reached by moving the dot over the next symbol
  pub(crate) goto: Option<StateId>,
  /// part of the kernel the state was created from
  pub(crate) root: bool,
}

pub(crate) type ItemKey = (ProdIx, u32, LaId);

impl Item {
  pub(crate) fn key(&self) -> ItemKey {
    (self.prod, self.dot, self.la)
  }
}

impl PartialEq for Item {
  fn eq(&self, other: &Item) -> bool {
    self.key() == other.key()
  }
}

impl Eq for Item {}

/// Item set, kept sorted by item key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct State {
  pub(crate) id: StateId,
  pub(crate) items: Vec<Item>,
}

impl State {
  fn new(id: StateId) -> Self {
    State {
      id,
      items: vec![],
    }
  }

  /// Returns false if an equal item is already present.
  pub(crate) fn add(&mut self, item: Item) -> bool {
    match self.items.binary_search_by_key(&item.key(), Item::key) {
      Ok(_) => false,
      Err(pos) => {
        self.items.insert(pos, item);
        true
      }
    }
  }

  pub(crate) fn kernel(&self) -> Option<&Item> {
    self.items.iter().find(|item| item.root)
  }

  fn keys(&self) -> Vec<ItemKey> {
    self.items.iter().map(Item::key).collect()
  }
}

/// The canonical collection of item sets over the augmented grammar.
pub(crate) struct Automaton {
  pub(crate) bnf: Bnf,
  pub(crate) lookaheads: Lookaheads,
  /// indexed by `StateId`; `states[0]` is an empty placeholder
  pub(crate) states: Vec<State>,
  pub(crate) start: StateId,
}

impl Automaton {
  pub(crate) fn next_symbol(&self, item: &Item) -> Option<&Symbol> {
    next_symbol(&self.bnf, item)
  }

  pub(crate) fn lookahead(&self, item: &Item) -> &TermSet {
    self.lookaheads.get(item.la)
  }

  pub(crate) fn display_item<'a>(&'a self, item: &'a Item) -> DisplayItem<'a> {
    DisplayItem {
      bnf: &self.bnf,
      lookaheads: &self.lookaheads,
      item,
    }
  }
}

fn next_symbol<'a>(bnf: &'a Bnf, item: &Item) -> Option<&'a Symbol> {
  bnf.prod(item.prod).rhs.get(item.dot as usize)
}

pub(crate) fn gen_states(
  bnf: &Bnf,
  first: &FirstSets,
) -> Result<Automaton, BuildError> {
  let mut builder = Builder::new(bnf, first);
  builder.expand();
  builder.resolve()?;
  let automaton = builder.finish();
  log::debug!(
    "automaton: {} states, {} lookahead sets",
    automaton.states.len() - 1,
    automaton.lookaheads.len());
  log::trace!("item sets:\n{}", automaton);
  Ok(automaton)
}

pub(crate) struct Builder<'a> {
  bnf: Bnf,
  first: &'a FirstSets,
  lookaheads: Lookaheads,
  /// lookahead handle of FIRST(symbol), interned on first use
  first_ids: HashMap<Symbol, LaId>,
  states: Vec<State>,
  /// full item collection -> state
  index: HashMap<Vec<ItemKey>, StateId>,
  /// item -> state reached by moving its dot
  pub(crate) registry: HashMap<ItemKey, StateId>,
}

impl<'a> Builder<'a> {
  pub(crate) fn new(bnf: &Bnf, first: &'a FirstSets) -> Self {
    Builder {
      bnf: bnf.augment(),
      first,
      lookaheads: Lookaheads::default(),
      first_ids: HashMap::new(),
      states: vec![State::new(StateId(0))],
      index: HashMap::new(),
      registry: HashMap::new(),
    }
  }

  /// First pass: creates every reachable state and records the successor of
  /// each item in the registry. Goto fields are left unset.
  pub(crate) fn expand(&mut self) {
    let Some(start_prod) = self.bnf.augmented else { return };
    let la = self.lookaheads.intern(TermSet::from_terminal(Terminal::End));
    let (start, _) = self.add_state(Item {
      prod: start_prod,
      dot: 0,
      la,
      goto: None,
      root: true,
    });
    debug_assert_eq!(start, StateId::START);

    let mut pending = VecDeque::from([start]);
    while let Some(id) = pending.pop_front() {
      let advancing = self.states[id.0 as usize].items.iter()
        .filter(|item| next_symbol(&self.bnf, item).is_some())
        .copied()
        .collect::<Vec<_>>();

      for item in advancing {
        if self.registry.contains_key(&item.key()) {
          continue;
        }
        let (target, created) = self.add_state(Item {
          dot: item.dot + 1,
          goto: None,
          root: true,
          ..item
        });
        if created {
          pending.push_back(target);
        }
        self.registry.insert(item.key(), target);
      }
    }
  }

  /// Second pass: fills every unset goto from the registry.
  pub(crate) fn resolve(&mut self) -> Result<(), BuildError> {
    for state in &mut self.states {
      for item in &mut state.items {
        if item.goto.is_some() || next_symbol(&self.bnf, item).is_none() {
          continue;
        }
        match self.registry.get(&item.key()) {
          Some(&target) => item.goto = Some(target),
          None => {
            let item = DisplayItem {
              bnf: &self.bnf,
              lookaheads: &self.lookaheads,
              item,
            };
            return Err(BuildError::ConstructionDefect {
              state: state.id,
              item: item.to_string(),
            });
          }
        }
      }
    }
    Ok(())
  }

  pub(crate) fn finish(self) -> Automaton {
    Automaton {
      bnf: self.bnf,
      lookaheads: self.lookaheads,
      states: self.states,
      start: StateId::START,
    }
  }

  /// Closes a state seeded with `kernel` and registers it, unless an equal
  /// state exists already. Returns the id and whether it is new.
  fn add_state(&mut self, kernel: Item) -> (StateId, bool) {
    let id = StateId(self.states.len() as u32);
    let mut state = State::new(id);
    state.add(kernel);
    self.close(&mut state);

    let keys = state.keys();
    if let Some(&existing) = self.index.get(&keys) {
      return (existing, false);
    }
    self.index.insert(keys, id);
    self.states.push(state);
    (id, true)
  }

  /// Adds a dot-0 item for every alternative of every nonterminal that
  /// follows a dot, until nothing new appears.
  pub(crate) fn close(&mut self, state: &mut State) {
    let mut work = state.items.iter().copied().collect::<VecDeque<_>>();

    while let Some(item) = work.pop_front() {
      let rhs = &self.bnf.prod(item.prod).rhs;
      let dot = item.dot as usize;
      let Some(&Symbol::Nonterm(nt)) = rhs.get(dot) else { continue };

      // inherit the origin's lookahead when nt ends the production
      let la = match rhs.get(dot + 1).cloned() {
        None => item.la,
        Some(next) => self.first_id(next),
      };

      for &prod in self.bnf.alternatives(nt) {
        let new = Item {
          prod,
          dot: 0,
          la,
          goto: None,
          root: false,
        };
        if state.add(new) {
          work.push_back(new);
        }
      }
    }
  }

  fn first_id(&mut self, sym: Symbol) -> LaId {
    if let Some(&id) = self.first_ids.get(&sym) {
      return id;
    }
    let id = self.lookaheads.intern(self.first.get(&sym).clone());
    self.first_ids.insert(sym, id);
    id
  }
}

pub(crate) struct DisplayItem<'a> {
  bnf: &'a Bnf,
  lookaheads: &'a Lookaheads,
  item: &'a Item,
}

impl Display for DisplayItem<'_> {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    let prod = self.bnf.prod(self.item.prod);
    write!(f, "{} ->", self.bnf.name(prod.lhs))?;
    for (i, sym) in prod.rhs.iter().enumerate() {
      if i == self.item.dot as usize {
        write!(f, " .")?;
      }
      write!(f, " {}", self.bnf.display_symbol(sym))?;
    }
    if self.item.dot as usize == prod.rhs.len() {
      write!(f, " .")?;
    }
    write!(f, ", {{{}}}", self.lookaheads.get(self.item.la))
  }
}

impl Display for Automaton {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    for state in &self.states[1..] {
      writeln!(f, "state {}", state.id.0)?;
      for item in &state.items {
        write!(f, "  {}", self.display_item(item))?;
        match item.goto {
          Some(target) => writeln!(f, "  (goto {})", target.0)?,
          None => writeln!(f)?,
        }
      }
    }
    Ok(())
  }
}

impl Display for StateId {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::*;
  use crate::parser::sets::gen_first;
  use pretty_assertions::assert_eq;

  fn automaton(grammar: Grammar) -> Automaton {
    let bnf = Bnf::parse(grammar);
    gen_states(&bnf, &gen_first(&bnf)).unwrap()
  }

  fn right_recursive() -> Grammar {
    grammar("S", [
      ("S", vec![lit(b'a'), sym("S")]),
      ("S", vec![lit(b'b')]),
    ])
  }

  #[test]
  fn right_recursive_states() {
    let a = automaton(right_recursive());

    insta::assert_snapshot!(a.to_string(), @r###"
    state 1
      S -> . 'a' S, {end of input}  (goto 2)
      S -> . 'b', {end of input}  (goto 3)
      <start> -> . S, {end of input}  (goto 4)
    state 2
      S -> . 'a' S, {end of input}  (goto 2)
      S -> 'a' . S, {end of input}  (goto 5)
      S -> . 'b', {end of input}  (goto 3)
    state 3
      S -> 'b' ., {end of input}
    state 4
      <start> -> S ., {end of input}
    state 5
      S -> 'a' S ., {end of input}
    "###);
  }

  #[test]
  fn every_state_has_one_kernel_item() {
    let a = automaton(right_recursive());
    assert_eq!(a.states[0].items.len(), 0);
    for state in &a.states[1..] {
      assert_eq!(state.items.iter().filter(|i| i.root).count(), 1);
    }
    let kernel = a.states[1].kernel().unwrap();
    assert!(a.bnf.is_augmented(kernel.prod));
    assert_eq!(kernel.dot, 0);
  }

  #[test]
  fn lookahead_is_inherited_or_taken_from_first() {
    // S -> A 'c' ; A -> 'a' A | 'a'
    let a = automaton(grammar("S", [
      ("S", vec![sym("A"), lit(b'c')]),
      ("A", vec![lit(b'a'), sym("A")]),
      ("A", vec![lit(b'a')]),
    ]));
    let state = &a.states[1];
    let start = state.kernel().unwrap();
    let s_item = state.items.iter().find(|i| i.prod == ProdIx(0)).unwrap();
    let a_items = state.items.iter().filter(|i| a.bnf.prod(i.prod).lhs == a.bnf.id("A"));

    // S is the last symbol of the start production: same handle
    assert_eq!(s_item.la, start.la);
    for item in a_items {
      assert_eq!(a.lookahead(item), &TermSet::from_terminal(Terminal::Byte(b'c')));
    }

    // inside `A -> 'a' . A` the inner A inherits {'c'}
    let inner = a.states.iter()
      .flat_map(|s| &s.items)
      .find(|i| i.prod == ProdIx(1) && i.dot == 1)
      .unwrap();
    assert_eq!(a.lookahead(inner), &TermSet::from_terminal(Terminal::Byte(b'c')));
  }

  #[test]
  fn closure_is_idempotent() {
    let bnf = Bnf::parse(grammar("E", [
      ("E", vec![sym("E"), lit(b'+'), sym("T")]),
      ("E", vec![sym("T")]),
      ("T", vec![lit(b'('), sym("E"), lit(b')')]),
      ("T", vec![sym("DIGIT")]),
    ]));
    let first = gen_first(&bnf);
    let mut builder = Builder::new(&bnf, &first);
    builder.expand();

    for state in builder.states.clone() {
      let mut closed = state.clone();
      builder.close(&mut closed);
      assert_eq!(closed, state);
    }
  }

  #[test]
  fn deterministic() {
    let dump = |g| automaton(g).to_string();
    assert_eq!(dump(right_recursive()), dump(right_recursive()));
  }

  #[test]
  fn items_sharing_a_symbol_get_separate_successors() {
    // S -> A | B ; A -> 'x' ; B -> 'x'
    let a = automaton(grammar("S", [
      ("S", vec![sym("A")]),
      ("S", vec![sym("B")]),
      ("A", vec![lit(b'x')]),
      ("B", vec![lit(b'x')]),
    ]));
    let targets = a.states[1].items.iter()
      .filter(|i| a.next_symbol(i) == Some(&Symbol::Term(Terminal::Byte(b'x'))))
      .map(|i| i.goto.unwrap())
      .collect::<Vec<_>>();
    assert_eq!(targets.len(), 2);
    assert_ne!(targets[0], targets[1]);
    assert_eq!(a.states.len(), 7);
  }

  #[test]
  fn missing_registry_entry_is_a_defect() {
    let bnf = Bnf::parse(right_recursive());
    let first = gen_first(&bnf);
    let mut builder = Builder::new(&bnf, &first);
    builder.expand();

    // drop the entry for `S -> 'a' . S`
    let key = *builder.registry.keys()
      .find(|(prod, dot, _)| *prod == ProdIx(0) && *dot == 1)
      .unwrap();
    builder.registry.remove(&key);

    match builder.resolve() {
      Err(BuildError::ConstructionDefect { state, item }) => {
        assert_eq!(state, StateId(2));
        assert_eq!(item, "S -> 'a' . S, {end of input}");
      }
      other => panic!("expected a construction defect, got {:?}", other),
    }
  }
}
