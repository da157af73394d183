use std::cell::RefCell;
use std::collections::VecDeque;
use std::mem;
use crate::bnf::END_COLUMN;
use crate::config::Config;
use crate::error::{Lookahead, ParseRejected, Position, SyntaxError};
use super::state::StateId;
use super::table::{Action, ParseTable};

type Path = Vec<StateId>;

/// Push parser over a compiled table.
///
/// Feed bytes with [`Engine::step`] and end-of-input with
/// [`Engine::finish`]. Every conflict forks the current path, a path with no
/// action is pruned, and the first step on which some path accepts settles
/// the parse.
pub struct Engine<'t> {
  table: &'t ParseTable,
  config: Config,
  paths: VecDeque<Path>,
  accepting: Vec<Path>,
  /// paths of the current step not yet run
  in_flight: usize,
  position: Position,
  on_error: Option<Box<dyn FnMut(&SyntaxError) + 't>>,
}

impl<'t> Engine<'t> {
  pub fn new(table: &'t ParseTable, config: Config) -> Self {
    Engine {
      table,
      config,
      paths: VecDeque::from([vec![table.start()]]),
      accepting: vec![],
      in_flight: 0,
      position: Position {
        offset: 0,
        line: 1,
        column: 1,
      },
      on_error: None,
    }
  }

  /// Called for every state on a path when the path is pruned, top of
  /// stack first.
  pub fn on_error(mut self, f: impl FnMut(&SyntaxError) + 't) -> Self {
    self.on_error = Some(Box::new(f));
    self
  }

  /// Returns false when the byte could not be consumed: the parse was
  /// already over, or every path died on it.
  pub fn step(&mut self, byte: u8) -> bool {
    self.advance(Lookahead::Byte(byte))
  }

  /// Signals end-of-input.
  pub fn finish(&mut self) -> bool {
    self.advance(Lookahead::End)
  }

  pub fn accepted(&self) -> bool {
    !self.accepting.is_empty()
  }

  /// Paths that accepted on the settling step.
  pub fn accepting_paths(&self) -> usize {
    self.accepting.len()
  }

  pub fn active_paths(&self) -> usize {
    self.paths.len()
  }

  pub fn position(&self) -> Position {
    self.position
  }

  /// State stacks of the live paths, bottom first.
  pub fn stacks(&self) -> impl Iterator<Item = &[StateId]> {
    self.paths.iter().map(|path| &path[..])
  }

  fn advance(&mut self, la: Lookahead) -> bool {
    if self.accepted() || self.paths.is_empty() {
      return false;
    }

    let column = match la {
      Lookahead::Byte(b) => b as usize,
      Lookahead::End => END_COLUMN,
    };
    let current = mem::take(&mut self.paths);
    log::trace!("{} on {}: {} path(s)", self.position, la, current.len());

    self.in_flight = current.len();
    for path in current {
      self.in_flight -= 1;
      self.run(path, la, column);
    }

    if let Lookahead::Byte(b) = la {
      self.position.offset += 1;
      if b == b'\n' {
        self.position.line += 1;
        self.position.column = 1;
      } else {
        self.position.column += 1;
      }
    }

    !self.paths.is_empty() || self.accepted()
  }

  /// Drives one path until every branch of it has shifted, accepted or
  /// died on the current lookahead.
  fn run(&mut self, path: Path, la: Lookahead, column: usize) {
    let table = self.table;
    let mut work = vec![Branch {
      path,
      forced: None,
      seen: vec![],
    }];

    while let Some(Branch { mut path, mut forced, mut seen }) = work.pop() {
      loop {
        let Some(&top) = path.last() else {
          self.prune(path, la, work.len());
          break;
        };
        let action = forced.take().unwrap_or_else(|| table.action(top, column));

        match action {
          Action::Error | Action::Goto(_) => {
            self.prune(path, la, work.len());
            break;
          }
          Action::Shift(target) => {
            path.push(target);
            self.keep(path);
            break;
          }
          Action::Accept => {
            log::debug!("accepted at {}", self.position);
            self.accepting.push(path);
            break;
          }
          Action::Conflict(ix) => {
            let alternatives = table.conflict(ix);
            log::trace!("state {}: forking {} ways", top, alternatives.len());
            // reversed so the first alternative runs first
            for &alt in alternatives.iter().rev() {
              work.push(Branch {
                path: path.clone(),
                forced: Some(alt),
                seen: seen.clone(),
              });
            }
            break;
          }
          Action::Reduce(id) => {
            let Some(info) = table.production(id) else {
              self.prune(path, la, work.len());
              break;
            };
            if info.pop >= path.len() {
              self.prune(path, la, work.len());
              break;
            }
            if info.pop > 1 {
              seen.clear();
            }
            path.truncate(path.len() - info.pop);

            let top = path[path.len() - 1];
            let targets = match table.action(top, info.lhs.column()) {
              Action::Goto(target) => vec![target],
              Action::Conflict(ix) => table.conflict(ix).iter()
                .filter_map(|alt| match *alt {
                  Action::Goto(target) => Some(target),
                  _ => None,
                })
                .collect(),
              _ => vec![],
            };
            if targets.is_empty() {
              self.prune(path, la, work.len());
              break;
            }
            if seen.len() >= self.config.max_reductions {
              log::debug!(
                "state {}: more than {} reductions without shrinking the stack",
                top, self.config.max_reductions);
              self.prune(path, la, work.len());
              break;
            }

            // the stack never grows while reducing, so a repeated top at
            // the same height means the same stack: a unit cycle
            let fresh = targets.into_iter()
              .filter(|target| !seen.contains(target))
              .collect::<Vec<_>>();
            let Some(first) = fresh.first().copied() else {
              log::trace!("state {}: unit cycle cut", top);
              break;
            };
            for &target in fresh[1..].iter().rev() {
              let mut path = path.clone();
              path.push(target);
              let mut seen = seen.clone();
              seen.push(target);
              work.push(Branch {
                path,
                forced: None,
                seen,
              });
            }
            path.push(first);
            seen.push(first);
          }
        }
      }
    }
  }

  fn keep(&mut self, path: Path) {
    if let Some(max) = self.config.max_paths {
      if self.paths.len() >= max {
        log::warn!("dropping a path: more than {} alive", max);
        return;
      }
    }
    self.paths.push_back(path);
  }

  /// `pending` counts branches of the current path still waiting to run.
  fn prune(&mut self, path: Path, la: Lookahead, pending: usize) {
    log::trace!("pruned path {:?} on {}", path, la);

    let live = self.paths.len() + self.in_flight + pending + 1;
    if self.config.report_paths_at_most.map_or(false, |n| live > n) {
      return;
    }
    let Some(on_error) = self.on_error.as_mut() else { return };
    for &state in path.iter().rev() {
      on_error(&SyntaxError {
        position: self.position,
        found: la,
        state,
        expected: self.table.shared_hint(state),
      });
    }
  }
}

/// A branch of one path during a single step.
struct Branch {
  path: Path,
  /// replaces the first table lookup when running a conflict alternative
  forced: Option<Action>,
  /// tops pushed by gotos since the stack last shrank
  seen: Vec<StateId>,
}

/// Runs a whole buffer followed by end-of-input. Returns how many paths
/// accepted, or the diagnostics of the step on which the last paths died.
/// Paths pruned on earlier steps had live siblings and are not reported.
pub fn parse(
  table: &ParseTable,
  input: &[u8],
  config: &Config,
) -> Result<usize, ParseRejected> {
  let errors = RefCell::new(vec![]);
  let accepted = {
    let mut engine = Engine::new(table, config.clone())
      .on_error(|err| errors.borrow_mut().push(err.clone()));
    let consumed = input.iter().all(|&b| {
      let alive = engine.step(b);
      if alive {
        errors.borrow_mut().clear();
      }
      alive
    });
    if consumed {
      engine.finish();
    }
    engine.accepting_paths()
  };

  if accepted > 0 {
    Ok(accepted)
  } else {
    Err(ParseRejected {
      errors: errors.into_inner(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::*;
  use crate::parser::Parser;
  use pretty_assertions::assert_eq;

  fn table(grammar: Grammar) -> ParseTable {
    Parser::new(grammar, Config::default()).unwrap().table().clone()
  }

  fn right_recursive() -> ParseTable {
    table(grammar("S", [
      ("S", vec![lit(b'a'), sym("S")]),
      ("S", vec![lit(b'b')]),
    ]))
  }

  fn run(table: &ParseTable, input: &[u8]) -> (bool, Vec<SyntaxError>) {
    let mut errors = vec![];
    let accepted = {
      let mut engine = Engine::new(table, Config::default())
        .on_error(|err| errors.push(err.clone()));
      for &b in input {
        if !engine.step(b) {
          break;
        }
      }
      engine.finish();
      engine.accepted()
    };
    (accepted, errors)
  }

  #[test]
  fn accepts_a_derivation() {
    let t = right_recursive();
    let (accepted, errors) = run(&t, b"aab");
    assert!(accepted);
    assert_eq!(errors, vec![]);
  }

  #[test]
  fn rejects_with_hint() {
    let t = right_recursive();
    let (accepted, errors) = run(&t, b"c");
    assert!(!accepted);
    assert_eq!(errors.len(), 1);
    assert_eq!(&*errors[0].expected, "S ('a' | 'b')");
    assert_eq!(errors[0].found, Lookahead::Byte(b'c'));
    assert_eq!(errors[0].state, StateId::START);
    assert_eq!(errors[0].position, Position { offset: 0, line: 1, column: 1 });
  }

  #[test]
  fn premature_end() {
    let t = right_recursive();
    let result = parse(&t, b"aa", &Config::default());
    let errors = result.unwrap_err().errors;

    // stack [1, 2, 2]: top first
    assert_eq!(
      errors.iter().map(|e| e.state.0).collect::<Vec<_>>(),
      vec![2, 2, 1]);
    assert!(errors.iter().all(|e| e.found == Lookahead::End));
    assert_eq!(errors[0].to_string(), "line 1, column 3: expecting S ('a' | 'b')");
  }

  #[test]
  fn step_reports_progress() {
    let t = right_recursive();
    let mut engine = Engine::new(&t, Config::default());
    assert!(engine.step(b'a'));
    assert_eq!(engine.stacks().collect::<Vec<_>>(), vec![&[StateId(1), StateId(2)][..]]);
    assert!(engine.step(b'b'));
    assert!(engine.finish());
    assert!(engine.accepted());
    assert_eq!(engine.active_paths(), 0);

    // settled: nothing more is consumed
    assert!(!engine.step(b'a'));
    assert!(!engine.finish());
  }

  #[test]
  fn resumable_between_bytes() {
    let t = right_recursive();
    let mut engine = Engine::new(&t, Config::default());
    for &b in b"aaa" {
      assert!(engine.step(b));
      assert_eq!(engine.active_paths(), 1);
    }
    let stack = engine.stacks().next().unwrap().to_vec();
    assert_eq!(stack, vec![StateId(1), StateId(2), StateId(2), StateId(2)]);
    assert!(engine.step(b'b'));
    assert!(engine.finish());
    assert!(engine.accepted());
  }

  #[test]
  fn tracks_lines() {
    let t = table(grammar("S", [
      ("S", vec![lit(b'\n'), sym("S")]),
      ("S", vec![lit(b'.')]),
    ]));
    let errors = parse(&t, b"\n\nx", &Config::default()).unwrap_err().errors;
    assert_eq!(errors[0].position, Position { offset: 2, line: 3, column: 1 });
  }

  #[test]
  fn forks_on_conflicts() {
    let t = table(grammar("S", [
      ("S", vec![sym("A")]),
      ("S", vec![sym("B")]),
      ("A", vec![lit(b'x')]),
      ("B", vec![lit(b'x')]),
    ]));
    let mut engine = Engine::new(&t, Config::default());
    assert!(engine.step(b'x'));
    assert_eq!(engine.active_paths(), 2);
    assert!(engine.finish());
    assert!(engine.accepted());
    assert_eq!(engine.accepting_paths(), 2);
  }

  #[test]
  fn goto_conflicts_fork_too() {
    // both S items read A, with different lookaheads
    let t = table(grammar("S", [
      ("S", vec![sym("A"), lit(b'b')]),
      ("S", vec![sym("A"), lit(b'c')]),
      ("A", vec![lit(b'a')]),
    ]));
    assert_eq!(parse(&t, b"ab", &Config::default()), Ok(1));
    assert_eq!(parse(&t, b"ac", &Config::default()), Ok(1));
    assert!(parse(&t, b"ad", &Config::default()).is_err());
  }

  #[test]
  fn path_cap() {
    let t = table(grammar("S", [
      ("S", vec![sym("A")]),
      ("S", vec![sym("B")]),
      ("A", vec![lit(b'x')]),
      ("B", vec![lit(b'x')]),
    ]));
    let mut engine = Engine::new(&t, Config::default().max_paths(1));
    assert!(engine.step(b'x'));
    assert_eq!(engine.active_paths(), 1);
    assert!(engine.finish());
    assert_eq!(engine.accepting_paths(), 1);
  }

  #[test]
  fn unit_cycles_are_cut() {
    let t = table(grammar("S", [
      ("S", vec![sym("T")]),
      ("T", vec![sym("S")]),
      ("T", vec![lit(b'x')]),
    ]));
    assert_eq!(parse(&t, b"x", &Config::default()), Ok(1));
  }

  #[test]
  fn branching_unit_cycles_stay_small() {
    // S -> A | B ; A -> S | 'x' ; B -> S
    let t = table(grammar("S", [
      ("S", vec![sym("A")]),
      ("S", vec![sym("B")]),
      ("A", vec![sym("S")]),
      ("A", vec![lit(b'x')]),
      ("B", vec![sym("S")]),
    ]));
    // accepted through S -> A and through S -> B -> S -> A
    assert_eq!(parse(&t, b"x", &Config::default()), Ok(2));
  }

  #[test]
  fn unit_chain_cap() {
    let t = table(grammar("S", [
      ("S", vec![sym("T")]),
      ("T", vec![sym("U")]),
      ("U", vec![lit(b'x')]),
    ]));
    // U, T and S: three gotos at one stack height
    assert_eq!(parse(&t, b"x", &Config::default().max_reductions(3)), Ok(1));
    let errors = parse(&t, b"x", &Config::default().max_reductions(2))
      .unwrap_err()
      .errors;
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|e| e.found == Lookahead::End));
  }

  #[test]
  fn long_reduce_chains_are_not_capped() {
    let t = table(grammar("S", [
      ("Digit", vec![range(0x30, 0x39)]),
      ("S", vec![sym("Digit"), sym("S")]),
      ("S", vec![sym("Digit")]),
    ]));
    let input = vec![b'4'; 5000];
    assert_eq!(parse(&t, &input, &Config::default()), Ok(1));
  }

  #[test]
  fn parse_keeps_only_the_final_diagnostics() {
    let t = table(grammar("S", [
      ("Digit", vec![range(0x30, 0x39)]),
      ("S", vec![sym("Digit"), sym("S")]),
      ("S", vec![sym("Digit")]),
    ]));
    // every digit kills a speculative sibling; only the 'x' step counts
    let errors = parse(&t, b"123x", &Config::default()).unwrap_err().errors;
    assert!(!errors.is_empty());
    assert!(errors.iter().all(|e| e.position.offset == 3));
  }

  #[test]
  fn report_threshold_hides_speculative_noise() {
    let t = table(grammar("S", [
      ("S", vec![sym("A")]),
      ("S", vec![sym("B")]),
      ("A", vec![lit(b'x'), lit(b'y')]),
      ("B", vec![lit(b'x'), lit(b'z')]),
    ]));

    // on 'y' the B path dies while the A path is still alive
    let mut errors = vec![];
    {
      let mut engine = Engine::new(&t, Config::default().report_paths_at_most(1))
        .on_error(|err| errors.push(err.clone()));
      assert!(engine.step(b'x'));
      assert!(engine.step(b'y'));
      assert!(engine.finish());
    }
    assert_eq!(errors, vec![]);

    let errors = parse(&t, b"xw", &Config::default()).unwrap_err().errors;
    assert_eq!(errors.len(), 4);
  }
}
