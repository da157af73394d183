/// Knobs for running the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
  /// Upper bound on live paths. Forks past it are dropped.
  pub max_paths: Option<usize>,
  /// Reductions one path may perform on a single lookahead without its
  /// stack shrinking. Unit cycles are cut on their own; this bounds long
  /// acyclic chains of unit productions.
  pub max_reductions: usize,
  /// A pruned path is reported only while at most this many paths are
  /// alive. Short-lived speculative paths stay quiet.
  pub report_paths_at_most: Option<usize>,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      max_paths: None,
      max_reductions: 4096,
      report_paths_at_most: None,
    }
  }
}

impl Config {
  pub fn max_paths(mut self, n: usize) -> Self {
    self.max_paths = Some(n);
    self
  }

  pub fn max_reductions(mut self, n: usize) -> Self {
    self.max_reductions = n;
    self
  }

  pub fn report_paths_at_most(mut self, n: usize) -> Self {
    self.report_paths_at_most = Some(n);
    self
  }
}
