use std::fmt;

use rayon::prelude::*;

use crate::grammar::Grammar;
use crate::rules::NtId;

/// The split point and binary rule that produced a cell's best score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backpointer {
  pub split: usize,
  pub left: NtId,
  pub right: NtId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
  Uncomputed,
  /// `back` is None for single-word spans and for zero-probability cells
  Computed {
    prob: f64,
    back: Option<Backpointer>,
  },
}

/// Best derivation probabilities for every (i, j, X) of one sentence, stored
/// in a flat arena. Positions are 1-indexed and inclusive: `1 <= i <= j <= len`.
#[derive(Debug, Clone)]
pub struct Chart {
  len: usize,
  nonterminals: usize,
  cells: Vec<Cell>,
}

impl Chart {
  pub fn new(len: usize, nonterminals: usize) -> Self {
    Self {
      len,
      nonterminals,
      cells: vec![Cell::Uncomputed; len * len * nonterminals],
    }
  }

  /// Sentence length
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn nonterminals(&self) -> usize {
    self.nonterminals
  }

  fn index(&self, i: usize, j: usize, x: NtId) -> usize {
    assert!(
      1 <= i && i <= j && j <= self.len,
      "span {}..{} out of range for length {}",
      i,
      j,
      self.len
    );
    ((i - 1) * self.len + (j - 1)) * self.nonterminals + x.index()
  }

  pub fn cell(&self, i: usize, j: usize, x: NtId) -> Cell {
    self.cells[self.index(i, j, x)]
  }

  /// None while the cell is uncomputed
  pub fn prob(&self, i: usize, j: usize, x: NtId) -> Option<f64> {
    match self.cell(i, j, x) {
      Cell::Computed { prob, .. } => Some(prob),
      Cell::Uncomputed => None,
    }
  }

  pub fn backpointer(&self, i: usize, j: usize, x: NtId) -> Option<Backpointer> {
    match self.cell(i, j, x) {
      Cell::Computed { back, .. } => back,
      Cell::Uncomputed => None,
    }
  }

  /// Cells only ever go from uncomputed to computed
  fn set(&mut self, i: usize, j: usize, x: NtId, cell: Cell) {
    let idx = self.index(i, j, x);
    debug_assert_eq!(self.cells[idx], Cell::Uncomputed, "cell {}..{} set twice", i, j);
    self.cells[idx] = cell;
  }

  pub fn display<'a>(&'a self, g: &'a Grammar) -> ChartDisplay<'a> {
    ChartDisplay { chart: self, g }
  }
}

/// Fills the chart bottom-up, shortest spans first. Every cell of a given
/// span length only reads shorter spans, so with `parallel` the cells of one
/// length are scored concurrently.
pub fn parse_chart<S: AsRef<str>>(g: &Grammar, input: &[S], parallel: bool) -> Chart {
  let n = input.len();
  let mut chart = Chart::new(n, g.len());

  for (k, word) in input.iter().enumerate() {
    let i = k + 1;
    let row = g.emissions(word.as_ref());
    for x in g.nonterminals() {
      let prob = row
        .iter()
        .find(|(lhs, _)| *lhs == x)
        .map(|(_, p)| *p)
        .unwrap_or(0.0);
      chart.set(i, i, x, Cell::Computed { prob, back: None });
    }
  }

  for span in 2..=n {
    let cells = (1..=n + 1 - span)
      .flat_map(|i| g.nonterminals().map(move |x| (i, x)))
      .collect::<Vec<_>>();

    let scored = if parallel {
      cells
        .par_iter()
        .map(|&(i, x)| best_binary(g, &chart, i, i + span - 1, x))
        .collect::<Vec<_>>()
    } else {
      cells
        .iter()
        .map(|&(i, x)| best_binary(g, &chart, i, i + span - 1, x))
        .collect::<Vec<_>>()
    };

    for ((i, x), cell) in cells.into_iter().zip(scored) {
      chart.set(i, i + span - 1, x, cell);
    }
  }

  chart
}

/// max over rules X -> Y1 Y2 and splits s of q(X -> Y1 Y2) * pi(i, s, Y1) * pi(s + 1, j, Y2).
/// Rules are tried in grammar order, splits left to right, and only a strictly
/// better score replaces the current best, so the first maximum wins.
fn best_binary(g: &Grammar, chart: &Chart, i: usize, j: usize, x: NtId) -> Cell {
  let mut prob = 0.0;
  let mut back = None;

  for rule in g.binary_rules(x) {
    for split in i..j {
      let left = chart.prob(i, split, rule.left);
      let right = chart.prob(split + 1, j, rule.right);
      debug_assert!(left.is_some() && right.is_some(), "read an uncomputed cell");

      let score = rule.prob * left.unwrap_or(0.0) * right.unwrap_or(0.0);
      if score > prob {
        prob = score;
        back = Some(Backpointer {
          split,
          left: rule.left,
          right: rule.right,
        });
      }
    }
  }

  Cell::Computed { prob, back }
}

pub struct ChartDisplay<'a> {
  chart: &'a Chart,
  g: &'a Grammar,
}

/// Lists the nonzero cells, grouped by span
impl fmt::Display for ChartDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let chart = self.chart;
    for span in 1..=chart.len() {
      for i in 1..=chart.len() + 1 - span {
        let j = i + span - 1;
        writeln!(f, "Span {}..{}:", i, j)?;
        for x in self.g.nonterminals() {
          if let Cell::Computed { prob, back } = chart.cell(i, j, x) {
            if prob == 0.0 {
              continue;
            }
            write!(f, "  {}: {}", self.g.name(x), prob)?;
            if let Some(bp) = back {
              write!(
                f,
                " ({}..{} {}, {}..{} {})",
                i,
                bp.split,
                self.g.name(bp.left),
                bp.split + 1,
                j,
                self.g.name(bp.right)
              )?;
            }
            writeln!(f)?;
          }
        }
      }
    }
    Ok(())
  }
}
