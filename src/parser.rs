use thiserror::Error;
use tracing::debug;

use crate::chart::{parse_chart, Chart};
use crate::config::ParserConfig;
use crate::grammar::Grammar;
use crate::rules::{NtId, Symbol};
use crate::syntree::ParseTree;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
  #[error("can't parse an empty sentence")]
  EmptySentence,
  #[error("sentence has {len} tokens, limit is {max}")]
  SentenceTooLong { len: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
  /// The start symbol derives the whole sentence
  Full { tree: ParseTree, prob: f64 },
  /// The start symbol can't derive the sentence; `tree` is rooted at the
  /// best-scoring nonterminal `root` instead
  Fallback {
    tree: ParseTree,
    prob: f64,
    root: Symbol,
  },
  /// No nonterminal derives the sentence with nonzero probability
  NoParse,
}

impl ParseOutcome {
  pub fn tree(&self) -> Option<&ParseTree> {
    match self {
      Self::Full { tree, .. } | Self::Fallback { tree, .. } => Some(tree),
      Self::NoParse => None,
    }
  }

  pub fn prob(&self) -> f64 {
    match self {
      Self::Full { prob, .. } | Self::Fallback { prob, .. } => *prob,
      Self::NoParse => 0.0,
    }
  }

  /// Swaps the normalized words at the leaves back for the sentence as given
  pub fn restore_words<S: AsRef<str>>(self, words: &[S]) -> Self {
    match self {
      Self::Full { tree, prob } => Self::Full {
        tree: tree.restore_words(words),
        prob,
      },
      Self::Fallback { tree, prob, root } => Self::Fallback {
        tree: tree.restore_words(words),
        prob,
        root,
      },
      Self::NoParse => Self::NoParse,
    }
  }

  pub fn is_full(&self) -> bool {
    matches!(self, Self::Full { .. })
  }

  pub fn is_fallback(&self) -> bool {
    matches!(self, Self::Fallback { .. })
  }
}

/// Picks the root for the full span: the start symbol if it has nonzero
/// probability, else the most probable nonterminal (lowest id on ties).
/// The flag is true when the start symbol was passed over.
pub fn select_root(g: &Grammar, chart: &Chart) -> (NtId, f64, bool) {
  let n = chart.len();
  let start = g.start();
  let start_prob = chart.prob(1, n, start).unwrap_or(0.0);
  if start_prob > 0.0 {
    return (start, start_prob, false);
  }

  let mut best = (start, start_prob);
  let mut first = true;
  for x in g.nonterminals() {
    let prob = chart.prob(1, n, x).unwrap_or(0.0);
    if first || prob > best.1 {
      best = (x, prob);
      first = false;
    }
  }
  (best.0, best.1, true)
}

/// Rebuilds the best tree for `x` over `i..=j` by following backpointers.
/// None if a multi-word span has no backpointer, i.e. zero probability.
pub fn build_tree<S: AsRef<str>>(
  g: &Grammar,
  chart: &Chart,
  input: &[S],
  i: usize,
  j: usize,
  x: NtId,
) -> Option<ParseTree> {
  let label = g.name(x).name.clone();
  if i == j {
    return Some(ParseTree::leaf(label, input[i - 1].as_ref(), i));
  }

  let bp = chart.backpointer(i, j, x)?;
  let left = build_tree(g, chart, input, i, bp.split, bp.left)?;
  let right = build_tree(g, chart, input, bp.split + 1, j, bp.right)?;
  Some(ParseTree::branch(label, left, right))
}

/// Viterbi parse of an already-normalized sentence
pub fn parse<S: AsRef<str>>(
  g: &Grammar,
  input: &[S],
  config: &ParserConfig,
) -> Result<ParseOutcome, ParseError> {
  parse_with_chart(g, input, config).map(|(_, outcome)| outcome)
}

/// Same as `parse`, and also hands back the filled chart
pub fn parse_with_chart<S: AsRef<str>>(
  g: &Grammar,
  input: &[S],
  config: &ParserConfig,
) -> Result<(Chart, ParseOutcome), ParseError> {
  if input.is_empty() {
    return Err(ParseError::EmptySentence);
  }
  if input.len() > config.max_sentence_len {
    return Err(ParseError::SentenceTooLong {
      len: input.len(),
      max: config.max_sentence_len,
    });
  }

  let chart = parse_chart(g, input, config.parallel_cells);
  let outcome = outcome_from_chart(g, &chart, input);
  Ok((chart, outcome))
}

fn outcome_from_chart<S: AsRef<str>>(g: &Grammar, chart: &Chart, input: &[S]) -> ParseOutcome {
  let n = chart.len();
  let (root, prob, fallback) = select_root(g, chart);

  let tree = match build_tree(g, chart, input, 1, n, root) {
    Some(tree) => tree,
    None => {
      debug!(len = n, "no derivation for the full span");
      return ParseOutcome::NoParse;
    }
  };

  if fallback {
    debug!(
      start = %g.start_symbol(),
      root = %g.name(root),
      prob,
      "start symbol can't derive the sentence, using fallback root"
    );
    ParseOutcome::Fallback {
      tree,
      prob,
      root: g.name(root).clone(),
    }
  } else {
    ParseOutcome::Full { tree, prob }
  }
}
