use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::counts::{CountOverflow, Counts};
use crate::rules::{Rhs, RuleCount, Symbol};
use crate::syntree::ParseTree;

/// Placeholder substituted for rare words
pub const RARE: &str = "_RARE_";

/// Tokens seen fewer times than this in training are rare
pub const DEFAULT_THRESHOLD: u64 = 5;

/// Splits the vocabulary into frequent tokens and everything else, which is
/// mapped onto a single placeholder. The same filter has to be applied to the
/// training counts and to every sentence that is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyFilter {
  frequent: HashSet<String>,
  placeholder: String,
  threshold: u64,
}

impl VocabularyFilter {
  /// A token is frequent when its emission counts, summed over every tag that
  /// emits it, reach `threshold`
  pub fn from_counts(counts: &Counts, threshold: u64, placeholder: impl Into<String>) -> Self {
    let totals = counts.token_totals();
    let frequent = totals
      .iter()
      .filter(|(_, total)| **total >= threshold)
      .map(|(w, _)| w.to_string())
      .collect::<HashSet<_>>();

    info!(
      tokens = totals.len(),
      frequent = frequent.len(),
      rare_occurrences = totals
        .values()
        .filter(|total| **total < threshold)
        .fold(0u64, |acc, total| acc.saturating_add(*total)),
      threshold,
      "built vocabulary filter"
    );

    Self {
      frequent,
      placeholder: placeholder.into(),
      threshold,
    }
  }

  pub fn placeholder(&self) -> &str {
    &self.placeholder
  }

  pub fn threshold(&self) -> u64 {
    self.threshold
  }

  /// Number of frequent tokens
  pub fn len(&self) -> usize {
    self.frequent.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frequent.is_empty()
  }

  pub fn is_frequent(&self, token: &str) -> bool {
    self.frequent.contains(token)
  }

  pub fn normalize<'a>(&'a self, token: &'a str) -> &'a str {
    if self.is_frequent(token) {
      token
    } else {
      &self.placeholder
    }
  }

  pub fn normalize_sentence<S: AsRef<str>>(&self, sentence: &[S]) -> Vec<String> {
    sentence
      .iter()
      .map(|w| self.normalize(w.as_ref()).to_string())
      .collect()
  }

  /// Replaces rare words at the leaves of a training tree
  pub fn normalize_tree(&self, tree: &ParseTree) -> ParseTree {
    tree.map_words(&|w: &str| self.normalize(w).to_string())
  }

  /// Folds every rare emission `X -> w` into `X -> placeholder`, summing per
  /// tag. This gives the same counts as recounting a treebank whose rare words
  /// were replaced. Binary and nonterminal counts are untouched.
  pub fn normalize_counts(&self, counts: &Counts) -> Result<Counts, CountOverflow> {
    let mut normalized = Counts::new();
    let mut rare_order: Vec<Symbol> = Vec::new();
    let mut rare_totals: HashMap<Symbol, u64> = HashMap::new();

    for rule in counts.rules() {
      match &rule.rhs {
        Rhs::Emission(w) if self.normalize(w) == self.placeholder => {
          if !rare_totals.contains_key(&rule.lhs) {
            rare_order.push(rule.lhs.clone());
          }
          let total = rare_totals.entry(rule.lhs.clone()).or_insert(0);
          *total = total
            .checked_add(rule.count)
            .ok_or_else(|| CountOverflow(rule.lhs.name.clone()))?;
        }
        _ => normalized.push(rule.clone()),
      }
    }

    for lhs in rare_order {
      let count = rare_totals[&lhs];
      normalized.push(RuleCount {
        lhs,
        rhs: Rhs::emission(self.placeholder.clone()),
        count,
      });
    }

    for (symbol, count) in counts.nonterminals() {
      normalized.declare(symbol.clone(), *count)?;
    }

    Ok(normalized)
  }
}
