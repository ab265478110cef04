use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::counts::{CountOverflow, Counts};
use crate::rules::{NtId, Rhs, Symbol};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EstimationError {
  #[error("no rules to estimate from")]
  Empty,
  #[error("nonterminal {0} has zero total count")]
  ZeroMass(String),
  #[error("rule {lhs} -> {rhs} is listed more than once")]
  DuplicateRule { lhs: String, rhs: String },
  #[error("emission {lhs} -> {token:?} contains whitespace and would read as a binary rule")]
  AmbiguousRhs { lhs: String, token: String },
  #[error("start symbol {0} has no rules")]
  MissingStart(String),
  #[error("rule counts for {lhs} overflow")]
  CountOverflow { lhs: String },
}

impl From<CountOverflow> for EstimationError {
  fn from(CountOverflow(lhs): CountOverflow) -> Self {
    Self::CountOverflow { lhs }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinaryRule {
  pub left: NtId,
  pub right: NtId,
  pub prob: f64,
}

/// A PCFG in Chomsky Normal Form with probabilities estimated from counts.
/// Read-only once built.
#[derive(Debug, Clone)]
pub struct Grammar {
  start: NtId,
  names: Vec<Symbol>,
  ids: HashMap<String, NtId>,
  /// binary rules per lhs, ordered by (left, right)
  binary: Vec<Vec<BinaryRule>>,
  /// token -> (lhs, prob), ordered by lhs
  emissions: HashMap<String, Vec<(NtId, f64)>>,
}

impl Grammar {
  /// Maximum-likelihood estimate: q(X -> r) = count(X -> r) / sum of count(X -> r').
  /// Rules with a zero count are left out of the grammar.
  pub fn estimate(counts: &Counts, start: &str) -> Result<Self, EstimationError> {
    if counts.is_empty() {
      return Err(EstimationError::Empty);
    }

    // every nonterminal mentioned anywhere gets an id, in name order
    let mut names: BTreeSet<&str> = BTreeSet::new();
    for rule in counts.rules() {
      names.insert(rule.lhs.as_str());
      if let Rhs::Binary(l, r) = &rule.rhs {
        names.insert(l.as_str());
        names.insert(r.as_str());
      }
    }
    for symbol in counts.nonterminals().keys() {
      names.insert(symbol.as_str());
    }

    let names = names.into_iter().map(Symbol::new).collect::<Vec<_>>();
    let ids = names
      .iter()
      .enumerate()
      .map(|(idx, s)| (s.name.clone(), NtId(idx as u32)))
      .collect::<HashMap<_, _>>();

    let mut totals = vec![0u64; names.len()];
    let mut has_rules = vec![false; names.len()];
    let mut seen: HashSet<(NtId, &Rhs)> = HashSet::new();
    for rule in counts.rules() {
      let lhs = ids[rule.lhs.as_str()];

      if let Some(w) = rule.rhs.token() {
        if w.chars().any(char::is_whitespace) {
          return Err(EstimationError::AmbiguousRhs {
            lhs: rule.lhs.name.clone(),
            token: w.to_string(),
          });
        }
      }
      if !seen.insert((lhs, &rule.rhs)) {
        return Err(EstimationError::DuplicateRule {
          lhs: rule.lhs.name.clone(),
          rhs: rule.rhs.to_string(),
        });
      }

      totals[lhs.index()] = totals[lhs.index()]
        .checked_add(rule.count)
        .ok_or_else(|| EstimationError::CountOverflow {
          lhs: rule.lhs.name.clone(),
        })?;
      has_rules[lhs.index()] = true;
    }

    for (idx, total) in totals.iter().enumerate() {
      if has_rules[idx] && *total == 0 {
        return Err(EstimationError::ZeroMass(names[idx].name.clone()));
      }
    }

    for (symbol, declared) in counts.nonterminals() {
      let total = totals[ids[symbol.as_str()].index()];
      if total != *declared {
        warn!(
          nonterminal = %symbol,
          declared,
          rule_total = total,
          "nonterminal count disagrees with its rule counts"
        );
      }
    }

    let start = match ids.get(start) {
      Some(id) if has_rules[id.index()] => *id,
      _ => return Err(EstimationError::MissingStart(start.to_string())),
    };

    let mut binary = vec![Vec::new(); names.len()];
    let mut emissions: HashMap<String, Vec<(NtId, f64)>> = HashMap::new();
    for rule in counts.rules().iter().filter(|r| r.count > 0) {
      let lhs = ids[rule.lhs.as_str()];
      let prob = rule.count as f64 / totals[lhs.index()] as f64;
      match &rule.rhs {
        Rhs::Emission(w) => emissions.entry(w.clone()).or_default().push((lhs, prob)),
        Rhs::Binary(l, r) => binary[lhs.index()].push(BinaryRule {
          left: ids[l.as_str()],
          right: ids[r.as_str()],
          prob,
        }),
      }
    }

    for rules in binary.iter_mut() {
      rules.sort_by_key(|r| (r.left, r.right));
    }
    for row in emissions.values_mut() {
      row.sort_by_key(|(lhs, _)| *lhs);
    }

    info!(
      nonterminals = names.len(),
      binary_rules = binary.iter().map(Vec::len).sum::<usize>(),
      vocabulary = emissions.len(),
      start = %names[start.index()],
      "estimated grammar"
    );

    Ok(Self {
      start,
      names,
      ids,
      binary,
      emissions,
    })
  }

  pub fn start(&self) -> NtId {
    self.start
  }

  pub fn start_symbol(&self) -> &Symbol {
    self.name(self.start)
  }

  /// Number of nonterminals
  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn nonterminals(&self) -> impl Iterator<Item = NtId> + '_ {
    (0..self.names.len()).map(|idx| NtId(idx as u32))
  }

  pub fn id(&self, name: &str) -> Option<NtId> {
    self.ids.get(name).copied()
  }

  pub fn name(&self, id: NtId) -> &Symbol {
    &self.names[id.index()]
  }

  pub fn binary_rules(&self, lhs: NtId) -> &[BinaryRule] {
    &self.binary[lhs.index()]
  }

  /// Every nonterminal that can emit `token`, with its probability
  pub fn emissions(&self, token: &str) -> &[(NtId, f64)] {
    self
      .emissions
      .get(token)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn emission(&self, lhs: NtId, token: &str) -> f64 {
    self
      .emissions(token)
      .iter()
      .find(|(x, _)| *x == lhs)
      .map(|(_, p)| *p)
      .unwrap_or(0.0)
  }

  pub fn has_token(&self, token: &str) -> bool {
    self.emissions.contains_key(token)
  }

  /// q(lhs -> rhs), or None if the rule isn't in the grammar
  pub fn probability(&self, lhs: &str, rhs: &Rhs) -> Option<f64> {
    let lhs = self.id(lhs)?;
    match rhs {
      Rhs::Emission(w) => self
        .emissions(w)
        .iter()
        .find(|(x, _)| *x == lhs)
        .map(|(_, p)| *p),
      Rhs::Binary(l, r) => {
        let (l, r) = (self.id(l.as_str())?, self.id(r.as_str())?);
        self
          .binary_rules(lhs)
          .iter()
          .find(|rule| rule.left == l && rule.right == r)
          .map(|rule| rule.prob)
      }
    }
  }

  /// The whole probability table, sorted by lhs then rhs
  pub fn rules(&self) -> Vec<(Symbol, Rhs, f64)> {
    let mut table = Vec::new();
    for (lhs, rules) in self.binary.iter().enumerate() {
      for rule in rules {
        table.push((
          self.names[lhs].clone(),
          Rhs::Binary(self.name(rule.left).clone(), self.name(rule.right).clone()),
          rule.prob,
        ));
      }
    }
    for (token, row) in self.emissions.iter() {
      for (lhs, prob) in row {
        table.push((self.name(*lhs).clone(), Rhs::Emission(token.clone()), *prob));
      }
    }
    table.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    table
  }
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "//** start: {}", self.start_symbol())?;
    write!(f, "//** nonterminals:")?;
    for nt in self.names.iter() {
      write!(f, " {}", nt)?;
    }
    writeln!(f)?;

    for (lhs, rhs, prob) in self.rules() {
      writeln!(f, "{} -> {} {}", lhs, rhs, prob)?;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rules::RuleCount;
  use approx::assert_relative_eq;

  fn toy() -> Counts {
    r#"
      10 NONTERMINAL S
      10 BINARYRULE S NP VP
      3 UNARYRULE NP dogs
      1 UNARYRULE NP cats
      6 BINARYRULE VP VERB NP
      2 UNARYRULE VP runs
      6 UNARYRULE VERB chase
    "#
    .parse()
    .unwrap()
  }

  #[test]
  fn rows_sum_to_one() {
    let g = Grammar::estimate(&toy(), "S").unwrap();
    let mut sums: HashMap<Symbol, f64> = HashMap::new();
    for (lhs, _, prob) in g.rules() {
      assert!(prob > 0.0 && prob <= 1.0);
      *sums.entry(lhs).or_insert(0.0) += prob;
    }
    assert_eq!(sums.len(), 4);
    for (lhs, sum) in sums {
      assert!((sum - 1.0).abs() < 1e-9, "{} sums to {}", lhs, sum);
    }
  }

  #[test]
  fn relative_frequencies() {
    let g = Grammar::estimate(&toy(), "S").unwrap();
    assert_relative_eq!(g.probability("NP", &Rhs::emission("dogs")).unwrap(), 0.75);
    assert_relative_eq!(g.probability("NP", &Rhs::emission("cats")).unwrap(), 0.25);
    assert_relative_eq!(g.probability("VP", &Rhs::binary("VERB", "NP")).unwrap(), 0.75);
    assert_relative_eq!(g.probability("S", &Rhs::binary("NP", "VP")).unwrap(), 1.0);
    assert_eq!(g.probability("VP", &Rhs::emission("dogs")), None);
    assert_eq!(g.probability("Q", &Rhs::emission("dogs")), None);

    let np = g.id("NP").unwrap();
    assert_relative_eq!(g.emission(np, "dogs"), 0.75);
    assert_eq!(g.emission(np, "runs"), 0.0);
  }

  #[test]
  fn ids_follow_name_order() {
    let g = Grammar::estimate(&toy(), "S").unwrap();
    let names = g.nonterminals().map(|x| g.name(x).name.clone()).collect::<Vec<_>>();
    assert_eq!(names, vec!["NP", "S", "VERB", "VP"]);
    assert_eq!(g.start_symbol().as_str(), "S");
  }

  #[test]
  fn zero_mass_is_fatal() {
    let counts: Counts = "0 UNARYRULE A a\n1 UNARYRULE S s".parse().unwrap();
    assert_eq!(
      Grammar::estimate(&counts, "S").unwrap_err(),
      EstimationError::ZeroMass("A".to_string())
    );
  }

  #[test]
  fn count_overflow_is_reported() {
    let counts: Counts = "18446744073709551615 UNARYRULE S a\n1 UNARYRULE S b".parse().unwrap();
    assert_eq!(
      Grammar::estimate(&counts, "S").unwrap_err(),
      EstimationError::CountOverflow {
        lhs: "S".to_string()
      }
    );

    // the largest total that still fits estimates normally
    let counts: Counts = "18446744073709551614 UNARYRULE S a\n1 UNARYRULE S b".parse().unwrap();
    let g = Grammar::estimate(&counts, "S").unwrap();
    assert_relative_eq!(g.probability("S", &Rhs::emission("a")).unwrap(), 1.0);
  }

  #[test]
  fn whitespace_token_is_ambiguous() {
    let counts = vec![
      RuleCount::new("S", Rhs::binary("A", "B"), 1),
      RuleCount::new("S", Rhs::emission("A B"), 1),
    ]
    .into_iter()
    .collect::<Counts>();
    assert!(matches!(
      Grammar::estimate(&counts, "S"),
      Err(EstimationError::AmbiguousRhs { .. })
    ));
  }

  #[test]
  fn duplicates_and_missing_start() {
    let counts: Counts = "1 UNARYRULE S a\n2 UNARYRULE S a".parse().unwrap();
    assert!(matches!(
      Grammar::estimate(&counts, "S"),
      Err(EstimationError::DuplicateRule { .. })
    ));

    assert_eq!(
      Grammar::estimate(&toy(), "ROOT").unwrap_err(),
      EstimationError::MissingStart("ROOT".to_string())
    );
    assert_eq!(
      Grammar::estimate(&Counts::new(), "S").unwrap_err(),
      EstimationError::Empty
    );
  }

  #[test]
  fn display_lists_every_rule() {
    let g = Grammar::estimate(&toy(), "S").unwrap();
    let s = g.to_string();
    assert!(s.starts_with("//** start: S\n"));
    assert!(s.contains("VP -> VERB NP 0.75\n"));
    assert_eq!(s.lines().count(), 2 + 6);
  }
}
