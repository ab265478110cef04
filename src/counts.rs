/// Line-oriented reader for rule-count files
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;
use tracing::info;

use crate::rules::{Rhs, RuleCount, RuleKind, Symbol};

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

#[derive(Debug, Error)]
pub enum CountsError {
  #[error("line {line}: expected a count and a rule kind")]
  TooShort { line: usize },
  #[error("line {line}: count {value:?} is not a non-negative integer")]
  BadCount { line: usize, value: String },
  #[error("line {line}: unknown rule kind {kind:?}")]
  UnknownKind { line: usize, kind: String },
  #[error("line {line}: {kind} takes {expected} symbols, found {found}")]
  FieldCount {
    line: usize,
    kind: RuleKind,
    expected: usize,
    found: usize,
  },
  #[error("line {line}: total count for {symbol} overflows")]
  Overflow { line: usize, symbol: String },
  #[error("couldn't read counts: {0}")]
  Io(#[from] std::io::Error),
}

/// A sum of counts for the named symbol doesn't fit in a `u64`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("total count for {0} overflows")]
pub struct CountOverflow(pub String);

/// One parsed line of a count file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
  Nonterminal(Symbol, u64),
  Rule(RuleCount),
}

/// Parses a single count line. Blank lines, `#` comments and `WORDTAG` records
/// give `None`. `line` is the 1-based line number used in errors.
pub fn parse_record(line: usize, s: &str) -> Result<Option<Record>, CountsError> {
  regex_static!(BLANK_OR_COMMENT, r"^\s*(#.*)?$");
  regex_static!(COUNT, r"^[0-9]+$");
  regex_static!(FIELD_SEP, r"\s+");

  if BLANK_OR_COMMENT.is_match(s) {
    return Ok(None);
  }

  let fields = FIELD_SEP.split(s.trim()).collect::<Vec<_>>();
  if fields.len() < 2 {
    return Err(CountsError::TooShort { line });
  }

  let value = fields[0];
  let count = if COUNT.is_match(value) {
    value.parse::<u64>().map_err(|_| CountsError::BadCount {
      line,
      value: value.to_string(),
    })?
  } else {
    return Err(CountsError::BadCount {
      line,
      value: value.to_string(),
    });
  };

  // tag-word counts from the tagger format share these files
  if fields[1] == "WORDTAG" {
    return Ok(None);
  }

  let kind = fields[1]
    .parse::<RuleKind>()
    .map_err(|kind| CountsError::UnknownKind { line, kind })?;

  let symbols = &fields[2..];
  if symbols.len() != kind.arity() {
    return Err(CountsError::FieldCount {
      line,
      kind,
      expected: kind.arity(),
      found: symbols.len(),
    });
  }

  let record = match kind {
    RuleKind::Nonterminal => Record::Nonterminal(Symbol::new(symbols[0]), count),
    RuleKind::Emission => Record::Rule(RuleCount::new(
      symbols[0],
      Rhs::emission(symbols[1]),
      count,
    )),
    RuleKind::Binary => Record::Rule(RuleCount::new(
      symbols[0],
      Rhs::binary(symbols[1], symbols[2]),
      count,
    )),
  };

  Ok(Some(record))
}

/// Everything a count file holds: rule counts in file order, and the
/// per-nonterminal totals from `NONTERMINAL` lines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counts {
  rules: Vec<RuleCount>,
  nonterminals: BTreeMap<Symbol, u64>,
}

impl Counts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, rule: RuleCount) {
    self.rules.push(rule);
  }

  /// Records a `NONTERMINAL` total. Repeated declarations accumulate.
  pub fn declare(&mut self, symbol: Symbol, count: u64) -> Result<(), CountOverflow> {
    let declared = self.nonterminals.get(&symbol).copied().unwrap_or(0);
    let total = declared
      .checked_add(count)
      .ok_or_else(|| CountOverflow(symbol.name.clone()))?;
    self.nonterminals.insert(symbol, total);
    Ok(())
  }

  pub fn rules(&self) -> &[RuleCount] {
    &self.rules
  }

  pub fn nonterminals(&self) -> &BTreeMap<Symbol, u64> {
    &self.nonterminals
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  /// Total emission count of every token, summed over all left-hand sides.
  /// Totals saturate at `u64::MAX`; they are only compared against a threshold.
  pub fn token_totals(&self) -> HashMap<&str, u64> {
    let mut totals = HashMap::new();
    for rule in self.rules.iter() {
      if let Some(w) = rule.rhs.token() {
        let total = totals.entry(w).or_insert(0u64);
        *total = total.saturating_add(rule.count);
      }
    }
    totals
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, CountsError> {
    let src = fs::read_to_string(path.as_ref())?;
    let counts: Self = src.parse()?;
    info!(
      path = %path.as_ref().display(),
      rules = counts.len(),
      nonterminals = counts.nonterminals.len(),
      "loaded counts"
    );
    Ok(counts)
  }
}

impl FromStr for Counts {
  type Err = CountsError;

  /// Fails on the first malformed line
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut counts = Self::new();
    for (idx, line) in s.lines().enumerate() {
      match parse_record(idx + 1, line)? {
        Some(Record::Nonterminal(symbol, count)) => counts
          .declare(symbol, count)
          .map_err(|CountOverflow(symbol)| CountsError::Overflow {
            line: idx + 1,
            symbol,
          })?,
        Some(Record::Rule(rule)) => counts.push(rule),
        None => {}
      }
    }
    Ok(counts)
  }
}

impl FromIterator<RuleCount> for Counts {
  fn from_iter<I: IntoIterator<Item = RuleCount>>(iter: I) -> Self {
    Self {
      rules: iter.into_iter().collect(),
      nonterminals: BTreeMap::new(),
    }
  }
}

/// Writes the counts back out in count-file format
impl fmt::Display for Counts {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (symbol, count) in self.nonterminals.iter() {
      writeln!(f, "{} {} {}", count, RuleKind::Nonterminal, symbol)?;
    }
    for rule in self.rules.iter() {
      writeln!(f, "{}", rule)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_all_record_kinds() {
    let counts: Counts = r#"
      20 NONTERMINAL S
      20 BINARYRULE S NP VP
      6 UNARYRULE NP dogs
      4 EMISSION VP runs
      # comment lines are skipped

      2 BINARY VP VERB NP
    "#
    .parse()
    .unwrap();

    assert_eq!(counts.len(), 4);
    assert_eq!(counts.nonterminals()[&Symbol::new("S")], 20);
    assert_eq!(
      counts.rules()[0],
      RuleCount::new("S", Rhs::binary("NP", "VP"), 20)
    );
    assert_eq!(counts.rules()[2], RuleCount::new("VP", Rhs::emission("runs"), 4));
  }

  #[test]
  fn errors_carry_line_numbers() {
    let err = "1 UNARYRULE A a\nx UNARYRULE A b\n".parse::<Counts>().unwrap_err();
    assert!(matches!(err, CountsError::BadCount { line: 2, .. }), "{}", err);

    let err = "-3 UNARYRULE A a".parse::<Counts>().unwrap_err();
    assert!(matches!(err, CountsError::BadCount { line: 1, .. }), "{}", err);

    let err = "1 UNARYRULE A\n".parse::<Counts>().unwrap_err();
    assert!(
      matches!(
        err,
        CountsError::FieldCount {
          line: 1,
          expected: 2,
          found: 1,
          ..
        }
      ),
      "{}",
      err
    );

    let err = "\n\n3 TRIGRAM A B C".parse::<Counts>().unwrap_err();
    assert!(matches!(err, CountsError::UnknownKind { line: 3, .. }), "{}", err);

    let err = "7".parse::<Counts>().unwrap_err();
    assert!(matches!(err, CountsError::TooShort { line: 1 }), "{}", err);
  }

  #[test]
  fn wordtag_lines_are_skipped() {
    let counts: Counts = "4 WORDTAG NOUN dog\n4 UNARYRULE NOUN dog\n2 WORDTAG VERB"
      .parse()
      .unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts.rules()[0], RuleCount::new("NOUN", Rhs::emission("dog"), 4));
  }

  #[test]
  fn token_totals_sum_across_tags() {
    let counts: Counts = "3 UNARYRULE NOUN run\n2 UNARYRULE VERB run\n1 UNARYRULE NOUN dog"
      .parse()
      .unwrap();
    let totals = counts.token_totals();
    assert_eq!(totals["run"], 5);
    assert_eq!(totals["dog"], 1);

    let huge: Counts = "18446744073709551615 UNARYRULE NOUN run\n1 UNARYRULE VERB run"
      .parse()
      .unwrap();
    assert_eq!(huge.token_totals()["run"], u64::MAX);
  }

  #[test]
  fn nonterminal_total_overflow_is_reported() {
    let err = "18446744073709551615 NONTERMINAL S\n# repeat\n1 NONTERMINAL S"
      .parse::<Counts>()
      .unwrap_err();
    assert!(
      matches!(&err, CountsError::Overflow { line: 3, symbol } if symbol == "S"),
      "{}",
      err
    );

    let mut counts = Counts::new();
    assert_eq!(counts.declare(Symbol::new("S"), 2), Ok(()));
    assert_eq!(counts.declare(Symbol::new("S"), 3), Ok(()));
    assert_eq!(counts.nonterminals()[&Symbol::new("S")], 5);
    assert_eq!(
      counts.declare(Symbol::new("S"), u64::MAX),
      Err(CountOverflow("S".to_string()))
    );
  }

  #[test]
  fn display_reparses_to_same_counts() {
    let src = "4 NONTERMINAL VP\n4 UNARYRULE VP runs\n";
    let counts: Counts = src.parse().unwrap();
    assert_eq!(counts.to_string(), src);
  }
}
