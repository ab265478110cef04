use std::fmt;
use std::str::FromStr;

/// Dense index of a nonterminal, assigned once when a grammar is estimated.
/// Ids follow the lexical order of the symbol names.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NtId(pub u32);

impl NtId {
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
  pub name: String,
}

impl Symbol {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }

  pub fn as_str(&self) -> &str {
    &self.name
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

/// Right-hand side of a CNF rule. Emissions and binary expansions are kept
/// apart by kind, so a token can never be confused with a pair written "A B".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rhs {
  Emission(String),
  Binary(Symbol, Symbol),
}

impl Rhs {
  pub fn emission(token: impl Into<String>) -> Self {
    Self::Emission(token.into())
  }

  pub fn binary(left: impl Into<String>, right: impl Into<String>) -> Self {
    Self::Binary(Symbol::new(left), Symbol::new(right))
  }

  pub fn token(&self) -> Option<&str> {
    match self {
      Self::Emission(w) => Some(w),
      _ => None,
    }
  }

  pub fn kind(&self) -> RuleKind {
    match self {
      Self::Emission(_) => RuleKind::Emission,
      Self::Binary(_, _) => RuleKind::Binary,
    }
  }
}

impl fmt::Display for Rhs {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Emission(w) => write!(f, "{}", w),
      Self::Binary(l, r) => write!(f, "{} {}", l, r),
    }
  }
}

/// The record kinds found in a count file
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RuleKind {
  Nonterminal,
  Emission,
  Binary,
}

impl RuleKind {
  /// Keyword written back out when a count set is serialized
  pub fn keyword(&self) -> &'static str {
    match self {
      Self::Nonterminal => "NONTERMINAL",
      Self::Emission => "UNARYRULE",
      Self::Binary => "BINARYRULE",
    }
  }

  /// Number of symbol fields that follow the kind keyword
  pub fn arity(&self) -> usize {
    match self {
      Self::Nonterminal => 1,
      Self::Emission => 2,
      Self::Binary => 3,
    }
  }
}

impl FromStr for RuleKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "NONTERMINAL" => Ok(Self::Nonterminal),
      "UNARYRULE" | "EMISSION" => Ok(Self::Emission),
      "BINARYRULE" | "BINARY" => Ok(Self::Binary),
      other => Err(other.to_string()),
    }
  }
}

impl fmt::Display for RuleKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.keyword())
  }
}

/// How often `lhs -> rhs` was observed in a corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCount {
  pub lhs: Symbol,
  pub rhs: Rhs,
  pub count: u64,
}

impl RuleCount {
  pub fn new(lhs: impl Into<String>, rhs: Rhs, count: u64) -> Self {
    Self {
      lhs: Symbol::new(lhs),
      rhs,
      count,
    }
  }
}

/// Same shape as a count-file line
impl fmt::Display for RuleCount {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} {} {} {}",
      self.count,
      self.rhs.kind(),
      self.lhs,
      self.rhs
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_accept_aliases() {
    assert_eq!("UNARYRULE".parse::<RuleKind>(), Ok(RuleKind::Emission));
    assert_eq!("EMISSION".parse::<RuleKind>(), Ok(RuleKind::Emission));
    assert_eq!("BINARY".parse::<RuleKind>(), Ok(RuleKind::Binary));
    assert_eq!("NONTERMINAL".parse::<RuleKind>(), Ok(RuleKind::Nonterminal));
    assert!("WORDTAG".parse::<RuleKind>().is_err());
  }

  #[test]
  fn emission_and_pair_with_same_text_differ() {
    let pair = Rhs::binary("A", "B");
    let token = Rhs::emission("A B");
    assert_eq!(pair.to_string(), token.to_string());
    assert_ne!(pair, token);
  }

  #[test]
  fn rule_count_prints_as_count_line() {
    let rc = RuleCount::new("S", Rhs::binary("NP", "VP"), 12);
    assert_eq!(rc.to_string(), "12 BINARYRULE S NP VP");
    let rc = RuleCount::new("NOUN", Rhs::emission("dog"), 3);
    assert_eq!(rc.to_string(), "3 UNARYRULE NOUN dog");
  }
}
