use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeError {
  #[error("expected a [label, ...] array, got {0}")]
  NotAnArray(Value),
  #[error("node {0} needs one word or two children")]
  BadArity(Value),
  #[error("label must be a string, got {0}")]
  BadLabel(Value),
  #[error("invalid json: {0}")]
  Json(#[from] serde_json::Error),
}

/// A labelled node covering the 1-indexed, inclusive word span `span.0..=span.1`
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Constituent<T> {
  pub value: T,
  pub span: (usize, usize),
}

impl<T> fmt::Display for Constituent<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}: {}", self.span.0, self.span.1, self.value)
  }
}

/// A binarized constituency tree: preterminals hold exactly one word,
/// every other node exactly two children
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ParseTree {
  Leaf(Constituent<String>, String),
  Branch(Constituent<String>, Box<ParseTree>, Box<ParseTree>),
}

impl ParseTree {
  pub fn leaf(label: impl Into<String>, word: impl Into<String>, pos: usize) -> Self {
    Self::Leaf(
      Constituent {
        value: label.into(),
        span: (pos, pos),
      },
      word.into(),
    )
  }

  pub fn branch(label: impl Into<String>, left: ParseTree, right: ParseTree) -> Self {
    let span = (left.span().0, right.span().1);
    Self::Branch(
      Constituent {
        value: label.into(),
        span,
      },
      Box::new(left),
      Box::new(right),
    )
  }

  fn constituent(&self) -> &Constituent<String> {
    match self {
      Self::Leaf(c, _) | Self::Branch(c, _, _) => c,
    }
  }

  pub fn label(&self) -> &str {
    &self.constituent().value
  }

  pub fn span(&self) -> (usize, usize) {
    self.constituent().span
  }

  pub fn get_leaf(&self) -> Option<(&Constituent<String>, &str)> {
    match self {
      Self::Leaf(c, w) => Some((c, w)),
      _ => None,
    }
  }

  pub fn get_branch(&self) -> Option<(&Constituent<String>, &ParseTree, &ParseTree)> {
    match self {
      Self::Branch(c, l, r) => Some((c, l, r)),
      _ => None,
    }
  }

  /// The words at the leaves, left to right
  pub fn words(&self) -> Vec<&str> {
    let mut words = Vec::new();
    self.collect_words(&mut words);
    words
  }

  fn collect_words<'a>(&'a self, into: &mut Vec<&'a str>) {
    match self {
      Self::Leaf(_, w) => into.push(w),
      Self::Branch(_, l, r) => {
        l.collect_words(into);
        r.collect_words(into);
      }
    }
  }

  /// Rebuilds the tree with every word passed through `f`
  pub fn map_words<F>(&self, f: &F) -> ParseTree
  where
    F: Fn(&str) -> String,
  {
    match self {
      Self::Leaf(c, w) => Self::Leaf(c.clone(), f(w)),
      Self::Branch(c, l, r) => Self::Branch(
        c.clone(),
        Box::new(l.map_words(f)),
        Box::new(r.map_words(f)),
      ),
    }
  }

  /// Puts `words[k - 1]` back at the leaf covering position k
  pub fn restore_words<S: AsRef<str>>(&self, words: &[S]) -> ParseTree {
    match self {
      Self::Leaf(c, _) => Self::Leaf(c.clone(), words[c.span.0 - 1].as_ref().to_string()),
      Self::Branch(c, l, r) => Self::Branch(
        c.clone(),
        Box::new(l.restore_words(words)),
        Box::new(r.restore_words(words)),
      ),
    }
  }

  /// `["S", ["NP", "the"], ["VP", "runs"]]`
  pub fn to_json(&self) -> Value {
    match self {
      Self::Leaf(c, w) => Value::Array(vec![
        Value::String(c.value.clone()),
        Value::String(w.clone()),
      ]),
      Self::Branch(c, l, r) => Value::Array(vec![
        Value::String(c.value.clone()),
        l.to_json(),
        r.to_json(),
      ]),
    }
  }

  /// Reads the array form written by [`ParseTree::to_json`], numbering words from 1
  pub fn from_json(value: &Value) -> Result<Self, TreeError> {
    Self::from_json_at(value, 1).map(|(tree, _)| tree)
  }

  fn from_json_at(value: &Value, pos: usize) -> Result<(Self, usize), TreeError> {
    let items = value
      .as_array()
      .ok_or_else(|| TreeError::NotAnArray(value.clone()))?;
    let label = match items.first() {
      Some(Value::String(s)) => s.clone(),
      Some(other) => return Err(TreeError::BadLabel(other.clone())),
      None => return Err(TreeError::BadArity(value.clone())),
    };

    match &items[1..] {
      [Value::String(word)] => Ok((Self::leaf(label, word.clone(), pos), pos + 1)),
      [left, right] => {
        let (left, pos) = Self::from_json_at(left, pos)?;
        let (right, pos) = Self::from_json_at(right, pos)?;
        Ok((Self::branch(label, left, right), pos))
      }
      _ => Err(TreeError::BadArity(value.clone())),
    }
  }
}

impl FromStr for ParseTree {
  type Err = TreeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let value: Value = serde_json::from_str(s)?;
    Self::from_json(&value)
  }
}

impl fmt::Display for ParseTree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(c, w) => write!(f, "({} ({}))", c, w),
      Self::Branch(c, l, r) => {
        write!(f, "({}", c)?;
        for t in [l, r] {
          let fmt = format!("{}", t);
          for line in fmt.lines() {
            write!(f, "\n  {}", line)?;
          }
        }
        write!(f, ")")
      }
    }
  }
}
