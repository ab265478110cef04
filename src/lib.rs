#[macro_use]
extern crate lazy_static;

pub mod chart;
pub mod config;
pub mod counts;
pub mod grammar;
pub mod model;
pub mod parser;
pub mod rules;
pub mod syntree;
pub mod utils;
pub mod vocab;

use crate::chart::{parse_chart, Chart};
pub use crate::config::ParserConfig;
pub use crate::counts::{CountOverflow, Counts, CountsError};
pub use crate::grammar::{EstimationError, Grammar};
pub use crate::model::Model;
pub use crate::parser::{ParseError, ParseOutcome};
pub use crate::rules::{NtId, Rhs, RuleCount, Symbol};
pub use crate::syntree::{ParseTree, TreeError};
pub use crate::utils::Err;
pub use crate::vocab::{VocabularyFilter, RARE};

impl Grammar {
  /// Fills a chart for already-normalized input
  pub fn parse_chart<S: AsRef<str>>(&self, input: &[S]) -> Chart {
    parse_chart(self, input, false)
  }

  /// Viterbi parse of already-normalized input with default limits
  pub fn parse<S: AsRef<str>>(&self, input: &[S]) -> Result<ParseOutcome, ParseError> {
    parser::parse(self, input, &ParserConfig::default())
  }
}

#[test]
fn test_grammar_parse_shortcut() {
  let counts: Counts = r#"
    1 BINARYRULE S NP VP
    1 UNARYRULE NP the
    1 UNARYRULE VP runs
  "#
  .parse()
  .unwrap();
  let g = Grammar::estimate(&counts, "S").unwrap();

  let outcome = g.parse(&["the", "runs"]).unwrap();
  assert!(outcome.is_full());
  assert_eq!(outcome.prob(), 1.0);
  assert_eq!(g.parse_chart(&["the", "runs"]).len(), 2);
}
