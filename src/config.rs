use crate::vocab::{DEFAULT_THRESHOLD, RARE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
  /// Symbol a full parse should be rooted at
  pub start: String,
  /// Tokens with a lower training count are rare
  pub rare_threshold: u64,
  /// What rare tokens are replaced with
  pub placeholder: String,
  /// Longer sentences are refused, since the chart grows cubically
  pub max_sentence_len: usize,
  /// Score the cells of each span length on the rayon pool
  pub parallel_cells: bool,
}

impl Default for ParserConfig {
  fn default() -> Self {
    Self {
      start: "S".to_string(),
      rare_threshold: DEFAULT_THRESHOLD,
      placeholder: RARE.to_string(),
      max_sentence_len: 100,
      parallel_cells: false,
    }
  }
}
