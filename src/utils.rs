use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Splits a line of text into tokens on whitespace. Blank lines give an
/// empty sentence.
///
/// ```
/// assert_eq!(viterbi_cky::utils::tokenize("  the dog\truns "), vec!["the", "dog", "runs"]);
/// ```
pub fn tokenize(line: &str) -> Vec<&str> {
  line.split_whitespace().collect()
}

/// One sentence per non-blank line
pub fn read_sentences(src: &str) -> Vec<Vec<&str>> {
  src
    .lines()
    .map(tokenize)
    .filter(|s| !s.is_empty())
    .collect()
}

#[test]
fn test_read_sentences_skips_blank_lines() {
  let sentences = read_sentences("the dog runs\n\n   \nit runs\n");
  assert_eq!(sentences, vec![vec!["the", "dog", "runs"], vec!["it", "runs"]]);
}
