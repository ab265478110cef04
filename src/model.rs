use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::chart::Chart;
use crate::config::ParserConfig;
use crate::counts::Counts;
use crate::grammar::{EstimationError, Grammar};
use crate::parser::{self, ParseError, ParseOutcome};
use crate::vocab::VocabularyFilter;

/// Everything needed to parse: the estimated grammar, the vocabulary filter it
/// was trained with, and the parser settings. Built once and then only read,
/// so one model can serve any number of threads.
#[derive(Debug, Clone)]
pub struct Model {
  grammar: Grammar,
  vocab: VocabularyFilter,
  config: ParserConfig,
}

impl Model {
  /// Trains from raw (unnormalized) counts: rare emissions are folded into the
  /// placeholder before estimation
  pub fn from_counts(raw: &Counts, config: ParserConfig) -> Result<Self, EstimationError> {
    let vocab =
      VocabularyFilter::from_counts(raw, config.rare_threshold, config.placeholder.clone());
    let normalized = vocab.normalize_counts(raw)?;
    let grammar = Grammar::estimate(&normalized, &config.start)?;
    Ok(Self::from_parts(grammar, vocab, config))
  }

  /// Uses a grammar estimated elsewhere, e.g. from counts that were already
  /// normalized with `vocab`
  pub fn from_parts(grammar: Grammar, vocab: VocabularyFilter, config: ParserConfig) -> Self {
    if !grammar.has_token(vocab.placeholder()) {
      warn!(
        placeholder = vocab.placeholder(),
        "grammar has no emissions for the rare-word placeholder, unseen words will score zero"
      );
    }
    info!(
      nonterminals = grammar.len(),
      vocabulary = vocab.len(),
      threshold = vocab.threshold(),
      start = %grammar.start_symbol(),
      "model ready"
    );
    Self {
      grammar,
      vocab,
      config,
    }
  }

  pub fn grammar(&self) -> &Grammar {
    &self.grammar
  }

  pub fn vocab(&self) -> &VocabularyFilter {
    &self.vocab
  }

  pub fn config(&self) -> &ParserConfig {
    &self.config
  }

  /// Normalizes and parses one sentence. Scoring sees the normalized tokens,
  /// the returned tree carries the sentence's own words.
  pub fn parse<S: AsRef<str>>(&self, sentence: &[S]) -> Result<ParseOutcome, ParseError> {
    self.parse_with_chart(sentence).map(|(_, outcome)| outcome)
  }

  /// `parse`, keeping the chart the outcome was read from. The chart is
  /// over the normalized tokens.
  pub fn parse_with_chart<S: AsRef<str>>(
    &self,
    sentence: &[S],
  ) -> Result<(Chart, ParseOutcome), ParseError> {
    let normalized = self.vocab.normalize_sentence(sentence);
    let (chart, outcome) = parser::parse_with_chart(&self.grammar, &normalized, &self.config)?;
    debug!(len = sentence.len(), prob = outcome.prob(), "parsed sentence");

    Ok((chart, outcome.restore_words(sentence)))
  }

  /// Parses every sentence on the rayon pool, results in input order
  pub fn parse_corpus<S>(&self, sentences: &[Vec<S>]) -> Vec<Result<ParseOutcome, ParseError>>
  where
    S: AsRef<str> + Sync,
  {
    let results = sentences
      .par_iter()
      .map(|sentence| self.parse(sentence))
      .collect::<Vec<_>>();

    info!(
      sentences = results.len(),
      full = results.iter().filter(|r| matches!(r, Ok(o) if o.is_full())).count(),
      fallback = results
        .iter()
        .filter(|r| matches!(r, Ok(o) if o.is_fallback()))
        .count(),
      failed = results
        .iter()
        .filter(|r| !matches!(r, Ok(ParseOutcome::Full { .. } | ParseOutcome::Fallback { .. })))
        .count(),
      "parsed corpus"
    );

    results
  }
}
