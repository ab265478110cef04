use approx::assert_relative_eq;
use serde_json::json;

use viterbi_cky::utils::read_sentences;
use viterbi_cky::{
  Counts, EstimationError, Grammar, Model, ParseError, ParseOutcome, ParserConfig, Rhs,
  VocabularyFilter, RARE,
};

const COUNTS: &str = include_str!("../data/toy.counts");
const SENTENCES: &str = include_str!("../data/toy.sentences");

fn model() -> Model {
  let counts: Counts = COUNTS.parse().unwrap();
  Model::from_counts(&counts, ParserConfig::default()).unwrap()
}

#[test]
fn trains_with_rare_placeholder() {
  let model = model();
  let g = model.grammar();

  assert!(!model.vocab().is_frequent("ferret"));
  assert!(model.vocab().is_frequent("dogs"));
  assert_relative_eq!(g.probability("NOUN", &Rhs::emission(RARE)).unwrap(), 1.0 / 26.0);
  assert_relative_eq!(g.probability("VERB", &Rhs::emission(RARE)).unwrap(), 2.0 / 12.0);
  assert_eq!(g.probability("NOUN", &Rhs::emission("ferret")), None);

  let mut sums = std::collections::BTreeMap::new();
  for (lhs, _, prob) in g.rules() {
    *sums.entry(lhs).or_insert(0.0) += prob;
  }
  for (lhs, sum) in sums {
    assert!((sum - 1.0f64).abs() < 1e-9, "{} sums to {}", lhs, sum);
  }
}

#[test]
fn parses_toy_corpus() {
  let model = model();
  let sentences = read_sentences(SENTENCES);
  let results = model.parse_corpus(&sentences);
  assert_eq!(results.len(), 5);

  let full = results[0].as_ref().unwrap();
  assert!(full.is_full());
  assert_relative_eq!(full.prob(), 6.0 / 32.0 * 0.4);
  assert_eq!(
    full.tree().unwrap().to_json(),
    json!(["S", ["NP", "dogs"], ["VP", "runs"]])
  );

  assert_eq!(
    results[1].as_ref().unwrap().tree().unwrap().to_json(),
    json!([
      "S",
      ["NP", ["DET", "the"], ["NOUN", "dog"]],
      ["VP", ["VERB", "sees"], ["NP", ["DET", "a"], ["NOUN", "cat"]]]
    ])
  );

  // rare words are scored as the placeholder but printed as written
  assert_eq!(
    results[2].as_ref().unwrap().tree().unwrap().to_json(),
    json!([
      "S",
      ["NP", ["DET", "the"], ["NOUN", "ferret"]],
      ["VP", ["VERB", "bites"], ["NP", "dogs"]]
    ])
  );

  match results[3].as_ref().unwrap() {
    ParseOutcome::Fallback { tree, prob, root } => {
      assert_eq!(root.as_str(), "NP");
      assert_eq!(tree.label(), "NP");
      assert_relative_eq!(*prob, 26.0 / 32.0 * 20.0 / 26.0 * 14.0 / 26.0);
    }
    other => panic!("expected a fallback parse, got {:?}", other),
  }

  let unseen = results[4].as_ref().unwrap();
  assert!(unseen.is_full());
  assert_eq!(unseen.tree().unwrap().words()[1], "weasel");
}

#[test]
fn parsing_is_deterministic() {
  let model = model();
  let sentences = read_sentences(SENTENCES);
  let a = model.parse_corpus(&sentences);
  let b = model.parse_corpus(&sentences);
  for (a, b) in a.iter().zip(b.iter()) {
    let a = a.as_ref().unwrap().tree().map(|t| t.to_json().to_string());
    let b = b.as_ref().unwrap().tree().map(|t| t.to_json().to_string());
    assert_eq!(a, b);
  }
}

#[test]
fn prenormalized_counts_give_same_model() {
  let raw: Counts = COUNTS.parse().unwrap();
  let vocab = VocabularyFilter::from_counts(&raw, 5, RARE);
  let rare_counts: Counts = vocab
    .normalize_counts(&raw)
    .unwrap()
    .to_string()
    .parse()
    .unwrap();
  let g = Grammar::estimate(&rare_counts, "S").unwrap();
  let from_parts = Model::from_parts(g, vocab, ParserConfig::default());

  let sentence = ["the", "ferret", "sees", "a", "weasel"];
  assert_eq!(from_parts.parse(&sentence), model().parse(&sentence));
}

#[test]
fn limits_and_failures_are_per_sentence() {
  let counts: Counts = COUNTS.parse().unwrap();
  let config = ParserConfig {
    max_sentence_len: 3,
    parallel_cells: true,
    ..ParserConfig::default()
  };
  let model = Model::from_counts(&counts, config).unwrap();

  let sentences = vec![
    vec!["dogs", "runs"],
    vec!["the", "dog", "sees", "dogs"],
    vec![],
    vec!["runs", "dogs"],
  ];
  let results = model.parse_corpus(&sentences);
  assert!(results[0].as_ref().unwrap().is_full());
  assert_eq!(
    results[1],
    Err(ParseError::SentenceTooLong { len: 4, max: 3 })
  );
  assert_eq!(results[2], Err(ParseError::EmptySentence));
  assert_eq!(results[3], Ok(ParseOutcome::NoParse));

  // the chart path reports the same errors and outcomes
  for (sentence, result) in sentences.iter().zip(results.iter()) {
    let with_chart = model.parse_with_chart(sentence).map(|(_, outcome)| outcome);
    assert_eq!(&with_chart, result);
  }
  let (chart, outcome) = model.parse_with_chart(&["dogs", "runs"]).unwrap();
  assert_eq!(chart.len(), 2);
  assert_eq!(outcome.tree().unwrap().words(), vec!["dogs", "runs"]);
}

#[test]
fn overflowing_counts_fail_training() {
  let counts: Counts = "18446744073709551615 UNARYRULE S dogs\n1 UNARYRULE S cats"
    .parse()
    .unwrap();
  assert_eq!(
    Model::from_counts(&counts, ParserConfig::default()).unwrap_err(),
    EstimationError::CountOverflow {
      lhs: "S".to_string()
    }
  );
}
