use std::env;
use std::io;
use std::io::{BufRead, Read, Write};
use std::process;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use viterbi_cky::utils::tokenize;
use viterbi_cky::{
  Counts, Err, Grammar, Model, ParseError, ParseOutcome, ParseTree, ParserConfig, VocabularyFilter,
};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} COUNTS [options] < INPUT

Reads sentences (one per line) from stdin and prints the most likely parse of
each as a JSON tree, one per line. COUNTS is a rule-count file; its emission
counts decide which words are rare.

Options:
  -h, --help              Print this message
  -s, --start SYMBOL      Start symbol (defaults to S)
  -t, --threshold N       Words seen fewer than N times are rare (defaults to 5)
  -m, --max-len N         Refuse sentences longer than N tokens (defaults to 100)
  -r, --rare-counts FILE  Estimate from this already-normalized count file
                          instead of normalizing COUNTS
  -j, --parallel          Score chart cells of each span length in parallel
  -c, --chart             Print each parse chart to stderr
  -p, --params            Print the probability table and exit
  -n, --normalize-counts  Print COUNTS with rare words folded into the
                          placeholder and exit
  -T, --normalize-trees   Read JSON training trees from stdin and print them
                          with rare words replaced

Set RUST_LOG (e.g. RUST_LOG=debug) for diagnostics on stderr.",
    prog_name
  )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Parse,
  Params,
  NormalizeCounts,
  NormalizeTrees,
}

struct Args {
  counts: String,
  rare_counts: Option<String>,
  config: ParserConfig,
  print_chart: bool,
  mode: Mode,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn next_value(
    iter: &mut impl Iterator<Item = String>,
    name: &str,
    prog_name: &str,
  ) -> Result<String, String> {
    iter
      .next()
      .ok_or_else(|| Self::make_error_message(&format!("{} needs a value", name), prog_name))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message(
        "bad argument vector",
        "viterbi-cky",
      ));
    }

    let args_len = v.len();
    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap_or_default();

    if args_len < 2 {
      return Err(Self::make_error_message("not enough arguments", prog_name));
    }

    let mut counts: Option<String> = None;
    let mut rare_counts: Option<String> = None;
    let mut config = ParserConfig::default();
    let mut print_chart = false;
    let mut mode = Mode::Parse;

    while let Some(o) = iter.next() {
      let mut value = |name: &str| Self::next_value(&mut iter, name, &prog_name);

      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-s" || o == "--start" {
        config.start = value(o.as_str())?;
      } else if o == "-t" || o == "--threshold" {
        config.rare_threshold = value(o.as_str())?
          .parse()
          .map_err(|_| Self::make_error_message("threshold must be a number", &prog_name))?;
      } else if o == "-m" || o == "--max-len" {
        config.max_sentence_len = value(o.as_str())?
          .parse()
          .map_err(|_| Self::make_error_message("max-len must be a number", &prog_name))?;
      } else if o == "-r" || o == "--rare-counts" {
        rare_counts = Some(value(o.as_str())?);
      } else if o == "-j" || o == "--parallel" {
        config.parallel_cells = true;
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-p" || o == "--params" {
        mode = Mode::Params;
      } else if o == "-n" || o == "--normalize-counts" {
        mode = Mode::NormalizeCounts;
      } else if o == "-T" || o == "--normalize-trees" {
        mode = Mode::NormalizeTrees;
      } else if counts.is_none() && !o.starts_with('-') {
        counts = Some(o);
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    if let Some(counts) = counts {
      Ok(Self {
        counts,
        rare_counts,
        config,
        print_chart,
        mode,
      })
    } else {
      Err(Self::make_error_message("missing count file", prog_name))
    }
  }
}

fn load_model(opts: &Args, raw: &Counts) -> Result<Model, Err> {
  match &opts.rare_counts {
    Some(path) => {
      let vocab = VocabularyFilter::from_counts(
        raw,
        opts.config.rare_threshold,
        opts.config.placeholder.clone(),
      );
      let grammar = Grammar::estimate(&Counts::read_from_file(path)?, &opts.config.start)?;
      Ok(Model::from_parts(grammar, vocab, opts.config.clone()))
    }
    None => Ok(Model::from_counts(raw, opts.config.clone())?),
  }
}

fn print_outcome(out: &mut impl Write, outcome: &ParseOutcome) -> Result<(), Err> {
  match outcome {
    ParseOutcome::Full { tree, .. } => writeln!(out, "{}", tree.to_json())?,
    ParseOutcome::Fallback { tree, root, prob } => {
      warn!(root = %root, prob, "sentence not derivable from the start symbol");
      writeln!(out, "{}", tree.to_json())?
    }
    ParseOutcome::NoParse => {
      warn!("no parse");
      writeln!(out, "null")?
    }
  }
  Ok(())
}

fn print_result(
  out: &mut impl Write,
  result: Result<ParseOutcome, ParseError>,
) -> Result<(), Err> {
  match result {
    Ok(outcome) => print_outcome(out, &outcome),
    Err(err) => {
      warn!(%err, "skipping sentence");
      writeln!(out)?;
      Ok(())
    }
  }
}

/// Parses each sentence on its own so its chart can be shown
fn parse_with_charts(model: &Model, lines: &[String], out: &mut impl Write) -> Result<(), Err> {
  for line in lines {
    let sentence = tokenize(line);
    let result = model.parse_with_chart(&sentence).map(|(chart, outcome)| {
      eprintln!("chart:\n{}", chart.display(model.grammar()));
      outcome
    });
    print_result(out, result)?;
  }
  Ok(())
}

fn parse_corpus(model: &Model, lines: &[String], out: &mut impl Write) -> Result<(), Err> {
  let sentences = lines.iter().map(|l| tokenize(l)).collect::<Vec<_>>();
  for result in model.parse_corpus(&sentences) {
    print_result(out, result)?;
  }
  Ok(())
}

fn normalize_trees(vocab: &VocabularyFilter, out: &mut impl Write) -> Result<(), Err> {
  let stdin = io::stdin();
  for line in stdin.lock().lines() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let tree: ParseTree = line.parse()?;
    writeln!(out, "{}", vocab.normalize_tree(&tree).to_json())?;
  }
  Ok(())
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let raw = Counts::read_from_file(&opts.counts)?;
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  match opts.mode {
    Mode::NormalizeCounts | Mode::NormalizeTrees => {
      let vocab = VocabularyFilter::from_counts(
        &raw,
        opts.config.rare_threshold,
        opts.config.placeholder.clone(),
      );
      if opts.mode == Mode::NormalizeCounts {
        write!(out, "{}", vocab.normalize_counts(&raw)?)?;
      } else {
        normalize_trees(&vocab, &mut out)?;
      }
    }
    Mode::Params => {
      let model = load_model(&opts, &raw)?;
      write!(out, "{}", model.grammar())?;
    }
    Mode::Parse => {
      let model = load_model(&opts, &raw)?;

      let mut input = String::new();
      io::stdin().read_to_string(&mut input)?;
      let lines = input.lines().map(str::to_string).collect::<Vec<_>>();
      info!(sentences = lines.len(), "read input");

      if opts.print_chart {
        parse_with_charts(&model, &lines, &mut out)?;
      } else {
        parse_corpus(&model, &lines, &mut out)?;
      }
    }
  }

  out.flush()?;
  Ok(())
}
