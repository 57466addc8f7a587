//! Binary entry point for `strreduction`: read `ngram … count` lines,
//! remove every n-gram whose count is explained by a longer containing
//! n-gram, and print the survivors.
//!
//! The count is the last whitespace-separated token of each line; the
//! n-gram is everything before it (word mode splits it into tokens).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;

use ngramstat::displaylevel;
use ngramstat::display::set_display_level;
use ngramstat::reduction::{
    parse_pair_line, reduce_compacting, reduce_hashed, reduce_quadratic, reduce_sorted, Pair,
};
use ngramstat::{Element, Transcoder, Vocab};

#[derive(Parser, Debug)]
#[command(
    name = "strreduction",
    version,
    about = "Statistical substring reduction over extracted n-gram counts"
)]
struct Args {
    /// Input stream encoding (character mode only)
    #[arg(short = 'F', long = "from", default_value = "UTF-8", value_name = "ENC")]
    from: String,

    /// Output stream encoding (character mode only)
    #[arg(short = 'T', long = "to", default_value = "UTF-8", value_name = "ENC")]
    to: String,

    /// Write survivors here instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Reduction algorithm (1 quadratic, 2 sorted, 3 compacting, 4 hashed)
    #[arg(short = 'a', long = "algorithm", value_name = "N",
          value_parser = clap::value_parser!(u32).range(1..=4))]
    algorithm: Option<u32>,

    /// Character n-gram mode (default is word n-gram mode)
    #[arg(short = 'c', long = "char")]
    char_mode: bool,

    /// Sort surviving entries lexicographically
    #[arg(short = 's', long = "sort")]
    sort: bool,

    /// Report the reduction time (excluding I/O) on stderr
    #[arg(short = 't', long = "time")]
    time: bool,

    /// Frequency threshold f0
    #[arg(short = 'f', long = "freq", default_value_t = 1, value_name = "F0")]
    freq: i64,

    /// Minimum substring length probed by algorithm 4
    #[arg(short = 'm', long = "m1", value_name = "M1")]
    m1: Option<usize>,

    /// Errors only on stderr
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// More progress detail (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Input file (stdin when omitted; surplus files are ignored)
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,
}

fn open_input(args: &Args) -> Result<Box<dyn BufRead>> {
    if args.inputs.len() > 1 {
        displaylevel!(
            2,
            "warning: {} input files given, only the first is used\n",
            args.inputs.len()
        );
    }
    match args.inputs.first() {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("unable to open input file {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(std::io::stdin()))),
    }
}

fn open_output(args: &Args) -> Result<Box<dyn Write>> {
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("unable to open output file {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(std::io::stdout()))),
    }
}

fn apply<E: Element>(
    algo: u32,
    mut items: Vec<Pair<E>>,
    f0: i64,
    m1: usize,
    time: bool,
) -> Result<Vec<Pair<E>>> {
    let started = Instant::now();
    let survivors = match algo {
        1 => {
            reduce_quadratic(&mut items, f0);
            items
        }
        2 => {
            reduce_sorted(&mut items, f0);
            items
        }
        3 => {
            reduce_compacting(&mut items, f0)?;
            items
        }
        4 => reduce_hashed(items, m1, f0),
        _ => bail!("invalid algorithm {algo}; valid algorithms are 1-4"),
    };
    if time {
        displaylevel!(1, "reduction took {:.3} s\n", started.elapsed().as_secs_f64());
    }
    Ok(survivors)
}

fn run(args: &Args) -> Result<()> {
    if args.freq < 1 {
        bail!("the frequency threshold must be at least 1");
    }
    let algo = match args.algorithm {
        Some(a) => a,
        None => {
            let a = if args.freq == 1 { 3 } else { 2 };
            displaylevel!(2, "Algorithm parameter not given, using algorithm {a}\n");
            a
        }
    };
    if algo == 3 && args.freq != 1 {
        bail!("algorithm 3 only accepts --freq 1");
    }
    if algo == 4 && args.m1.is_none() {
        displaylevel!(2, "algorithm 4 takes --m1, which was not given; assuming 1\n");
    }
    let m1 = args.m1.unwrap_or(1).max(1);

    let input = open_input(args)?;
    let mut out = open_output(args)?;

    if args.char_mode {
        let from = Transcoder::new(&args.from)?;
        let to = Transcoder::new(&args.to)?;
        let mut items: Vec<Pair<u16>> = Vec::new();
        for line in input.lines() {
            let line = line.context("unable to read reduction input")?;
            if line.trim().is_empty() {
                continue;
            }
            let Some((text, count)) = parse_pair_line(&line) else {
                displaylevel!(1, "warning: no n-gram count found in {line:?}; skipped\n");
                continue;
            };
            let Some(units) = from.decode_units(text.as_bytes()) else {
                displaylevel!(1, "warning: {text:?} cannot be decoded; skipped\n");
                continue;
            };
            items.push((units, count));
        }

        let mut survivors = apply(algo, items, args.freq, m1, args.time)?;
        if args.sort {
            survivors.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        }
        for (text, count) in survivors {
            let Some(bytes) = to.encode_units(&text) else {
                displaylevel!(1, "warning: an n-gram cannot be encoded for output; skipped\n");
                continue;
            };
            out.write_all(&bytes).context("unable to write survivors")?;
            writeln!(out, " {count}").context("unable to write survivors")?;
        }
    } else {
        let mut vocab = Vocab::new();
        let mut items: Vec<Pair<u32>> = Vec::new();
        for line in input.lines() {
            let line = line.context("unable to read reduction input")?;
            if line.trim().is_empty() {
                continue;
            }
            let Some((text, count)) = parse_pair_line(&line) else {
                displaylevel!(1, "warning: no n-gram count found in {line:?}; skipped\n");
                continue;
            };
            let ids: Vec<u32> = text.split_whitespace().map(|t| vocab.add(t)).collect();
            if ids.is_empty() {
                continue;
            }
            items.push((ids, count));
        }

        let mut survivors = apply(algo, items, args.freq, m1, args.time)?;
        if args.sort {
            survivors.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        }
        for (ids, count) in survivors {
            let mut line = String::new();
            for id in ids {
                if let Some(token) = vocab.token(id) {
                    line.push_str(token);
                    line.push(' ');
                }
            }
            writeln!(out, "{line}{count}").context("unable to write survivors")?;
        }
    }

    out.flush().context("unable to flush survivors")?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    set_display_level(if args.quiet {
        1
    } else {
        2 + u32::from(args.verbose)
    });
    if let Err(err) = run(&args) {
        eprintln!("strreduction: {err:#}");
        std::process::exit(1);
    }
}
