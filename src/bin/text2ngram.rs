//! Binary entry point for `text2ngram`: parse one or more input files and
//! either write an artifact bundle (`<BASE>.ngram/.ptable/.ltable`, plus
//! `.vocab` in word mode) or run an in-memory extraction pass and print
//! `ngram count` lines to stdout.
//!
//! The two outcomes are mutually exclusive: artifact extraction is
//! `extractngram`'s job.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;

use ngramstat::displaylevel;
use ngramstat::display::set_display_level;
use ngramstat::engine::check_bounds;
use ngramstat::ingest::{parse_char_files, parse_word_files};
use ngramstat::output::{CharPrinter, WordPrinter};
use ngramstat::{FilterTable, NGramStat, Transcoder, Vocab};

#[derive(Parser, Debug)]
#[command(
    name = "text2ngram",
    version,
    about = "Extract n-gram statistics from large text corpora"
)]
struct Args {
    /// Input stream encoding (character mode only)
    #[arg(short = 'F', long = "from", default_value = "UTF-8", value_name = "ENC")]
    from: String,

    /// Output stream encoding (character mode only)
    #[arg(short = 'T', long = "to", default_value = "UTF-8", value_name = "ENC")]
    to: String,

    /// Artifact base path: writes <BASE>.ngram/.ptable/.ltable (and .vocab)
    #[arg(short = 'o', long = "output", value_name = "BASE")]
    output: Option<PathBuf>,

    /// Character n-gram mode (default is word n-gram mode)
    #[arg(short = 'c', long = "char")]
    char_mode: bool,

    /// Memory budget in MB
    #[arg(long = "mem", default_value_t = 10, value_name = "MB")]
    mem: usize,

    /// Use memory maps for merge and extraction I/O
    #[arg(long = "mmap")]
    mmap: bool,

    /// Minimum n-gram length; requests an in-memory extraction pass
    #[arg(short = 'n', long = "min-n", value_name = "N")]
    min_n: Option<usize>,

    /// Maximum n-gram length (defaults to --min-n)
    #[arg(short = 'm', long = "max-n", value_name = "M")]
    max_n: Option<usize>,

    /// Frequency threshold for extraction
    #[arg(short = 'f', long = "freq", value_name = "F")]
    freq: Option<u32>,

    /// Drop n-grams containing punctuation (character mode only)
    #[arg(long = "nopunct")]
    nopunct: bool,

    /// Errors only on stderr
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// More progress detail (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Input files
    #[arg(required = true, value_name = "FILE")]
    inputs: Vec<PathBuf>,
}

fn check_args(args: &Args) -> Result<()> {
    if args.output.is_some() {
        if args.min_n.is_some() || args.max_n.is_some() || args.freq.is_some() || args.nopunct {
            bail!(
                "n-grams can only be extracted from the in-memory tables; \
                 use extractngram on the written artifact bundle instead"
            );
        }
    } else {
        let Some(n) = args.min_n else {
            bail!("either --output or --min-n must be given");
        };
        check_bounds(n, args.max_n.unwrap_or(n), args.freq.unwrap_or(1))?;
    }
    if !args.char_mode && args.nopunct {
        bail!("punctuation filtering is only supported in character n-gram mode");
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    check_args(args)?;
    let started = Instant::now();
    let mem_bytes = args.mem.saturating_mul(1 << 20);

    displaylevel!(
        2,
        "N-Gram type:     {}\n",
        if args.char_mode { "Character" } else { "Word" }
    );
    if args.char_mode {
        displaylevel!(2, "Input  Encoding: {}\n", args.from);
        displaylevel!(2, "Output Encoding: {}\n", args.to);
    }

    let extraction = args.min_n.map(|n| {
        (
            n,
            args.max_n.unwrap_or(n),
            args.freq.unwrap_or(1),
        )
    });

    if args.char_mode {
        let from = Transcoder::new(&args.from)?;
        let to = Transcoder::new(&args.to)?;
        let mut engine =
            NGramStat::<u16>::new(mem_bytes, args.output.as_deref(), args.mmap)?;
        parse_char_files(&mut engine, &args.inputs, &from)?;

        if let Some((n, m, freq)) = extraction {
            let filter = FilterTable::new(true, args.nopunct);
            let stdout = std::io::stdout();
            let mut printer = CharPrinter::new(stdout.lock(), &filter, &to);
            engine.extract_ngram(n, m, freq, &mut |t: &[u16], c| printer.emit(t, c))?;
            printer.finish()?;
        }
    } else {
        let mut vocab = Vocab::new();
        let mut engine =
            NGramStat::<u32>::new(mem_bytes, args.output.as_deref(), args.mmap)?;
        parse_word_files(&mut engine, &args.inputs, &mut vocab)?;

        if let Some((n, m, freq)) = extraction {
            let stdout = std::io::stdout();
            let mut printer = WordPrinter::new(stdout.lock(), &vocab, args.nopunct);
            engine.extract_ngram(n, m, freq, &mut |t: &[u32], c| printer.emit(t, c))?;
            printer.finish()?;
        }

        if let Some(paths) = engine.artifact_paths() {
            vocab.save(&paths.vocab())?;
        }
    }

    displaylevel!(2, "Done! ({:.2} s)\n", started.elapsed().as_secs_f64());
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
        eprintln!("text2ngram: {err:#}");
        std::process::exit(1);
    }
    let _ = std::io::stdout().flush();
}
