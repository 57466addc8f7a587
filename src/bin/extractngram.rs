//! Binary entry point for `extractngram`: run the extraction sweep over an
//! existing `<BASE>.ngram/.ptable/.ltable` artifact bundle and print the
//! surviving n-grams (or, with `--count`, just how many there are).

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::Parser;

use ngramstat::displaylevel;
use ngramstat::display::set_display_level;
use ngramstat::engine::check_bounds;
use ngramstat::engine::files::ArtifactPaths;
use ngramstat::output::{CharCounter, CharPrinter, WordCounter, WordPrinter};
use ngramstat::{FilterTable, NGramStat, Transcoder, Vocab};

#[derive(Parser, Debug)]
#[command(
    name = "extractngram",
    version,
    about = "Extract n-grams from a previously built artifact bundle"
)]
struct Args {
    /// Artifact base path written by text2ngram
    #[arg(short = 'i', long = "input", value_name = "BASE")]
    input: PathBuf,

    /// Character n-gram mode (default is word n-gram mode)
    #[arg(short = 'c', long = "char")]
    char_mode: bool,

    /// Output stream encoding (character mode only)
    #[arg(short = 'T', long = "to", default_value = "UTF-8", value_name = "ENC")]
    to: String,

    /// Use memory maps instead of buffered reads
    #[arg(long = "mmap")]
    mmap: bool,

    /// Minimum n-gram length
    #[arg(short = 'n', long = "min-n", value_name = "N")]
    min_n: usize,

    /// Maximum n-gram length (defaults to --min-n)
    #[arg(short = 'm', long = "max-n", value_name = "M")]
    max_n: Option<usize>,

    /// Frequency threshold
    #[arg(short = 'f', long = "freq", default_value_t = 1, value_name = "F")]
    freq: u32,

    /// Drop n-grams containing punctuation (character mode only)
    #[arg(long = "nopunct")]
    nopunct: bool,

    /// Print only the number of surviving n-grams
    #[arg(long = "count")]
    count: bool,

    /// Errors only on stderr
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// More progress detail (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn run(args: &Args) -> Result<()> {
    let n = args.min_n;
    let m = args.max_n.unwrap_or(n);
    check_bounds(n, m, args.freq)?;
    if !args.char_mode && args.nopunct {
        bail!("punctuation filtering is only supported in character n-gram mode");
    }
    let started = Instant::now();

    if args.char_mode {
        let to = Transcoder::new(&args.to)?;
        let filter = FilterTable::new(true, args.nopunct);
        let engine = NGramStat::<u16>::from_artifacts(&args.input, args.mmap);
        if args.count {
            let mut counter = CharCounter::new(&filter);
            engine.extract_ngram(n, m, args.freq, &mut |t: &[u16], c| counter.emit(t, c))?;
            println!("{}", counter.count());
        } else {
            let stdout = std::io::stdout();
            let mut printer = CharPrinter::new(stdout.lock(), &filter, &to);
            engine.extract_ngram(n, m, args.freq, &mut |t: &[u16], c| printer.emit(t, c))?;
            printer.finish()?;
        }
    } else {
        let vocab_path = ArtifactPaths::new(&args.input).vocab();
        if !vocab_path.exists() {
            bail!(
                "vocab file {} not found; are you missing the --char flag?",
                vocab_path.display()
            );
        }
        let vocab = Vocab::load(&vocab_path)?;
        let engine = NGramStat::<u32>::from_artifacts(&args.input, args.mmap);
        if args.count {
            let mut counter = WordCounter::new(args.nopunct);
            engine.extract_ngram(n, m, args.freq, &mut |t: &[u32], c| counter.emit(t, c))?;
            println!("{}", counter.count());
        } else {
            let stdout = std::io::stdout();
            let mut printer = WordPrinter::new(stdout.lock(), &vocab, args.nopunct);
            engine.extract_ngram(n, m, args.freq, &mut |t: &[u32], c| printer.emit(t, c))?;
            printer.finish()?;
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
        eprintln!("extractngram: {err:#}");
        std::process::exit(1);
    }
    let _ = std::io::stdout().flush();
}
