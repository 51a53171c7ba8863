use munch::{ScanError, Scanner, ScannerConfig, Source};
use tracing_subscriber::EnvFilter;

use crate::{prelude::*, rules::Kind};

#[derive(Debug, clap::Parser)]
#[command(version, author, about)]
struct Opts {
    /// Log filter, using env_logger-like syntax
    #[arg(long, env = "RUST_LOG")]
    log_filter: Option<String>,

    /// Size in bytes of each of the scanner's two input buffers
    #[arg(short, long, env = "MUNCH_BUFFER_SIZE", default_value_t = ScannerConfig::default().buffer_size)]
    buffer_size: usize,

    /// Print the compiled lexer table as a Graphviz graph and exit
    #[arg(long)]
    dot: bool,

    /// Stop at the first unmatched byte or unreadable file instead of
    /// skipping it
    #[arg(long)]
    abort_on_error: bool,

    /// Files to scan in order, or standard input if none are given
    files: Vec<PathBuf>,
}

macro_rules! init_error {
    ($($args:tt)*) => ({
        ::tracing::error!($($args)*);
        ::std::process::exit(1);
    })
}

fn fmt_layer<S>() -> tracing_subscriber::fmt::Layer<
    S,
    tracing_subscriber::fmt::format::DefaultFields,
    tracing_subscriber::fmt::format::Format,
    fn() -> io::Stderr,
> {
    // lexemes go to stdout, so keep logs out of the way
    tracing_subscriber::fmt::layer().with_writer(io::stderr as fn() -> io::Stderr)
}

#[tracing::instrument(name = "init_logger", skip(log_filter))]
fn init_subscriber(log_filter: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(log_filter)
                .unwrap_or_else(|e| init_error!("Invalid log filter {log_filter:?}: {e}")),
        )
        .with(fmt_layer())
        .try_init()
        .unwrap_or_else(|e| init_error!("Error initializing logger: {e}"));
}

#[inline]
pub fn main() {
    let tmp_logger =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(fmt_layer()));

    let opts: Opts = clap::Parser::parse();
    let span = error_span!("boot", ?opts).entered();

    init_subscriber(opts.log_filter.as_deref().unwrap_or("info"));

    drop((span, tmp_logger));

    if let Err(e) = run(opts) {
        error!("{e:?}");
        std::process::exit(1);
    }
}

fn run(opts: Opts) -> Result {
    let Opts {
        log_filter: _,
        buffer_size,
        dot,
        abort_on_error,
        files,
    } = opts;

    let table = crate::rules::demo()?;

    if dot {
        println!("{}", table.dot());
        return Ok(());
    }

    let sources: Vec<Source> = if files.is_empty() {
        vec![Source::reader(io::stdin())]
    } else {
        files.into_iter().map(Source::Path).collect()
    };

    let mut scanner = Scanner::with_config(&table, sources, ScannerConfig { buffer_size })
        .context("Invalid scanner options")?;
    let mut out = io::BufWriter::new(io::stdout().lock());
    let mut lexemes = 0_usize;
    let mut skipped = 0_usize;

    loop {
        match scanner.next_lexeme() {
            Ok(lex) => {
                lexemes += 1;
                let kind = Kind::from_label(lex.label)
                    .ok_or_else(|| anyhow!("Unknown token label {}", lex.label))?;
                writeln!(out, "{}\t{kind}\t{:?}", lex.position, lex.text_lossy())
                    .context("Error writing output")?;
            },
            Err(ScanError::SourceExhausted) => break,
            Err(e @ (ScanError::NoMatch { .. } | ScanError::Io { .. })) if !abort_on_error => {
                skipped += 1;
                warn!("{:?}", Error::from(e));
            },
            Err(e) => return Err(e).context("Scanning aborted"),
        }
    }

    out.flush().context("Error writing output")?;
    info!(lexemes, skipped, "Finished scanning");

    Ok(())
}
